//! Structured-value serializer capability.
//!
//! The remote store keeps flat byte strings, so structured values (arrays,
//! objects) need an encoding before they can travel. The facade holds this
//! capability as an optional collaborator and checks for it at the two call
//! sites that need it; transports themselves never serialize.

use serde_json::Value as Json;
use thiserror::Error;

/// Failure while encoding or decoding a structured value.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SerializeError(pub String);

/// Encodes and decodes structured values to the wire byte format.
pub trait Serializer: Send + Sync {
    fn encode(&self, value: &Json) -> Result<Vec<u8>, SerializeError>;
    fn decode(&self, bytes: &[u8]) -> Result<Json, SerializeError>;
}

/// JSON wire encoding, installed when the `serializer=json` option is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn encode(&self, value: &Json) -> Result<Vec<u8>, SerializeError> {
        serde_json::to_vec(value).map_err(|e| SerializeError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Json, SerializeError> {
        serde_json::from_slice(bytes).map_err(|e| SerializeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_roundtrip() {
        let serializer = JsonSerializer;
        let value = json!({"name": "alpha", "hits": [1, 2, 3]});
        let bytes = serializer.encode(&value).unwrap();
        assert_eq!(serializer.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn decode_rejects_garbage() {
        let serializer = JsonSerializer;
        assert!(serializer.decode(b"\x00\x01not json").is_err());
    }
}
