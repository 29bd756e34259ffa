//! Typed value model for cache reads and writes.
//!
//! The remote store keeps flat byte strings; this module reconciles that
//! wire representation against the semantic type a caller requested.
//! Structured kinds (`Array`, `Object`) interchange through
//! `serde_json::Value` and are encoded by the injected serializer, not here.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{CacheError, Result};

/// Semantic type a caller can request from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
    Mixed,
}

impl ValueKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Mixed => "mixed",
        }
    }

    /// Structured kinds need a serializer on transports without a native
    /// object encoding.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Array | Self::Object)
    }
}

/// A decoded cache value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Json>),
    Object(Json),
}

impl CacheValue {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Array(_) => ValueKind::Array,
            Self::Object(_) => ValueKind::Object,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Json]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Json> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// JSON interchange form, used when handing structured values to the
    /// serializer.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool(v) => Json::Bool(*v),
            Self::Int(v) => Json::Number((*v).into()),
            Self::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Self::String(v) => Json::String(v.clone()),
            Self::Array(v) => Json::Array(v.clone()),
            Self::Object(v) => v.clone(),
        }
    }

    /// Wire text for scalar kinds. Structured kinds have no flat wire form
    /// and return `None`.
    #[must_use]
    pub fn to_wire(&self) -> Option<Vec<u8>> {
        match self {
            Self::Bool(true) => Some(b"1".to_vec()),
            Self::Bool(false) => Some(b"0".to_vec()),
            Self::Int(v) => Some(v.to_string().into_bytes()),
            Self::Float(v) => Some(v.to_string().into_bytes()),
            Self::String(v) => Some(v.clone().into_bytes()),
            Self::Array(_) | Self::Object(_) => None,
        }
    }

    /// Reconcile a raw stored representation against a requested scalar
    /// kind.
    ///
    /// `Mixed` passes the stored text through unchanged. A representation
    /// that does not parse as the requested kind fails with
    /// `InvalidArgument`; a caller-supplied default never masks this.
    pub fn parse_wire(kind: ValueKind, raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw).map_err(|_| {
            CacheError::invalid(format!(
                "Stored value is not valid UTF-8 for requested type \"{}\".",
                kind.as_str()
            ))
        })?;
        match kind {
            ValueKind::Mixed | ValueKind::String => Ok(Self::String(text.to_string())),
            ValueKind::Bool => match text {
                "1" | "true" => Ok(Self::Bool(true)),
                "0" | "" | "false" => Ok(Self::Bool(false)),
                _ => Err(mismatch(text, kind)),
            },
            ValueKind::Int => text
                .parse::<i64>()
                .map(Self::Int)
                .map_err(|_| mismatch(text, kind)),
            ValueKind::Float => text
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|_| mismatch(text, kind)),
            ValueKind::Array | ValueKind::Object => Err(CacheError::invalid(format!(
                "Requested type \"{}\" has no flat wire form.",
                kind.as_str()
            ))),
        }
    }
}

fn mismatch(text: &str, kind: ValueKind) -> CacheError {
    CacheError::invalid(format!(
        "Stored value \"{text}\" does not match requested type \"{}\".",
        kind.as_str()
    ))
}

impl From<bool> for CacheValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for CacheValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for CacheValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for CacheValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Json>> for CacheValue {
    fn from(v: Vec<Json>) -> Self {
        Self::Array(v)
    }
}

impl From<serde_json::Map<String, Json>> for CacheValue {
    fn from(v: serde_json::Map<String, Json>) -> Self {
        Self::Object(Json::Object(v))
    }
}

/// A typed read request: requested kind plus optional default.
///
/// Construction rejects a default whose type disagrees with the requested
/// kind before any transport call is made. A `Mixed` request with a default
/// infers the kind from the default's runtime type.
#[derive(Debug, Clone)]
pub struct TypedRead {
    kind: ValueKind,
    default: Option<CacheValue>,
}

impl TypedRead {
    pub fn new(kind: ValueKind, default: Option<CacheValue>) -> Result<Self> {
        let Some(default_value) = default else {
            return Ok(Self {
                kind,
                default: None,
            });
        };
        let kind = match kind {
            ValueKind::Mixed => default_value.kind(),
            requested if requested == default_value.kind() => requested,
            requested => {
                return Err(CacheError::invalid(format!(
                    "Default value of type \"{}\" does not match requested type \"{}\".",
                    default_value.kind().as_str(),
                    requested.as_str()
                )));
            }
        };
        Ok(Self {
            kind,
            default: Some(default_value),
        })
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub fn default(&self) -> Option<&CacheValue> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn into_default(self) -> Option<CacheValue> {
        self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_request_infers_kind_from_default() {
        let read = TypedRead::new(ValueKind::Mixed, Some(CacheValue::Int(42))).unwrap();
        assert_eq!(read.kind(), ValueKind::Int);
    }

    #[test]
    fn mismatched_default_is_rejected_before_transport() {
        let err = TypedRead::new(ValueKind::Int, Some(CacheValue::from("nope"))).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)));
    }

    #[test]
    fn matching_default_is_accepted() {
        let read = TypedRead::new(ValueKind::Float, Some(CacheValue::Float(1.5))).unwrap();
        assert_eq!(read.kind(), ValueKind::Float);
    }

    #[test]
    fn scalar_wire_roundtrip() {
        for value in [
            CacheValue::Bool(true),
            CacheValue::Bool(false),
            CacheValue::Int(-17),
            CacheValue::Float(2.25),
            CacheValue::from("hello"),
        ] {
            let wire = value.to_wire().unwrap();
            let parsed = CacheValue::parse_wire(value.kind(), &wire).unwrap();
            assert_eq!(parsed, value);
        }
    }

    #[test]
    fn int_request_rejects_text_representation() {
        let err = CacheValue::parse_wire(ValueKind::Int, b"not-a-number").unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)));
    }

    #[test]
    fn mixed_request_passes_raw_text_through() {
        let parsed = CacheValue::parse_wire(ValueKind::Mixed, b"37.5mm").unwrap();
        assert_eq!(parsed, CacheValue::from("37.5mm"));
    }

    #[test]
    fn structured_kinds_have_no_wire_form() {
        assert_eq!(CacheValue::Array(vec![]).to_wire(), None);
        assert!(CacheValue::parse_wire(ValueKind::Array, b"[]").is_err());
    }
}
