//! Key legality checks and namespace composition.
//!
//! Validation is pure and runs before any transport interaction, so a
//! malformed key never reaches the network.

use crate::error::{CacheError, Result};

/// Characters that may not appear in a cache key or member key.
pub const RESERVED_CHARACTERS: &str = "{}()/\\@:";

/// Separator appended to a non-empty namespace.
pub const NS_SEPARATOR: char = ':';

/// Headroom under the maximum key length reserved for internal suffixes.
const NAMESPACE_HEADROOM: usize = 24;

/// Validates key legality and composes namespaced keys.
///
/// `max_key_length` is backend-specific: the remote-store backends enforce
/// 1024 bytes, the in-memory transport is unlimited.
#[derive(Debug, Clone, Default)]
pub struct KeyValidator {
    namespace: String,
    max_key_length: Option<usize>,
}

impl KeyValidator {
    pub fn new(max_key_length: Option<usize>) -> Self {
        Self {
            namespace: String::new(),
            max_key_length,
        }
    }

    /// The active key prefix, including the trailing separator, or an empty
    /// string when no namespace is set.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn max_key_length(&self) -> Option<usize> {
        self.max_key_length
    }

    /// Set the key prefix for this instance.
    ///
    /// The namespace must itself be a legal key and must leave room under
    /// the maximum key length for internal suffixes.
    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        if namespace.is_empty() {
            self.namespace.clear();
            return Ok(());
        }
        if let Some(max) = self.max_key_length {
            let limit = max - NAMESPACE_HEADROOM;
            if namespace.len() > limit {
                return Err(CacheError::invalid(format!(
                    "Namespace must be {limit} chars max, {} given (\"{namespace}\").",
                    namespace.len()
                )));
            }
        }
        let validated = self.validate(namespace, false)?;
        self.namespace = format!("{validated}{NS_SEPARATOR}");
        Ok(())
    }

    /// Check a key for legality and return it, namespaced when requested.
    ///
    /// Fails with `InvalidArgument` when the key is empty, contains a
    /// reserved character, or exceeds the backend maximum after namespacing.
    pub fn validate(&self, key: &str, with_namespace: bool) -> Result<String> {
        if key.is_empty() {
            return Err(CacheError::invalid(
                "Cache key length must be greater than zero.",
            ));
        }
        if key.chars().any(|c| RESERVED_CHARACTERS.contains(c)) {
            return Err(CacheError::invalid(format!(
                "Cache key \"{key}\" contains reserved characters \"{RESERVED_CHARACTERS}\"."
            )));
        }
        let full = if with_namespace {
            format!("{}{key}", self.namespace)
        } else {
            key.to_string()
        };
        if let Some(max) = self.max_key_length {
            if full.len() > max {
                return Err(CacheError::invalid(format!(
                    "Key must be {max} chars max, {} given (\"{full}\").",
                    full.len()
                )));
            }
        }
        Ok(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        let validator = KeyValidator::new(Some(1024));
        assert!(validator.validate("", true).is_err());
    }

    #[test]
    fn rejects_every_reserved_character() {
        let validator = KeyValidator::new(Some(1024));
        for c in RESERVED_CHARACTERS.chars() {
            let key = format!("bad{c}key");
            assert!(
                validator.validate(&key, true).is_err(),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn namespaces_valid_keys() {
        let mut validator = KeyValidator::new(Some(1024));
        validator.set_namespace("app").unwrap();
        assert_eq!(validator.validate("user.1", true).unwrap(), "app:user.1");
        assert_eq!(validator.validate("user.1", false).unwrap(), "user.1");
    }

    #[test]
    fn namespace_roundtrip_appends_separator() {
        let mut validator = KeyValidator::new(Some(1024));
        validator.set_namespace("sessions").unwrap();
        assert_eq!(validator.namespace(), "sessions:");
        validator.set_namespace("").unwrap();
        assert_eq!(validator.namespace(), "");
    }

    #[test]
    fn namespace_reserves_headroom() {
        let mut validator = KeyValidator::new(Some(64));
        assert!(validator.set_namespace(&"n".repeat(40)).is_ok());
        let err = validator.set_namespace(&"n".repeat(41)).unwrap_err();
        assert!(err.to_string().contains("40 chars max"));
    }

    #[test]
    fn namespaced_key_respects_max_length() {
        let mut validator = KeyValidator::new(Some(32));
        validator.set_namespace("ns").unwrap();
        assert!(validator.validate(&"k".repeat(29), true).is_ok());
        assert!(validator.validate(&"k".repeat(30), true).is_err());
    }

    #[test]
    fn unlimited_backend_accepts_long_keys() {
        let validator = KeyValidator::new(None);
        assert!(validator.validate(&"k".repeat(10_000), true).is_ok());
    }
}
