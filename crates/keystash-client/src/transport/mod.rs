//! Transport primitives over the remote store.
//!
//! The facade never touches the driver directly; it calls these primitives
//! on a boxed [`Transport`]. Two backend client shapes implement the trait
//! for the real store (the managed single-node shape and the direct
//! client shape), plus [`memory::MemoryTransport`] for tests and local
//! development.

use async_trait::async_trait;
use keystash_core::{CacheError, Result};

use crate::dsn::{BackendKind, ConnectionConfig, Credentials};

#[cfg(feature = "direct-backend")]
pub(crate) mod direct;
#[cfg(any(feature = "managed-backend", feature = "direct-backend"))]
pub(crate) mod driver;
#[cfg(feature = "managed-backend")]
pub(crate) mod managed;
pub mod memory;

/// Driver-level failure. The facade maps these into the caller-facing error
/// taxonomy depending on the operation that failed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<redis::RedisError> for TransportError {
    fn from(err: redis::RedisError) -> Self {
        Self(err.to_string())
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Primitive operations the facade needs from the remote store.
///
/// Implementations hold one logical connection handle; callers provide
/// external synchronization if they share a transport across tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, key: &str) -> TransportResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8]) -> TransportResult<()>;
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_secs: u64) -> TransportResult<()>;
    /// Returns the number of keys actually removed.
    async fn unlink(&self, keys: &[String]) -> TransportResult<u64>;
    async fn exists(&self, key: &str) -> TransportResult<bool>;

    async fn h_get(&self, key: &str, member: &str) -> TransportResult<Option<Vec<u8>>>;
    async fn h_set(&self, key: &str, member: &str, value: &[u8]) -> TransportResult<()>;
    /// Returns `true` when the member existed and was removed.
    async fn h_del(&self, key: &str, member: &str) -> TransportResult<bool>;
    async fn h_exists(&self, key: &str, member: &str) -> TransportResult<bool>;
    async fn h_get_all(&self, key: &str) -> TransportResult<Vec<(String, Vec<u8>)>>;

    /// Apply a lifetime to a key. `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> TransportResult<bool>;
    /// Raw TTL reply: `-2` missing key, `-1` no expiry, else seconds left.
    async fn ttl(&self, key: &str) -> TransportResult<i64>;

    async fn keys(&self, pattern: &str) -> TransportResult<Vec<String>>;

    async fn is_connected(&self) -> bool;
    /// Authenticate after connecting. Used by the managed handshake.
    async fn auth(&self, credentials: &Credentials) -> TransportResult<()>;
    /// Select a database index. Used by the managed handshake.
    async fn select(&self, dbindex: u32) -> TransportResult<()>;

    /// Maximum key length this backend enforces, `None` for unlimited.
    fn max_key_length(&self) -> Option<usize>;
}

/// Open a live transport for a resolved configuration, performing the
/// backend handshake.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn Transport>> {
    match config.backend {
        #[cfg(feature = "managed-backend")]
        BackendKind::Managed => Ok(Box::new(managed::ManagedTransport::connect(config).await?)),
        #[cfg(feature = "direct-backend")]
        BackendKind::Direct => Ok(Box::new(direct::DirectTransport::connect(config).await?)),
        #[allow(unreachable_patterns)]
        other => Err(CacheError::BackendUnavailable(format!(
            "the {} backend is not compiled into this build",
            other.as_str()
        ))),
    }
}
