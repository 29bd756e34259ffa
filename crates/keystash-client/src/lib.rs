//! # Keystash Client
//!
//! Typed caching-client facade over a remote key/value and hash-table
//! store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Application Layer                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        StashClient                           │
//! │   (typed accessor · namespacing · lifetimes · maintenance)   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                     │
//!          ▼                   ▼                     ▼
//! ┌────────────────┐  ┌─────────────────┐  ┌──────────────────┐
//! │  DSN Resolver  │  │ Serializer      │  │ Transport trait  │
//! │ (config build) │  │ (structured     │  │ managed / direct │
//! │                │  │  values)        │  │ / memory         │
//! └────────────────┘  └─────────────────┘  └──────────────────┘
//! ```
//!
//! ## Features
//!
//! - `managed-backend`: single-node client with a post-connect handshake
//!   (default)
//! - `direct-backend`: client constructed from the full endpoint list,
//!   cluster-capable (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keystash_client::{Lifetime, Options, StashClient};
//!
//! let mut client = StashClient::connect(
//!     "plain://127.0.0.1:6379?serializer=json",
//!     Options::default(),
//!     "myapp",
//!     Lifetime::Seconds(300),
//! )
//! .await?;
//!
//! client.set("greeting", "hello", Lifetime::Default).await?;
//! let greeting = client.get_string("greeting").await?;
//!
//! client.set_item("fleet", "alpha", "ready", Lifetime::Seconds(60)).await?;
//! let status = client.get_item("fleet", "alpha").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod dsn;
pub mod facade;
pub mod serializer;
pub mod transport;

// Re-export commonly used types
pub use dsn::{
    resolve, BackendKind, ConnectionConfig, Credentials, Endpoint, Failover, Options,
    SerializerMode,
};
pub use facade::StashClient;
pub use keystash_core::{
    CacheError, CacheValue, KeyValidator, LifeSpan, Lifetime, Result, TypedRead, ValueKind,
};
pub use serializer::{JsonSerializer, SerializeError, Serializer};
pub use transport::memory::MemoryTransport;
pub use transport::{connect, Transport, TransportError, TransportResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
