//! Cache error taxonomy shared across the workspace.

use thiserror::Error;

/// Errors surfaced by the caching facade.
///
/// Validation failures (`InvalidArgument`) are raised before any transport
/// round trip. `NotFound` is the only control-flow-like variant; callers on
/// hot paths are expected to supply a default to avoid it.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Malformed key, namespace, DSN or option, or a type disagreement
    /// between a requested type and the default or stored value.
    #[error("{0}")]
    InvalidArgument(String),

    /// Key (or member within a table) absent and no default was supplied.
    #[error("Cache entry not found: \"{key}\"{}", member_suffix(.member))]
    NotFound {
        key: String,
        member: Option<String>,
    },

    /// A remote write or delete primitive reported failure.
    #[error("Cache write failed for key \"{key}\"{}", member_suffix(.member))]
    WriteFailed {
        key: String,
        member: Option<String>,
    },

    /// No usable transport backend is compiled into this build.
    #[error("No usable cache backend available: {0}")]
    BackendUnavailable(String),

    /// Runtime I/O failure reported by the transport on a read-side
    /// primitive.
    #[error("Transport error: {0}")]
    Transport(String),
}

fn member_suffix(member: &Option<String>) -> String {
    member
        .as_deref()
        .map(|m| format!(" member \"{m}\""))
        .unwrap_or_default()
}

impl CacheError {
    /// Shorthand for an `InvalidArgument` with a formatted message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wrap a driver error into the runtime transport variant.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Missing key, optionally scoped to a table member.
    pub fn not_found(key: impl Into<String>, member: Option<&str>) -> Self {
        Self::NotFound {
            key: key.into(),
            member: member.map(str::to_string),
        }
    }

    /// Failed write, optionally scoped to a table member.
    pub fn write_failed(key: impl Into<String>, member: Option<&str>) -> Self {
        Self::WriteFailed {
            key: key.into(),
            member: member.map(str::to_string),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
