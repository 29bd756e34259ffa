//! # Keystash Core
//!
//! Pure building blocks for the keystash caching facade: key legality and
//! namespace composition, lifetime normalization, the typed value model,
//! and the shared error taxonomy. Nothing in this crate performs I/O; every
//! function here is callable before a transport connection exists.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod key;
pub mod lifetime;
pub mod value;

pub use error::{CacheError, Result};
pub use key::{KeyValidator, NS_SEPARATOR, RESERVED_CHARACTERS};
pub use lifetime::{LifeSpan, Lifetime};
pub use value::{CacheValue, TypedRead, ValueKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
