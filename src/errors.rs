//! Error taxonomy for the data store.
//!
//! Fetch failures are wrapped in `Arc` so that every joiner of a fetch cycle
//! receives the same underlying error, and so the entry can retain it until
//! the next successful cycle clears it.

use std::sync::Arc;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// `get`/`refresh`/`preload` was called with a name that has no
    /// registered fetch source. Fatal to that call, never retried.
    #[error("no fetch source registered for key: {name}")]
    UnregisteredSource { name: String },

    /// The registered fetch source failed. Shared by the originating caller
    /// and every joiner of that cycle, and stored on the entry until the next
    /// successful fetch.
    #[error("fetch failed: {0}")]
    Fetch(Arc<anyhow::Error>),

    /// The entry backing an in-flight fetch was removed (`clear`/`clearAll`
    /// or `refresh` during flight) before the cycle settled, so its outcome
    /// never reached this waiter.
    #[error("fetch cycle interrupted before settling")]
    FetchInterrupted,

    /// `get_as` could not deserialize the cached value into the requested
    /// type.
    #[error("failed to deserialize cached value: {0}")]
    Deserialize(Arc<serde_json::Error>),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Settings(#[from] config::ConfigError),
}

impl CacheError {
    /// The shared fetch error carried by this value, if it is a fetch
    /// failure.
    pub fn fetch_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            CacheError::Fetch(inner) => Some(inner),
            _ => None,
        }
    }
}
