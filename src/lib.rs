//! # DataStore SDK
//!
//! A Rust library providing a generic keyed asynchronous cache between data
//! consumers and registered fetch sources. The store guarantees at most one
//! in-flight fetch per logical key even under concurrent callers, honors
//! time-to-live (TTL) expiry, and retains the last good value when a refresh
//! fails.
//!
//! ## Overview
//!
//! Consumers register named asynchronous fetch sources once at startup, then
//! read through the cache everywhere else:
//!
//! - **Deduplication**: concurrent requests for the same (name, arguments)
//!   pair collapse into a single underlying fetch; every caller observes the
//!   same outcome.
//! - **TTL expiry**: cached data is served until its per-call TTL elapses,
//!   observed lazily at the next read rather than via timers.
//! - **Stale-on-error**: a failed refresh keeps the previously fetched value
//!   and records the error alongside it.
//!
//! ## Architecture
//!
//! The SDK is organized into a few small layers:
//!
//! ### Registry Layer
//! Maps logical source names to [`FetchSource`] implementations; consulted,
//! never mutated, by the engine.
//!
//! ### Key Derivation
//! Deterministically maps a (name, argument list) pair to a single cache key
//! string.
//!
//! ### Dedup/TTL Engine
//! Decides per call whether to serve cached data, join an in-flight fetch, or
//! start a new fetch cycle, and applies each cycle's outcome to the entry in
//! one synchronous step.
//!
//! ### Public API
//! [`DataStore`] exposes `get`/`get_with_ttl`/`get_as`, the synchronous
//! inspectors, and the mutating operations (`refresh`, `preload`, `clear`).
//!
//! ## Example
//!
//! ```rust,no_run
//! use datastore_sdk::{DataStore, Settings};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = DataStore::with_settings(&Settings::new()?);
//!     store.register_fn("token_list", |_args| async move {
//!         // Wrap an HTTP/RPC call here
//!         Ok(json!(["SOL", "USDC"]))
//!     });
//!
//!     let tokens = store.get("token_list", &[]).await?;
//!     println!("{}", tokens);
//!     Ok(())
//! }
//! ```

// Core Types
/// Cache entry model and lifecycle states
pub mod entry;
/// Error taxonomy
pub mod errors;

// Fetch Layer
/// Trait for registered asynchronous fetch sources
pub mod fetch_source;
/// Name → fetch source registry
pub mod registry;

// Cache Engine
/// Deterministic cache key derivation
pub mod cache_key;
/// Keyed async store with dedup, TTL, and stale-on-error
pub mod data_store;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use data_store::{CacheMetricsSnapshot, DataStore, DEFAULT_TTL};
pub use entry::EntryState;
pub use errors::{CacheError, CacheResult};
pub use fetch_source::{FetchSource, FnSource};
pub use registry::FetchRegistry;
pub use settings::Settings;
