//! # Fetch Source Trait
//!
//! This module defines the abstraction for the data-fetching functions the
//! store mediates. A `FetchSource` is an opaque asynchronous producer: given
//! an ordered argument list it yields a JSON value, typically by wrapping an
//! HTTP or RPC call. The store never inspects what a source does — it only
//! caches, deduplicates, and expires the results.
//!
//! ## Implementing a Source
//!
//! Implement the trait directly for stateful sources (e.g. a source holding
//! an HTTP client), or use [`FnSource`] to lift a plain async closure:
//!
//! ```rust,no_run
//! use datastore_sdk::fetch_source::FetchSource;
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use serde_json::{json, Value};
//!
//! struct TokenListSource {
//!     endpoint: String,
//! }
//!
//! #[async_trait]
//! impl FetchSource for TokenListSource {
//!     async fn fetch(&self, _args: &[Value]) -> Result<Value> {
//!         // Query self.endpoint and convert the response to JSON
//!         Ok(json!([]))
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

/// An asynchronous data producer registered under a logical source name.
///
/// Arguments are positional and opaque to the store; they participate only in
/// cache key derivation. Implementations must be safe to call concurrently,
/// though the store guarantees at most one in-flight call per cache key.
#[async_trait]
pub trait FetchSource: Send + Sync {
    async fn fetch(&self, args: &[Value]) -> Result<Value>;
}

/// Adapter lifting a plain async closure into a [`FetchSource`].
///
/// Most registrations go through `DataStore::register_fn`, which wraps the
/// closure in this type; constructing it directly is only needed when the
/// boxed form is already at hand.
pub struct FnSource<F> {
    func: F,
}

impl<F> FnSource<F>
where
    F: Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> FetchSource for FnSource<F>
where
    F: Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync,
{
    async fn fetch(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    #[tokio::test]
    async fn fn_source_forwards_args() {
        let source = FnSource::new(|args: Vec<Value>| {
            async move { Ok(json!({ "echo": args })) }.boxed()
        });

        let out = source.fetch(&[json!(7), json!("usdc")]).await.unwrap();
        assert_eq!(out, json!({ "echo": [7, "usdc"] }));
    }

    #[tokio::test]
    async fn fn_source_propagates_errors() {
        let source = FnSource::new(|_args: Vec<Value>| {
            async move { Err(anyhow::anyhow!("upstream unavailable")) }.boxed()
        });

        let err = source.fetch(&[]).await.unwrap_err();
        assert!(err.to_string().contains("upstream unavailable"));
    }
}
