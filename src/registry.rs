//! Fetch source registry.
//!
//! Maps logical source names to their [`FetchSource`] implementations. The
//! registry is consulted, never mutated, by the dedup/TTL engine; writes only
//! happen through `register`/`register_all` during wiring.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::fetch_source::FetchSource;

#[derive(Default)]
pub struct FetchRegistry {
    sources: DashMap<String, Arc<dyn FetchSource>>,
}

impl FetchRegistry {
    pub fn new() -> Self {
        Self {
            sources: DashMap::new(),
        }
    }

    /// Register a source under `name`, overwriting any prior registration
    /// (idempotent, last-write-wins).
    pub fn register(&self, name: impl Into<String>, source: Arc<dyn FetchSource>) {
        let name = name.into();
        if self.sources.insert(name.clone(), source).is_some() {
            debug!(source = %name, "re-registered fetch source");
        }
    }

    /// Register every (name, source) pair in `map`. Names are unique keys, so
    /// registration order is irrelevant.
    pub fn register_all(&self, map: HashMap<String, Arc<dyn FetchSource>>) {
        for (name, source) in map {
            self.register(name, source);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn FetchSource>> {
        self.sources.get(name).map(|entry| entry.value().clone())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct ConstSource(Value);

    #[async_trait]
    impl FetchSource for ConstSource {
        async fn fetch(&self, _args: &[Value]) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn register_is_last_write_wins() {
        let registry = FetchRegistry::new();
        registry.register("price", Arc::new(ConstSource(json!(1))));
        registry.register("price", Arc::new(ConstSource(json!(2))));

        assert_eq!(registry.len(), 1);
        let source = registry.lookup("price").unwrap();
        assert_eq!(source.fetch(&[]).await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn register_all_registers_every_pair() {
        let registry = FetchRegistry::new();
        let mut map: HashMap<String, Arc<dyn FetchSource>> = HashMap::new();
        map.insert("rules".to_string(), Arc::new(ConstSource(json!("a"))));
        map.insert("dicts".to_string(), Arc::new(ConstSource(json!("b"))));
        registry.register_all(map);

        assert!(registry.is_registered("rules"));
        assert!(registry.is_registered("dicts"));
        assert!(!registry.is_registered("missing"));
    }
}
