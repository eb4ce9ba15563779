//! # Keyed Asynchronous Data Store
//!
//! The core of the SDK: a cache that mediates between consumers and the
//! registered fetch sources. It guarantees at most one in-flight fetch per
//! cache key even under concurrent callers, honors per-call TTL expiry, and
//! retains the last good value when a refresh fails.
//!
//! ## How a `get` resolves
//!
//! 1. Look up the registered source for the name (error if none).
//! 2. Derive the cache key from the name and positional arguments.
//! 3. Under the store lock, take exactly one path:
//!    - **Fresh hit** — entry has unexpired data and no fetch in flight:
//!      return the cached value, no source invocation.
//!    - **Join** — a fetch is already in flight for the key: attach a
//!      follower to that cycle and await its outcome.
//!    - **Start** — otherwise mark the entry loading (preserving existing
//!      data as the stale fallback), spawn the fetch, and await the outcome
//!      as the cycle's first follower.
//!
//! The check-and-mark step happens entirely inside one lock acquisition with
//! no await points, which is what prevents two callers racing on the same
//! expired key from both starting a fetch. The lock is never held across an
//! await.
//!
//! A source that never settles leaves its entry loading forever and starves
//! every follower. There is no cancellation or timeout applied to sources;
//! that is a documented limitation, not a feature.

use std::collections::HashMap;
use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cache_key::derive_cache_key;
use crate::entry::{CacheEntry, EntryState, FetchOutcome};
use crate::errors::{CacheError, CacheResult};
use crate::fetch_source::{FetchSource, FnSource};
use crate::registry::FetchRegistry;
use crate::settings::Settings;

/// TTL applied when the caller does not pass one explicitly.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Cheap cloneable handle to one cache instance. Construct one at startup and
/// pass clones to every consumer; all clones share the same entries and
/// registered sources.
#[derive(Clone)]
pub struct DataStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    cache: Mutex<HashMap<String, CacheEntry>>,
    registry: FetchRegistry,
    default_ttl: Duration,
    /// Monotonic id handed to each fetch cycle so a settle can be matched to
    /// the cycle that produced it, even after the entry was torn down and
    /// recreated mid-flight.
    cycle_counter: AtomicU64,
    metrics: CacheMetrics,
}

#[derive(Default)]
struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    joins: AtomicU64,
    fetch_errors: AtomicU64,
}

/// Point-in-time view of the store's counters.
#[derive(Debug, Clone)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub joins: u64,
    pub fetch_errors: u64,
    pub hit_rate: f64,
    pub cache_size: usize,
}

/// What a locked inspection of the entry decided to do.
enum Plan {
    /// Serve the cached value as-is.
    Hit(Value),
    /// Follow an already in-flight cycle.
    Join(oneshot::Receiver<FetchOutcome>),
    /// A new cycle was marked loading under the lock; the fetch itself is
    /// spawned after the lock is released.
    Start {
        receiver: oneshot::Receiver<FetchOutcome>,
        cycle: u64,
    },
}

impl DataStore {
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                cache: Mutex::new(HashMap::new()),
                registry: FetchRegistry::new(),
                default_ttl: settings.default_ttl(),
                cycle_counter: AtomicU64::new(0),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    // --- registration -----------------------------------------------------

    /// Register a fetch source under `name`, overwriting any prior
    /// registration for that name.
    pub fn register(&self, name: impl Into<String>, source: Arc<dyn FetchSource>) {
        self.inner.registry.register(name, source);
    }

    /// Register a plain async closure as a fetch source.
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let boxed = move |args: Vec<Value>| func(args).boxed();
        self.register(name, Arc::new(FnSource::new(boxed)));
    }

    /// Register every (name, source) pair in `map`.
    pub fn register_all(&self, map: HashMap<String, Arc<dyn FetchSource>>) {
        self.inner.registry.register_all(map);
    }

    // --- dedup/TTL engine -------------------------------------------------

    /// Fetch-through-cache with the default TTL.
    pub async fn get(&self, name: &str, args: &[Value]) -> CacheResult<Value> {
        self.get_with_ttl(name, self.inner.default_ttl, args).await
    }

    /// Fetch-through-cache. Serves the cached value while it is within
    /// `ttl`, joins an in-flight fetch for the same key, or invokes the
    /// registered source — whichever the entry state calls for.
    pub async fn get_with_ttl(
        &self,
        name: &str,
        ttl: Duration,
        args: &[Value],
    ) -> CacheResult<Value> {
        let source =
            self.inner
                .registry
                .lookup(name)
                .ok_or_else(|| CacheError::UnregisteredSource {
                    name: name.to_string(),
                })?;
        let key = derive_cache_key(name, args);

        let plan = {
            let mut cache = self.inner.lock_cache();
            let entry = cache
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(ttl));

            if !entry.loading && entry.is_fresh() {
                if let Some(data) = entry.data.clone() {
                    self.inner.metrics.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("DataStore: cache hit for {}", key);
                    Plan::Hit(data)
                } else {
                    // Unreachable in practice: timestamp is only stamped
                    // together with data. Treat as a miss.
                    self.start_cycle(entry, ttl, &key)
                }
            } else if entry.loading {
                let (sender, receiver) = oneshot::channel();
                entry.waiters.push(sender);
                self.inner.metrics.joins.fetch_add(1, Ordering::Relaxed);
                debug!("DataStore: joining in-flight fetch for {}", key);
                Plan::Join(receiver)
            } else {
                self.start_cycle(entry, ttl, &key)
            }
        };

        let receiver = match plan {
            Plan::Hit(value) => return Ok(value),
            Plan::Join(receiver) => receiver,
            Plan::Start { receiver, cycle } => {
                self.spawn_fetch(source, key, cycle, args.to_vec());
                receiver
            }
        };

        match receiver.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CacheError::Fetch(err)),
            // The entry (and our sender with it) was removed mid-flight.
            Err(_) => Err(CacheError::FetchInterrupted),
        }
    }

    /// Typed convenience over [`DataStore::get`].
    pub async fn get_as<T: DeserializeOwned>(&self, name: &str, args: &[Value]) -> CacheResult<T> {
        let value = self.get(name, args).await?;
        serde_json::from_value(value).map_err(|err| CacheError::Deserialize(Arc::new(err)))
    }

    /// Mark the entry loading for a new cycle. Runs under the store lock and
    /// must not await; the fetch itself is spawned by the caller once the
    /// lock is released.
    fn start_cycle(&self, entry: &mut CacheEntry, ttl: Duration, key: &str) -> Plan {
        let cycle = self.inner.cycle_counter.fetch_add(1, Ordering::Relaxed) + 1;
        entry.begin_cycle(ttl, cycle);

        let (sender, receiver) = oneshot::channel();
        entry.waiters.push(sender);
        self.inner.metrics.misses.fetch_add(1, Ordering::Relaxed);
        debug!("DataStore: starting fetch cycle {} for {}", cycle, key);

        Plan::Start { receiver, cycle }
    }

    // --- synchronous inspectors -------------------------------------------
    //
    // Pure reads: no fetches, no timestamp perturbation.

    /// The cached value if it is within its TTL, regardless of whether a
    /// refresh cycle is currently in flight.
    pub fn get_cached(&self, name: &str, args: &[Value]) -> Option<Value> {
        let key = derive_cache_key(name, args);
        let cache = self.inner.lock_cache();
        cache
            .get(&key)
            .filter(|entry| entry.is_fresh())
            .and_then(|entry| entry.data.clone())
    }

    /// True iff an entry exists and is within TTL (independent of loading).
    pub fn has_valid_cache(&self, name: &str, args: &[Value]) -> bool {
        let key = derive_cache_key(name, args);
        self.inner
            .lock_cache()
            .get(&key)
            .map(CacheEntry::is_fresh)
            .unwrap_or(false)
    }

    /// True iff a fetch is in flight for the derived key.
    pub fn is_loading(&self, name: &str, args: &[Value]) -> bool {
        let key = derive_cache_key(name, args);
        self.inner
            .lock_cache()
            .get(&key)
            .map(|entry| entry.loading)
            .unwrap_or(false)
    }

    /// The error stored by the most recent failed cycle, if any.
    pub fn get_error(&self, name: &str, args: &[Value]) -> Option<Arc<anyhow::Error>> {
        let key = derive_cache_key(name, args);
        self.inner
            .lock_cache()
            .get(&key)
            .and_then(|entry| entry.error.clone())
    }

    /// Lifecycle state of the entry for the derived key.
    pub fn entry_state(&self, name: &str, args: &[Value]) -> EntryState {
        let key = derive_cache_key(name, args);
        self.inner
            .lock_cache()
            .get(&key)
            .map(CacheEntry::state)
            .unwrap_or(EntryState::Empty)
    }

    // --- mutating operations ----------------------------------------------

    /// Drop the entry and fetch anew with the default TTL: the source is
    /// invoked exactly once more even if the previous entry was still within
    /// TTL. Waiters of a cycle that was in flight for this key observe
    /// `FetchInterrupted`; the stale cycle's eventual settle is discarded.
    pub async fn refresh(&self, name: &str, args: &[Value]) -> CacheResult<Value> {
        let key = derive_cache_key(name, args);
        self.inner.lock_cache().remove(&key);
        self.get(name, args).await
    }

    /// Fire-and-forget `get` to warm the cache speculatively. Failures are
    /// logged and discarded, never propagated.
    pub fn preload(&self, name: &str, args: &[Value]) {
        let store = self.clone();
        let name = name.to_string();
        let args = args.to_vec();
        tokio::spawn(async move {
            if let Err(err) = store.get(&name, &args).await {
                debug!("DataStore: preload of {} failed: {}", name, err);
            }
        });
    }

    /// `preload` every name in `names` with no arguments.
    pub fn preload_all<S: AsRef<str>>(&self, names: &[S]) {
        for name in names {
            self.preload(name.as_ref(), &[]);
        }
    }

    /// Remove the single entry for the derived key, if present. Followers of
    /// an in-flight cycle for that key observe `FetchInterrupted`.
    pub fn clear(&self, name: &str, args: &[Value]) {
        let key = derive_cache_key(name, args);
        self.inner.lock_cache().remove(&key);
    }

    /// Remove every entry.
    pub fn clear_all(&self) {
        self.inner.lock_cache().clear();
    }

    // --- observability ----------------------------------------------------

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        let hits = self.inner.metrics.hits.load(Ordering::Relaxed);
        let misses = self.inner.metrics.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheMetricsSnapshot {
            hits,
            misses,
            joins: self.inner.metrics.joins.load(Ordering::Relaxed),
            fetch_errors: self.inner.metrics.fetch_errors.load(Ordering::Relaxed),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            cache_size: self.inner.lock_cache().len(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock_cache().is_empty()
    }

    /// Spawn the fetch for a freshly started cycle. The spawned task settles
    /// the cycle whether or not the originating caller is still around, so a
    /// caller dropping its future mid-fetch cannot wedge the entry in the
    /// loading state.
    fn spawn_fetch(&self, source: Arc<dyn FetchSource>, key: String, cycle: u64, args: Vec<Value>) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let result = source.fetch(&args).await;
            inner.settle(&key, cycle, result);
        });
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreInner {
    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panicked holder cannot leave the map mid-transition: every
        // critical section only mutates plain fields.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a fetch outcome to the entry and wake every follower of the
    /// cycle. One synchronous step per lifecycle transition.
    fn settle(&self, key: &str, cycle: u64, result: Result<Value>) {
        let mut cache = self.lock_cache();
        let entry = match cache.get_mut(key) {
            Some(entry) if entry.loading && entry.cycle == cycle => entry,
            // Entry was cleared (or replaced by a newer cycle) mid-flight;
            // its waiters were dropped with it and already observed the
            // interruption.
            _ => {
                debug!("DataStore: discarding settle of torn-down cycle {} for {}", cycle, key);
                return;
            }
        };

        let waiters = mem::take(&mut entry.waiters);
        match result {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.timestamp = Some(Instant::now());
                entry.loading = false;
                entry.error = None;
                drop(cache);

                debug!("DataStore: cycle {} for {} settled, waking {} waiter(s)", cycle, key, waiters.len());
                for waiter in waiters {
                    let _ = waiter.send(Ok(value.clone()));
                }
            }
            Err(err) => {
                let shared = Arc::new(err);
                entry.loading = false;
                entry.error = Some(shared.clone());
                self.metrics.fetch_errors.fetch_add(1, Ordering::Relaxed);
                drop(cache);

                warn!("DataStore: fetch for {} failed, retaining stale value: {}", key, shared);
                for waiter in waiters {
                    let _ = waiter.send(Err(shared.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn hit_rate_reflects_hits_and_misses() {
        let store = DataStore::new();
        store.register_fn("constant", |_args| async move { Ok(json!(1)) });

        store.get("constant", &[]).await.unwrap();
        store.get("constant", &[]).await.unwrap();
        store.get("constant", &[]).await.unwrap();

        let snapshot = store.metrics();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.hits, 2);
        assert!((snapshot.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.cache_size, 1);
    }

    #[tokio::test]
    async fn default_store_uses_the_one_hour_ttl() {
        let store = DataStore::default();
        assert_eq!(store.inner.default_ttl, DEFAULT_TTL);
    }
}
