//! Cache entry model and lifecycle states.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;

/// Outcome of a fetch cycle, delivered to every waiter of that cycle.
pub(crate) type FetchOutcome = Result<Value, Arc<anyhow::Error>>;

/// Observable lifecycle state of a cache entry.
///
/// `Empty → Loading → {Fresh, Errored}`; `Fresh` decays to `Stale` purely by
/// time passing, observed lazily at the next read, never via a timer. From
/// `Stale` or `Errored` the next `get` (or `refresh`) re-enters `Loading`.
/// `Errored` retains the last fresh data if one ever existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Empty,
    Loading,
    Fresh,
    Stale,
    Errored,
}

/// One entry per cache key, created lazily on first access and mutated in
/// place under the store lock for every lifecycle transition.
pub(crate) struct CacheEntry {
    /// Last successfully fetched value. Never cleared by a failed fetch.
    pub data: Option<Value>,
    /// Instant of the last successful fetch. Updated only on success.
    pub timestamp: Option<Instant>,
    /// TTL stamped by the most recent fetch cycle for this key.
    pub ttl: Duration,
    /// Guards the at-most-one-in-flight-fetch-per-key invariant.
    pub loading: bool,
    /// Error from the most recent cycle, cleared when a new cycle starts and
    /// on success. Its presence does not imply `data` is absent.
    pub error: Option<Arc<anyhow::Error>>,
    /// Store-wide unique id of the in-flight cycle, used to discard settles
    /// from cycles whose entry was torn down and recreated mid-flight.
    pub cycle: u64,
    /// Followers of the in-flight cycle. Drained and resolved in one step
    /// when the cycle settles.
    pub waiters: Vec<oneshot::Sender<FetchOutcome>>,
}

impl CacheEntry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: None,
            timestamp: None,
            ttl,
            loading: false,
            error: None,
            cycle: 0,
            waiters: Vec::new(),
        }
    }

    /// Enter the Loading state for a new fetch cycle, preserving existing
    /// `data`/`timestamp` as the stale fallback.
    pub fn begin_cycle(&mut self, ttl: Duration, cycle: u64) {
        self.ttl = ttl;
        self.loading = true;
        self.error = None;
        self.cycle = cycle;
    }

    /// Whether the entry holds data from a successful fetch within its TTL.
    pub fn is_fresh(&self) -> bool {
        match self.timestamp {
            Some(stamped) => stamped.elapsed() < self.ttl,
            None => false,
        }
    }

    pub fn state(&self) -> EntryState {
        if self.loading {
            return EntryState::Loading;
        }
        if self.error.is_some() {
            return EntryState::Errored;
        }
        match self.timestamp {
            Some(_) if self.is_fresh() => EntryState::Fresh,
            Some(_) => EntryState::Stale,
            None => EntryState::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_entry_is_empty() {
        let entry = CacheEntry::new(Duration::from_secs(1));
        assert_eq!(entry.state(), EntryState::Empty);
        assert!(!entry.is_fresh());
    }

    #[test]
    fn begin_cycle_preserves_stale_fallback() {
        let mut entry = CacheEntry::new(Duration::from_millis(50));
        entry.data = Some(json!(1));
        entry.timestamp = Some(Instant::now());
        entry.error = Some(Arc::new(anyhow::anyhow!("previous failure")));

        entry.begin_cycle(Duration::from_millis(50), 7);

        assert_eq!(entry.state(), EntryState::Loading);
        assert_eq!(entry.data, Some(json!(1)));
        assert!(entry.timestamp.is_some());
        assert!(entry.error.is_none());
        assert_eq!(entry.cycle, 7);
    }

    #[test]
    fn fresh_decays_to_stale_by_time() {
        let mut entry = CacheEntry::new(Duration::from_millis(20));
        entry.data = Some(json!("v"));
        entry.timestamp = Some(Instant::now());
        assert_eq!(entry.state(), EntryState::Fresh);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(entry.state(), EntryState::Stale);
    }

    #[test]
    fn errored_outranks_fresh_data() {
        let mut entry = CacheEntry::new(Duration::from_secs(10));
        entry.data = Some(json!("v"));
        entry.timestamp = Some(Instant::now());
        entry.error = Some(Arc::new(anyhow::anyhow!("refresh failed")));
        assert_eq!(entry.state(), EntryState::Errored);
        // The stale fallback is still there for get_cached
        assert!(entry.is_fresh());
    }
}
