//! In-memory read-through cache with a fixed time-to-live.
//!
//! Entries are usable while `now - recorded_at < ttl` and treated as absent
//! afterwards. There is no size-based eviction: the key space is bounded by
//! the entities viewed in one session. Nothing is persisted.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Default entry lifetime (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    recorded_at: Instant,
}

/// TTL cache keyed by entity id.
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached payload for `key`, or `None` if missing or expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if self.is_fresh(entry) {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.get(key).is_some_and(|e| self.is_fresh(e))
    }

    /// Store `payload`, stamping it with the current time.
    pub fn put(&mut self, key: K, payload: V) {
        let recorded_at = self.clock.now();
        self.entries.insert(key, CacheEntry { payload, recorded_at });
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.recorded_at) < ttl);
        before - self.entries.len()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry<V>) -> bool {
        self.clock.now().saturating_duration_since(entry.recorded_at) < self.ttl
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
