//! Time-bounded cache of idempotent responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::ports::Clock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    /// Bumped by every `clear`.
    epoch: u64,
}

/// Response cache keyed by `"<METHOD> <path?query>"` with a uniform TTL.
///
/// Every `clear` starts a new epoch. A response fetched before the clear is
/// stored with [`ResponseCache::set_if_epoch`] and dropped, so an in-flight
/// read cannot repopulate the cache for the next session.
pub struct ResponseCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<Entries>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Returns the cached value for `key` if it has not expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        entries
            .map
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.value.clone())
    }

    /// Returns the current epoch. Read it before dispatching a request whose
    /// response will be cached.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.entries.lock().epoch
    }

    /// Stores `value` under `key`, dropping expired entries first.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let mut entries = self.entries.lock();
        self.insert(&mut entries, key.into(), value);
    }

    /// Stores `value` only if the cache has not been cleared since `epoch`
    /// was read. Returns whether the value was stored.
    pub fn set_if_epoch(&self, key: impl Into<String>, value: Value, epoch: u64) -> bool {
        let mut entries = self.entries.lock();
        if entries.epoch != epoch {
            return false;
        }
        self.insert(&mut entries, key.into(), value);
        true
    }

    /// Drops every entry and starts a new epoch.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.map.clear();
        entries.epoch = entries.epoch.wrapping_add(1);
    }

    /// Returns the number of stored entries, including expired ones not yet
    /// purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, entries: &mut Entries, key: String, value: Value) {
        let now = self.clock.now();
        entries.map.retain(|_, entry| self.is_fresh(entry, now));
        entries.map.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
            },
        );
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }
}
