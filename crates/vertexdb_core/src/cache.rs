//! Single-level in-memory read cache.
//!
//! Maps encoded keys to their last-observed values, plus a second map for
//! full prefix listings (only unfiltered, uncursored lists are cached).
//! No eviction, no TTL; the cache's scope is a single store partition and
//! its lifetime matches the hosting process instance.
//!
//! Coherence rule: **every mutation invalidates the entire cache** before
//! issuing KV writes. Writes are rare relative to reads, and fine-grained
//! invalidation is error-prone across the cross-subsystem key fan-out.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Cache hit/miss/invalidation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of reads served from the cache.
    pub hits: u64,
    /// Number of reads that fell through to the backend.
    pub misses: u64,
    /// Number of blanket invalidations.
    pub invalidations: u64,
}

/// In-memory map from encoded key to last-observed value.
#[derive(Debug, Default)]
pub struct ReadCache {
    values: Mutex<HashMap<String, Value>>,
    listings: Mutex<HashMap<String, Vec<(String, Value)>>>,
    stats: Mutex<CacheStats>,
}

impl ReadCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let found = self.values.lock().get(key).cloned();
        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    /// Records the observed value for `key`.
    pub fn set(&self, key: &str, value: Value) {
        self.values.lock().insert(key.to_owned(), value);
    }

    /// Returns the cached full listing for `prefix`, if any.
    #[must_use]
    pub fn get_listing(&self, prefix: &str) -> Option<Vec<(String, Value)>> {
        let found = self.listings.lock().get(prefix).cloned();
        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    /// Records the full listing for `prefix`.
    pub fn set_listing(&self, prefix: &str, rows: Vec<(String, Value)>) {
        self.listings.lock().insert(prefix.to_owned(), rows);
    }

    /// Drops every cached value and listing.
    pub fn invalidate_all(&self) {
        self.values.lock().clear();
        self.listings.lock().clear();
        self.stats.lock().invalidations += 1;
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}
