//! Chunked KV access with read-through caching.
//!
//! The KV backend caps batched calls at [`MAX_BATCH`] keys. [`ChunkedKv`]
//! splits any larger get/put/delete into chunks of at most the configured
//! size and merges the results, preserving the "missing key ⇒ absent"
//! contract of `get_many`. Reads consult the [`ReadCache`] first; fetched
//! values are written back. Writes invalidate the entire cache before
//! touching the backend.

use crate::cache::ReadCache;
use crate::error::StoreResult;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use vertexdb_storage::{KvBackend, ListOptions, ReadOptions, MAX_BATCH};

/// Chunked, cache-integrated view over the KV backend.
#[derive(Clone)]
pub struct ChunkedKv {
    kv: Arc<dyn KvBackend>,
    cache: Arc<ReadCache>,
    chunk_size: usize,
    cache_enabled: bool,
}

impl ChunkedKv {
    /// Creates a chunked view over `kv` with the given cache.
    #[must_use]
    pub fn new(
        kv: Arc<dyn KvBackend>,
        cache: Arc<ReadCache>,
        chunk_size: usize,
        cache_enabled: bool,
    ) -> Self {
        Self {
            kv,
            cache,
            chunk_size: chunk_size.clamp(1, MAX_BATCH),
            cache_enabled,
        }
    }

    /// The underlying backend.
    #[must_use]
    pub fn kv(&self) -> &Arc<dyn KvBackend> {
        &self.kv
    }

    /// The shared read cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    /// Drops every cached value and listing.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Reads a single row through the cache.
    pub fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        if self.cache_enabled {
            if let Some(value) = self.cache.get(key) {
                return Ok(Some(value));
            }
        }
        let fetched = self.kv.get(key, &ReadOptions::concurrent())?;
        if self.cache_enabled {
            if let Some(value) = &fetched {
                self.cache.set(key, value.clone());
            }
        }
        Ok(fetched)
    }

    /// Reads many rows, splitting cache misses into backend chunks.
    ///
    /// Missing keys are absent from the result map.
    pub fn get_many(&self, keys: &[String]) -> StoreResult<BTreeMap<String, Value>> {
        let mut found = BTreeMap::new();
        if keys.is_empty() {
            return Ok(found);
        }

        let mut misses: Vec<String> = Vec::new();
        for key in keys {
            if found.contains_key(key) || misses.contains(key) {
                continue;
            }
            match self.cache_enabled.then(|| self.cache.get(key)).flatten() {
                Some(value) => {
                    found.insert(key.clone(), value);
                }
                None => misses.push(key.clone()),
            }
        }

        for chunk in misses.chunks(self.chunk_size) {
            let fetched = self.kv.get_many(chunk, &ReadOptions::concurrent())?;
            for (key, value) in fetched {
                if self.cache_enabled {
                    self.cache.set(&key, value.clone());
                }
                found.insert(key, value);
            }
        }
        Ok(found)
    }

    /// Lists every row under `prefix`, serving repeated calls from the
    /// cached full listing.
    ///
    /// Only these unfiltered, uncursored listings are cached; bounded or
    /// limited listings always hit the backend.
    pub fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>> {
        if self.cache_enabled {
            if let Some(rows) = self.cache.get_listing(prefix) {
                return Ok(rows);
            }
        }
        let rows = self.kv.list(&ListOptions::prefixed(prefix))?;
        if self.cache_enabled {
            self.cache.set_listing(prefix, rows.clone());
        }
        Ok(rows)
    }

    /// Writes many rows in chunks, invalidating the cache first.
    ///
    /// Empty input is a no-op (the cache is left untouched).
    pub fn put_many(&self, entries: Vec<(String, Value)>) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.cache.invalidate_all();
        for chunk in entries.chunks(self.chunk_size) {
            self.kv.put_many(chunk.to_vec())?;
        }
        Ok(())
    }

    /// Deletes many rows in chunks, invalidating the cache first.
    ///
    /// Returns the number of rows actually removed. Empty input is a
    /// no-op.
    pub fn delete_many(&self, keys: &[String]) -> StoreResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.cache.invalidate_all();
        let mut removed = 0;
        for chunk in keys.chunks(self.chunk_size) {
            removed += self.kv.delete_many(chunk)?;
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for ChunkedKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedKv")
            .field("chunk_size", &self.chunk_size)
            .field("cache_enabled", &self.cache_enabled)
            .finish_non_exhaustive()
    }
}
