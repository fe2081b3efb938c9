//! KV backend trait definition.

use crate::error::StorageResult;
use serde_json::Value;
use std::collections::BTreeMap;

/// Hard cap on the number of keys a single batched get/put/delete accepts.
///
/// Callers that need to touch more keys must split the work into chunks of
/// at most this size.
pub const MAX_BATCH: usize = 128;

/// Options for read operations.
///
/// `allow_concurrency` is a scheduling hint: a read so tagged may be
/// reordered ahead of other unfinished reads on the same partition, but
/// never across a write. Writes never set it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Whether the read may be reordered ahead of other reads.
    pub allow_concurrency: bool,
}

impl ReadOptions {
    /// Options for a read that tolerates reordering against other reads.
    #[must_use]
    pub const fn concurrent() -> Self {
        Self {
            allow_concurrency: true,
        }
    }
}

/// Options for prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only keys starting with this prefix are returned.
    pub prefix: Option<String>,
    /// Exclusive lower bound: listing starts after this key.
    pub start_after: Option<String>,
    /// Exclusive upper bound: listing stops before this key.
    pub end: Option<String>,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
    /// Return entries in descending key order.
    pub reverse: bool,
    /// Whether the read may be reordered ahead of other reads.
    pub allow_concurrency: bool,
}

impl ListOptions {
    /// Lists every key under the given prefix.
    #[must_use]
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            allow_concurrency: true,
            ..Self::default()
        }
    }

    /// Sets the exclusive start bound.
    #[must_use]
    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.start_after = Some(key.into());
        self
    }

    /// Sets the exclusive end bound.
    #[must_use]
    pub fn end(mut self, key: impl Into<String>) -> Self {
        self.end = Some(key.into());
        self
    }

    /// Sets the maximum number of entries.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the listing direction.
    #[must_use]
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

/// Operations available inside a KV transaction.
///
/// Reads observe writes staged earlier in the same transaction.
pub trait KvTransaction {
    /// Reads a single row.
    fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Stages a write.
    fn put(&mut self, key: &str, value: Value) -> StorageResult<()>;

    /// Stages a delete. Returns whether the row existed at stage time.
    fn delete(&mut self, key: &str) -> StorageResult<bool>;

    /// Lists rows, observing staged writes and deletes.
    fn list(&self, options: &ListOptions) -> StorageResult<Vec<(String, Value)>>;
}

/// An ordered key-value store for one partition.
///
/// # Invariants
///
/// - `list` returns entries in ascending key order (descending with
///   `reverse`), honoring `prefix`, `start_after`, `end`, and `limit`
/// - Batched operations reject more than [`MAX_BATCH`] keys with
///   [`crate::StorageError::BatchTooLarge`]
/// - `get_many` omits missing keys from the result map
/// - A transaction applies all staged writes or none: an error returned
///   from the closure discards every staged write
/// - Backends must be `Send + Sync` for shared access
///
/// # Implementors
///
/// - [`crate::InMemoryKv`] - For testing and ephemeral partitions
pub trait KvBackend: Send + Sync {
    /// Reads a single row.
    fn get(&self, key: &str, options: &ReadOptions) -> StorageResult<Option<Value>>;

    /// Reads up to [`MAX_BATCH`] rows. Missing keys are absent from the map.
    fn get_many(
        &self,
        keys: &[String],
        options: &ReadOptions,
    ) -> StorageResult<BTreeMap<String, Value>>;

    /// Writes a single row.
    fn put(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Writes up to [`MAX_BATCH`] rows.
    fn put_many(&self, entries: Vec<(String, Value)>) -> StorageResult<()>;

    /// Deletes a single row. Returns whether it existed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Deletes up to [`MAX_BATCH`] rows. Returns the number removed.
    fn delete_many(&self, keys: &[String]) -> StorageResult<usize>;

    /// Lists rows per the given options.
    fn list(&self, options: &ListOptions) -> StorageResult<Vec<(String, Value)>>;

    /// Runs `f` as a transaction.
    ///
    /// Writes staged by `f` become visible atomically when it returns `Ok`.
    /// An `Err` return discards every staged write and is propagated.
    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn KvTransaction) -> StorageResult<()>,
    ) -> StorageResult<()>;
}
