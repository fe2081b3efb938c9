//! In-memory KV backend for testing and ephemeral partitions.

use crate::backend::{KvBackend, KvTransaction, ListOptions, ReadOptions, MAX_BATCH};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Rejects batches over the per-call cap.
fn ensure_batch(len: usize) -> StorageResult<()> {
    if len > MAX_BATCH {
        return Err(StorageError::batch_too_large(MAX_BATCH, len));
    }
    Ok(())
}

/// Selects rows from an ordered map per the listing options.
///
/// Bounds apply to the key range regardless of direction; `reverse` flips
/// the output order and `limit` truncates after the flip.
fn select_rows(rows: &BTreeMap<String, Value>, options: &ListOptions) -> Vec<(String, Value)> {
    let mut selected: Vec<(String, Value)> = rows
        .iter()
        .filter(|(key, _)| {
            if let Some(prefix) = &options.prefix {
                if !key.starts_with(prefix.as_str()) {
                    return false;
                }
            }
            if let Some(start) = &options.start_after {
                if key.as_str() <= start.as_str() {
                    return false;
                }
            }
            if let Some(end) = &options.end {
                if key.as_str() >= end.as_str() {
                    return false;
                }
            }
            true
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if options.reverse {
        selected.reverse();
    }
    if let Some(limit) = options.limit {
        selected.truncate(limit);
    }
    selected
}

/// An in-memory KV backend.
///
/// Stores all rows in an ordered map. Suitable for:
/// - Unit and integration tests
/// - Ephemeral partitions that don't need persistence
///
/// # Thread Safety
///
/// The backend is thread-safe and can be shared across threads. A
/// transaction holds the write lock for its whole duration, so staged
/// writes become visible atomically.
#[derive(Debug, Default)]
pub struct InMemoryKv {
    rows: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryKv {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with rows.
    ///
    /// Useful for testing restore scenarios.
    #[must_use]
    pub fn with_rows(rows: BTreeMap<String, Value>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns whether the backend holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

/// Transaction state: staged puts and deletes over the live map.
struct MemoryTransaction<'a> {
    base: &'a BTreeMap<String, Value>,
    puts: BTreeMap<String, Value>,
    deletes: BTreeSet<String>,
}

impl MemoryTransaction<'_> {
    fn merged(&self) -> BTreeMap<String, Value> {
        let mut merged = self.base.clone();
        for key in &self.deletes {
            merged.remove(key);
        }
        for (key, value) in &self.puts {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

impl KvTransaction for MemoryTransaction<'_> {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        if let Some(value) = self.puts.get(key) {
            return Ok(Some(value.clone()));
        }
        if self.deletes.contains(key) {
            return Ok(None);
        }
        Ok(self.base.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Value) -> StorageResult<()> {
        self.deletes.remove(key);
        self.puts.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StorageResult<bool> {
        let existed = self.puts.remove(key).is_some() || self.base.contains_key(key);
        self.deletes.insert(key.to_owned());
        Ok(existed)
    }

    fn list(&self, options: &ListOptions) -> StorageResult<Vec<(String, Value)>> {
        Ok(select_rows(&self.merged(), options))
    }
}

impl KvBackend for InMemoryKv {
    fn get(&self, key: &str, _options: &ReadOptions) -> StorageResult<Option<Value>> {
        Ok(self.rows.read().get(key).cloned())
    }

    fn get_many(
        &self,
        keys: &[String],
        _options: &ReadOptions,
    ) -> StorageResult<BTreeMap<String, Value>> {
        ensure_batch(keys.len())?;
        let rows = self.rows.read();
        let mut found = BTreeMap::new();
        for key in keys {
            if let Some(value) = rows.get(key) {
                found.insert(key.clone(), value.clone());
            }
        }
        Ok(found)
    }

    fn put(&self, key: &str, value: Value) -> StorageResult<()> {
        self.rows.write().insert(key.to_owned(), value);
        Ok(())
    }

    fn put_many(&self, entries: Vec<(String, Value)>) -> StorageResult<()> {
        ensure_batch(entries.len())?;
        let mut rows = self.rows.write();
        for (key, value) in entries {
            rows.insert(key, value);
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.rows.write().remove(key).is_some())
    }

    fn delete_many(&self, keys: &[String]) -> StorageResult<usize> {
        ensure_batch(keys.len())?;
        let mut rows = self.rows.write();
        let mut removed = 0;
        for key in keys {
            if rows.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn list(&self, options: &ListOptions) -> StorageResult<Vec<(String, Value)>> {
        Ok(select_rows(&self.rows.read(), options))
    }

    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn KvTransaction) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let mut rows = self.rows.write();
        let mut txn = MemoryTransaction {
            base: &*rows,
            puts: BTreeMap::new(),
            deletes: BTreeSet::new(),
        };
        f(&mut txn)?;
        let MemoryTransaction { puts, deletes, .. } = txn;
        for key in &deletes {
            rows.remove(key);
        }
        for (key, value) in puts {
            rows.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> InMemoryKv {
        let kv = InMemoryKv::new();
        for key in ["a", "b", "c", "idx:name", "idx:age", "z"] {
            kv.put(key, json!(key)).unwrap();
        }
        kv
    }

    #[test]
    fn get_returns_stored_value() {
        let kv = InMemoryKv::new();
        kv.put("k", json!({"a": 1})).unwrap();
        let value = kv.get("k", &ReadOptions::default()).unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[test]
    fn get_missing_returns_none() {
        let kv = InMemoryKv::new();
        assert!(kv.get("absent", &ReadOptions::default()).unwrap().is_none());
    }

    #[test]
    fn get_many_omits_missing_keys() {
        let kv = seeded();
        let keys = vec!["a".to_owned(), "absent".to_owned(), "b".to_owned()];
        let found = kv.get_many(&keys, &ReadOptions::default()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains_key("a"));
        assert!(!found.contains_key("absent"));
    }

    #[test]
    fn batch_cap_enforced_on_reads() {
        let kv = InMemoryKv::new();
        let keys: Vec<String> = (0..MAX_BATCH + 1).map(|i| format!("k{i}")).collect();
        let err = kv.get_many(&keys, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, StorageError::BatchTooLarge { actual: 129, .. }));
    }

    #[test]
    fn batch_cap_allows_exactly_max() {
        let kv = InMemoryKv::new();
        let entries: Vec<(String, Value)> =
            (0..MAX_BATCH).map(|i| (format!("k{i}"), json!(i))).collect();
        kv.put_many(entries).unwrap();
        assert_eq!(kv.len(), MAX_BATCH);

        let keys: Vec<String> = (0..MAX_BATCH).map(|i| format!("k{i}")).collect();
        assert_eq!(kv.get_many(&keys, &ReadOptions::default()).unwrap().len(), MAX_BATCH);
        assert_eq!(kv.delete_many(&keys).unwrap(), MAX_BATCH);
    }

    #[test]
    fn delete_reports_existence() {
        let kv = seeded();
        assert!(kv.delete("a").unwrap());
        assert!(!kv.delete("a").unwrap());
    }

    #[test]
    fn delete_many_counts_removed_rows() {
        let kv = seeded();
        let keys = vec!["a".to_owned(), "absent".to_owned(), "b".to_owned()];
        assert_eq!(kv.delete_many(&keys).unwrap(), 2);
    }

    #[test]
    fn list_filters_by_prefix() {
        let kv = seeded();
        let rows = kv.list(&ListOptions::prefixed("idx:")).unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["idx:age", "idx:name"]);
    }

    #[test]
    fn list_honors_bounds() {
        let kv = seeded();
        let rows = kv
            .list(&ListOptions::default().start_after("a").end("z"))
            .unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "idx:age", "idx:name"]);
    }

    #[test]
    fn list_reverse_flips_order_before_limit() {
        let kv = seeded();
        let rows = kv
            .list(&ListOptions::default().reverse(true).limit(2))
            .unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "idx:name"]);
    }

    #[test]
    fn transaction_applies_staged_writes() {
        let kv = InMemoryKv::new();
        kv.put("keep", json!(1)).unwrap();
        kv.put("drop", json!(2)).unwrap();

        kv.transaction(&mut |txn| {
            txn.put("new", json!(3))?;
            txn.delete("drop")?;
            Ok(())
        })
        .unwrap();

        assert!(kv.get("new", &ReadOptions::default()).unwrap().is_some());
        assert!(kv.get("drop", &ReadOptions::default()).unwrap().is_none());
    }

    #[test]
    fn transaction_error_discards_staged_writes() {
        let kv = InMemoryKv::new();
        kv.put("k", json!(1)).unwrap();

        let result = kv.transaction(&mut |txn| {
            txn.put("k", json!(2))?;
            txn.put("other", json!(3))?;
            Err(StorageError::transaction_aborted("forced"))
        });

        assert!(result.is_err());
        assert_eq!(kv.get("k", &ReadOptions::default()).unwrap(), Some(json!(1)));
        assert!(kv.get("other", &ReadOptions::default()).unwrap().is_none());
    }

    #[test]
    fn transaction_reads_observe_staged_state() {
        let kv = InMemoryKv::new();
        kv.put("a", json!(1)).unwrap();

        kv.transaction(&mut |txn| {
            txn.put("b", json!(2))?;
            txn.delete("a")?;
            assert_eq!(txn.get("b")?, Some(json!(2)));
            assert!(txn.get("a")?.is_none());

            let rows = txn.list(&ListOptions::default())?;
            let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["b"]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn transaction_delete_reports_staged_existence() {
        let kv = InMemoryKv::new();
        kv.transaction(&mut |txn| {
            txn.put("fresh", json!(1))?;
            assert!(txn.delete("fresh")?);
            assert!(!txn.delete("never")?);
            Ok(())
        })
        .unwrap();
        assert!(kv.is_empty());
    }
}
