//! Entity engine: orchestrates index fan-out and relationship cascade.

use crate::chunk::ChunkedKv;
use crate::entity::payload::{entity_id, merge, with_id, Entity};
use crate::error::{StoreError, StoreResult};
use crate::index::IndexEngine;
use crate::keys::resolve_storage_key;
use crate::pagination::ensure_allowed_combination;
use crate::relationship::RelationshipEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use vertexdb_storage::{KvBackend, ListOptions};

/// Request to create one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueryRequest {
    /// Canonical storage key.
    pub key: String,
    /// The entity payload.
    pub value: Entity,
    /// Accepted for catalog symmetry; creation derives index rows from
    /// the declarations, not from this parameter.
    #[serde(default)]
    pub index: Option<String>,
}

/// Request to create many entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCreateRequest {
    /// Storage key → payload, in input order.
    pub entries: serde_json::Map<String, Value>,
    /// Accepted for catalog symmetry; see [`CreateQueryRequest::index`].
    #[serde(default)]
    pub index: Option<String>,
}

/// Request to read one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadQueryRequest {
    /// Storage key, or the indexed value when `index` is also given.
    #[serde(default)]
    pub key: Option<String>,
    /// Index property to read through.
    #[serde(default)]
    pub index: Option<String>,
}

/// Request to read many entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReadRequest {
    /// Keys to read, resolved per-element against `index`.
    pub keys: Vec<String>,
    /// Index property to read through.
    #[serde(default)]
    pub index: Option<String>,
}

/// Request to update one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQueryRequest {
    /// Storage key of the entity.
    pub key: String,
    /// Patch merged shallowly over the current value.
    pub value: Entity,
}

/// Request carrying a batch of entries for update or upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntriesRequest {
    /// Storage key → patch/payload, in input order.
    pub entries: serde_json::Map<String, Value>,
}

/// Request to remove one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveQueryRequest {
    /// Storage key of the entity.
    pub key: String,
}

/// Request to remove many entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRemoveRequest {
    /// Storage keys of the entities.
    pub keys: Vec<String>,
}

/// A numeric range predicate for list queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangePredicate {
    /// The property compared.
    pub property: String,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
}

impl RangePredicate {
    /// Whether `entity` satisfies this predicate.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        entity
            .get(&self.property)
            .and_then(Value::as_f64)
            .is_some_and(|n| self.min <= n && n <= self.max)
    }
}

/// Request to list entities under a prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQueryRequest {
    /// Prefix, or the indexed value when `index` is also given.
    #[serde(default)]
    pub key: Option<String>,
    /// Index property to list through.
    #[serde(default)]
    pub index: Option<String>,
    /// Limit to the first N entries.
    #[serde(default)]
    pub first: Option<usize>,
    /// Limit to the last N entries (reverse listing).
    #[serde(default)]
    pub last: Option<usize>,
    /// Exclusive upper key bound.
    #[serde(default)]
    pub before: Option<String>,
    /// Exclusive lower key bound.
    #[serde(default)]
    pub after: Option<String>,
    /// Range predicates; an entry must satisfy every one.
    #[serde(default)]
    pub query: Option<Vec<RangePredicate>>,
}

impl ListQueryRequest {
    fn is_paginated(&self) -> bool {
        self.first.is_some() || self.last.is_some() || self.before.is_some() || self.after.is_some()
    }
}

/// Converts an ordered JSON object of payloads into entity entries.
fn entries_from_map(entries: serde_json::Map<String, Value>) -> StoreResult<Vec<(String, Entity)>> {
    entries
        .into_iter()
        .map(|(key, value)| match value {
            Value::Object(entity) => Ok((key, entity)),
            other => Err(StoreError::bad_request(format!(
                "entry {key} is not an object: {other}"
            ))),
        })
        .collect()
}

/// Entity CRUD, batch, list, and range-query operations.
///
/// Holds shared references to the index engine (write fan-out on every
/// mutation) and the relationship engine (cascade on deletion).
pub struct EntityEngine {
    kv: Arc<dyn KvBackend>,
    chunked: ChunkedKv,
    index: Arc<IndexEngine>,
    relationships: Arc<RelationshipEngine>,
}

impl EntityEngine {
    /// Creates the engine over the shared backend, chunked view, and
    /// sibling engines.
    #[must_use]
    pub fn new(
        kv: Arc<dyn KvBackend>,
        chunked: ChunkedKv,
        index: Arc<IndexEngine>,
        relationships: Arc<RelationshipEngine>,
    ) -> Self {
        Self {
            kv,
            chunked,
            index,
            relationships,
        }
    }

    /// Creates one entity, persisting the primary row and every index row
    /// in a single transaction. Returns the stored payload (id injected).
    pub fn create(&self, key: &str, value: Entity, _index: Option<&str>) -> StoreResult<Entity> {
        let value = with_id(key, value);
        let rows = self.index.expand_write(key, &value);
        self.chunked.invalidate_cache();
        self.kv.transaction(&mut |txn| {
            for (row_key, row_value) in &rows {
                txn.put(row_key, row_value.clone())?;
            }
            Ok(())
        })?;
        Ok(value)
    }

    /// Creates many entities through chunked writes.
    ///
    /// Returns the caller-visible records in input order.
    pub fn batch_create(
        &self,
        entries: serde_json::Map<String, Value>,
    ) -> StoreResult<Vec<Entity>> {
        let entries = entries_from_map(entries)?;
        let mut rows = Vec::new();
        let mut visible = Vec::new();
        for (key, value) in entries {
            let value = with_id(&key, value);
            rows.extend(self.index.expand_write(&key, &value));
            visible.push(value);
        }
        self.chunked.put_many(rows)?;
        Ok(visible)
    }

    /// Reads one entity through the cache.
    ///
    /// The storage key resolves as `key` alone, `index` alone, or
    /// `index + "--" + key` for indexed reads.
    pub fn read(&self, key: Option<&str>, index: Option<&str>) -> StoreResult<Entity> {
        let storage_key = resolve_storage_key(key, index)
            .ok_or_else(|| StoreError::bad_request("read requires a key or an index"))?;
        match self.chunked.get(&storage_key)? {
            Some(Value::Object(entity)) => Ok(entity),
            Some(_) => Err(StoreError::unexpected(format!(
                "row {storage_key} is not an entity"
            ))),
            None => Err(StoreError::not_found(format!("entity {storage_key}"))),
        }
    }

    /// Reads many entities, preserving input order and filling `None` for
    /// misses.
    pub fn batch_read(
        &self,
        keys: &[String],
        index: Option<&str>,
    ) -> StoreResult<Vec<Option<Entity>>> {
        let resolved: Vec<String> = keys
            .iter()
            .map(|key| resolve_storage_key(Some(key), index).unwrap_or_else(|| key.clone()))
            .collect();
        let found = self.chunked.get_many(&resolved)?;
        Ok(resolved
            .iter()
            .map(|key| found.get(key).and_then(Value::as_object).cloned())
            .collect())
    }

    /// Updates one entity strictly: `NotFound` unless it exists.
    ///
    /// The patch is merged shallowly over the current value; new index
    /// rows are written and dangling ones deleted in one transaction.
    pub fn update(&self, key: &str, patch: Entity) -> StoreResult<Entity> {
        let current = match self.chunked.get(key)? {
            Some(Value::Object(entity)) => entity,
            _ => return Err(StoreError::not_found(format!("entity {key}"))),
        };
        let merged = with_id(key, merge(&current, &patch));
        let rows = self.index.expand_write(key, &merged);
        let dangling = self.index.dangling(&current, &merged);

        self.chunked.invalidate_cache();
        self.kv.transaction(&mut |txn| {
            for (row_key, row_value) in &rows {
                txn.put(row_key, row_value.clone())?;
            }
            for row_key in &dangling {
                txn.delete(row_key)?;
            }
            Ok(())
        })?;
        Ok(merged)
    }

    /// Updates many entities strictly; aborts with `NotFound` if any is
    /// missing.
    pub fn batch_update(
        &self,
        entries: serde_json::Map<String, Value>,
    ) -> StoreResult<Vec<Entity>> {
        self.merge_entries(entries, true)
    }

    /// Merges many entities, creating the ones that do not exist yet.
    pub fn batch_upsert(
        &self,
        entries: serde_json::Map<String, Value>,
    ) -> StoreResult<Vec<Entity>> {
        self.merge_entries(entries, false)
    }

    /// Shared engine behind batch update and upsert.
    fn merge_entries(
        &self,
        entries: serde_json::Map<String, Value>,
        throw_on_missing: bool,
    ) -> StoreResult<Vec<Entity>> {
        let entries = entries_from_map(entries)?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
        let current = self.chunked.get_many(&keys)?;
        if throw_on_missing {
            for key in &keys {
                if !current.contains_key(key) {
                    return Err(StoreError::not_found(format!("entity {key}")));
                }
            }
        }

        let mut rows: Vec<(String, Value)> = Vec::new();
        let mut dangling: BTreeSet<String> = BTreeSet::new();
        let mut results = Vec::new();
        for (key, patch) in entries {
            let existing = current.get(&key).and_then(Value::as_object);
            let next = match existing {
                Some(existing) => with_id(&key, merge(existing, &patch)),
                None => with_id(&key, patch),
            };
            if let Some(existing) = existing {
                dangling.extend(self.index.dangling(existing, &next));
            }
            rows.extend(self.index.expand_write(&key, &next));
            results.push(next);
        }

        // A key dangling for one entry may be freshly written by another;
        // the write wins.
        let written: BTreeSet<String> = rows.iter().map(|(key, _)| key.clone()).collect();
        let dangling: Vec<String> = dangling
            .into_iter()
            .filter(|key| !written.contains(key))
            .collect();

        self.chunked.put_many(rows)?;
        self.chunked.delete_many(&dangling)?;
        Ok(results)
    }

    /// Removes one entity, its index rows, and every incident edge.
    ///
    /// The index rows are derived from the entity's actual current
    /// properties. `DeleteFailed` when no row was removed.
    pub fn remove(&self, key: &str) -> StoreResult<()> {
        let current = self.chunked.get(key)?;
        let mut delete_keys = vec![key.to_owned()];
        if let Some(Value::Object(entity)) = &current {
            delete_keys.extend(self.index.indexed_keys_for(entity));
        }

        let removed = self.chunked.delete_many(&delete_keys)?;
        if removed == 0 {
            return Err(StoreError::delete_failed(format!("no rows for {key}")));
        }
        if !self.relationships.remove_node(key) {
            tracing::warn!(key, "edge cascade reported failure during entity removal");
        }
        Ok(())
    }

    /// Removes many entities and cascades their edges.
    pub fn batch_remove(&self, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let current = self.chunked.get_many(keys)?;
        let mut delete_keys: BTreeSet<String> = BTreeSet::new();
        for key in keys {
            delete_keys.insert(key.clone());
            if let Some(Value::Object(entity)) = current.get(key) {
                delete_keys.extend(self.index.indexed_keys_for(entity));
            }
        }
        let delete_keys: Vec<String> = delete_keys.into_iter().collect();
        self.chunked.delete_many(&delete_keys)?;
        if !self.relationships.remove_node_batch(keys) {
            tracing::warn!("edge cascade reported failure during batch entity removal");
        }
        Ok(())
    }

    /// Lists entities under a prefix as an ordered `id → entity` mapping.
    ///
    /// With any of `first`/`last`/`before`/`after` present this is a
    /// paginated listing against the backend; otherwise the full prefix is
    /// loaded (served from the listing cache when warm) and optionally
    /// filtered by the range predicates.
    pub fn list(&self, request: &ListQueryRequest) -> StoreResult<Vec<(String, Entity)>> {
        let prefix =
            resolve_storage_key(request.key.as_deref(), request.index.as_deref()).unwrap_or_default();

        let rows = if request.is_paginated() {
            ensure_allowed_combination(
                request.first,
                request.last,
                request.before.as_deref(),
                request.after.as_deref(),
            )?;
            let mut options = ListOptions::prefixed(prefix);
            options.start_after = request.after.clone();
            options.end = request.before.clone();
            options.limit = request.first.or(request.last);
            options.reverse = request.last.is_some();
            self.kv.list(&options)?
        } else {
            let mut rows = self.chunked.list_prefix(&prefix)?;
            if let Some(predicates) = &request.query {
                rows.retain(|(_, value)| {
                    value
                        .as_object()
                        .is_some_and(|entity| predicates.iter().all(|p| p.matches(entity)))
                });
            }
            rows
        };

        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Object(entity) => {
                    let id = entity_id(&key, &entity);
                    Some((id, entity))
                }
                _ => None,
            })
            .collect())
    }

    /// Deletes the entire KV namespace. Backups are untouched.
    ///
    /// Returns the number of rows removed.
    pub fn purge(&self) -> StoreResult<usize> {
        self.chunked.invalidate_cache();
        let rows = self.kv.list(&ListOptions {
            allow_concurrency: true,
            ..ListOptions::default()
        })?;
        let keys: Vec<String> = rows.into_iter().map(|(key, _)| key).collect();
        self.chunked.delete_many(&keys)
    }
}

impl std::fmt::Debug for EntityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityEngine").finish_non_exhaustive()
    }
}
