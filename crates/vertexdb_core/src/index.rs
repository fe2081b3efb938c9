//! Secondary-index engine.
//!
//! Indexes are user-declared on entity properties. Declarations live under
//! the `idx:` prefix; an in-memory snapshot of them is refreshed after
//! every declaration mutation, under the snapshot's write lock so readers
//! never observe a partially loaded set.
//!
//! Index entries are maintained in lockstep with entity writes: the entity
//! engine asks [`IndexEngine::expand_write`] for the extra rows a write
//! must persist and [`IndexEngine::dangling`] for the rows an update must
//! delete.

use crate::chunk::ChunkedKv;
use crate::entity::{scalar_to_string, Entity};
use crate::error::{StoreError, StoreResult};
use crate::keys::{index_declaration_key, index_entry_key, INDEX_DECLARATION_PREFIX};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use vertexdb_storage::{KvBackend, ListOptions};

/// A persisted index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Storage key of the declaration, always `idx:` + property.
    pub id: String,
    /// The entity property this index covers.
    pub property: String,
}

impl IndexDefinition {
    /// Creates the declaration for an index on `property`.
    #[must_use]
    pub fn for_property(property: impl Into<String>) -> Self {
        let property = property.into();
        Self {
            id: index_declaration_key(&property),
            property,
        }
    }
}

/// Maintains the set of declared indexes and computes index-row fan-out.
pub struct IndexEngine {
    kv: Arc<dyn KvBackend>,
    chunked: ChunkedKv,
    snapshot: RwLock<BTreeMap<String, IndexDefinition>>,
}

impl IndexEngine {
    /// Creates the engine and loads the declaration snapshot.
    pub fn new(kv: Arc<dyn KvBackend>, chunked: ChunkedKv) -> StoreResult<Self> {
        let engine = Self {
            kv,
            chunked,
            snapshot: RwLock::new(BTreeMap::new()),
        };
        engine.refresh()?;
        Ok(engine)
    }

    /// Reloads the snapshot from storage.
    ///
    /// The write lock is held across the reload so concurrent readers
    /// never observe a partially loaded set.
    fn refresh(&self) -> StoreResult<()> {
        let mut snapshot = self.snapshot.write();
        let rows = self
            .kv
            .list(&ListOptions::prefixed(INDEX_DECLARATION_PREFIX))?;
        snapshot.clear();
        for (key, value) in rows {
            match serde_json::from_value::<IndexDefinition>(value) {
                Ok(definition) => {
                    snapshot.insert(key, definition);
                }
                Err(err) => {
                    tracing::warn!(%key, %err, "skipping malformed index declaration");
                }
            }
        }
        Ok(())
    }

    /// Declares an index on `property`.
    pub fn create_index(&self, property: &str) -> StoreResult<IndexDefinition> {
        let definition = IndexDefinition::for_property(property);
        self.chunked.invalidate_cache();
        self.kv.put(&definition.id, serde_json::to_value(&definition)?)?;
        self.refresh()?;
        Ok(definition)
    }

    /// Overwrites the declaration stored at `id`.
    pub fn update_index(&self, id: &str, property: &str) -> StoreResult<IndexDefinition> {
        let definition = IndexDefinition {
            id: id.to_owned(),
            property: property.to_owned(),
        };
        self.chunked.invalidate_cache();
        self.kv.put(id, serde_json::to_value(&definition)?)?;
        self.refresh()?;
        Ok(definition)
    }

    /// Reads the declaration stored at `id`.
    pub fn read_index(&self, id: &str) -> StoreResult<IndexDefinition> {
        match self.snapshot.read().get(id) {
            Some(definition) => Ok(definition.clone()),
            None => Err(StoreError::not_found(format!("index {id}"))),
        }
    }

    /// Deletes the declaration stored at `id`.
    ///
    /// Returns whether a declaration was actually removed.
    pub fn remove_index(&self, id: &str) -> StoreResult<bool> {
        self.chunked.invalidate_cache();
        let existed = self.kv.delete(id)?;
        self.refresh()?;
        Ok(existed)
    }

    /// Returns every declaration keyed by id.
    #[must_use]
    pub fn list_indexes(&self) -> BTreeMap<String, IndexDefinition> {
        self.snapshot.read().clone()
    }

    /// Returns the declared definitions.
    #[must_use]
    pub fn definitions(&self) -> Vec<IndexDefinition> {
        self.snapshot.read().values().cloned().collect()
    }

    /// Expands an entity write into the full set of rows to persist: the
    /// primary `(key, value)` plus one index entry per declared index
    /// whose property appears in `value` with a scalar value.
    #[must_use]
    pub fn expand_write(&self, key: &str, value: &Entity) -> Vec<(String, Value)> {
        let payload = Value::Object(value.clone());
        let mut rows = vec![(key.to_owned(), payload.clone())];
        for storage_key in self.indexed_keys_for(value) {
            rows.push((storage_key, payload.clone()));
        }
        rows
    }

    /// The index entry keys a given entity value occupies.
    ///
    /// Properties whose value does not coerce to a string (anything but a
    /// string or finite number) are skipped at row construction.
    #[must_use]
    pub fn indexed_keys_for(&self, value: &Entity) -> Vec<String> {
        let snapshot = self.snapshot.read();
        let mut keys = Vec::new();
        for definition in snapshot.values() {
            if let Some(coerced) = value.get(&definition.property).and_then(scalar_to_string) {
                keys.push(index_entry_key(&definition.property, &coerced));
            }
        }
        keys
    }

    /// Index rows justified by `old` but not by `new`.
    ///
    /// On update these must be deleted or they would keep pointing at a
    /// superseded property value.
    #[must_use]
    pub fn dangling(&self, old: &Entity, new: &Entity) -> Vec<String> {
        let next: Vec<String> = self.indexed_keys_for(new);
        self.indexed_keys_for(old)
            .into_iter()
            .filter(|key| !next.contains(key))
            .collect()
    }
}

impl std::fmt::Debug for IndexEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexEngine")
            .field("declared", &self.snapshot.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ReadCache;
    use serde_json::json;
    use vertexdb_storage::{InMemoryKv, MAX_BATCH};

    fn engine() -> IndexEngine {
        let kv: Arc<dyn KvBackend> = Arc::new(InMemoryKv::new());
        let cache = Arc::new(ReadCache::new());
        let chunked = ChunkedKv::new(kv.clone(), cache, MAX_BATCH, true);
        IndexEngine::new(kv, chunked).unwrap()
    }

    fn entity(value: serde_json::Value) -> Entity {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn create_assigns_prefixed_id_and_refreshes() {
        let engine = engine();
        let definition = engine.create_index("age").unwrap();
        assert_eq!(definition.id, "idx:age");
        assert_eq!(engine.list_indexes().len(), 1);
    }

    #[test]
    fn read_missing_index_is_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.read_index("idx:absent"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn update_overwrites_in_place() {
        let engine = engine();
        engine.create_index("age").unwrap();
        let updated = engine.update_index("idx:age", "years").unwrap();
        assert_eq!(updated.property, "years");
        assert_eq!(engine.read_index("idx:age").unwrap().property, "years");
    }

    #[test]
    fn remove_reports_whether_anything_was_deleted() {
        let engine = engine();
        engine.create_index("age").unwrap();
        assert!(engine.remove_index("idx:age").unwrap());
        assert!(!engine.remove_index("idx:age").unwrap());
        assert!(engine.list_indexes().is_empty());
    }

    #[test]
    fn expand_write_adds_one_row_per_covered_property() {
        let engine = engine();
        engine.create_index("a").unwrap();
        engine.create_index("b").unwrap();
        engine.create_index("missing").unwrap();

        let value = entity(json!({"a": 1, "b": "two", "c": 3}));
        let rows = engine.expand_write("entity-1", &value);

        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["entity-1", "a--1", "b--two"]);
        for (_, row) in &rows {
            assert_eq!(row, &Value::Object(value.clone()));
        }
    }

    #[test]
    fn non_scalar_properties_are_skipped() {
        let engine = engine();
        engine.create_index("tags").unwrap();
        let value = entity(json!({"tags": ["x", "y"]}));
        assert!(engine.indexed_keys_for(&value).is_empty());
    }

    #[test]
    fn dangling_is_the_difference_of_old_and_new_keys() {
        let engine = engine();
        engine.create_index("a").unwrap();
        engine.create_index("b").unwrap();

        let old = entity(json!({"a": 1, "b": 2}));
        let new = entity(json!({"a": 1, "b": 3}));
        assert_eq!(engine.dangling(&old, &new), vec!["b--2".to_owned()]);
        assert!(engine.dangling(&old, &old).is_empty());
    }
}
