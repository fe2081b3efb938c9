//! Store facade: wires the engines together and dispatches envelopes.

use crate::backup::BackupManager;
use crate::cache::ReadCache;
use crate::chunk::ChunkedKv;
use crate::config::Config;
use crate::entity::EntityEngine;
use crate::error::StoreResult;
use crate::index::IndexEngine;
use crate::relationship::RelationshipEngine;
use crate::router::{
    Command, Envelope, IndexCommand, QueryCommand, RelationshipCommand, StoreCommand,
};
use serde_json::{json, Value};
use std::sync::Arc;
use vertexdb_storage::{BlobStore, KvBackend};

/// One tenant partition of the graph store.
///
/// Construction is leaves-first: the cache and chunked view come up
/// before the index and relationship engines, and the entity engine holds
/// shared references to both (it cascades deletions into the relationship
/// engine and fans writes out through the index engine).
pub struct GraphStore {
    config: Config,
    cache: Arc<ReadCache>,
    chunked: ChunkedKv,
    index: Arc<IndexEngine>,
    relationships: Arc<RelationshipEngine>,
    entities: EntityEngine,
    backups: BackupManager,
}

impl GraphStore {
    /// Opens a store over the given backend and blob store.
    pub fn open(
        config: Config,
        kv: Arc<dyn KvBackend>,
        blobs: Arc<dyn BlobStore>,
    ) -> StoreResult<Self> {
        let cache = Arc::new(ReadCache::new());
        let chunked = ChunkedKv::new(
            kv.clone(),
            cache.clone(),
            config.chunk_size,
            config.cache_enabled,
        );
        let index = Arc::new(IndexEngine::new(kv.clone(), chunked.clone())?);
        let relationships = Arc::new(RelationshipEngine::new(kv.clone(), chunked.clone()));
        let entities = EntityEngine::new(
            kv.clone(),
            chunked.clone(),
            index.clone(),
            relationships.clone(),
        );
        let backups = BackupManager::new(config.partition.clone(), kv, chunked.clone(), blobs);

        tracing::debug!(partition = %config.partition, "store opened");
        Ok(Self {
            config,
            cache,
            chunked,
            index,
            relationships,
            entities,
            backups,
        })
    }

    /// The store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared read cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    /// The chunked KV view.
    #[must_use]
    pub fn chunked(&self) -> &ChunkedKv {
        &self.chunked
    }

    /// The index engine.
    #[must_use]
    pub fn indexes(&self) -> &Arc<IndexEngine> {
        &self.index
    }

    /// The relationship engine.
    #[must_use]
    pub fn relationships(&self) -> &Arc<RelationshipEngine> {
        &self.relationships
    }

    /// The entity engine.
    #[must_use]
    pub fn entities(&self) -> &EntityEngine {
        &self.entities
    }

    /// The backup manager.
    #[must_use]
    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Parses and executes one envelope, returning the response body.
    ///
    /// Every mutating command invalidates the entire read cache before it
    /// reaches its engine.
    pub fn dispatch(&self, envelope: &Envelope) -> StoreResult<Value> {
        let command = Command::parse(envelope)?;
        if command.is_mutation() {
            self.cache.invalidate_all();
        }
        self.execute(command)
    }

    fn execute(&self, command: Command) -> StoreResult<Value> {
        match command {
            Command::Index(command) => self.execute_index(command),
            Command::Query(command) => self.execute_query(command),
            Command::Relationship(command) => self.execute_relationship(command),
            Command::Store(command) => self.execute_store(command),
        }
    }

    fn execute_index(&self, command: IndexCommand) -> StoreResult<Value> {
        match command {
            IndexCommand::Create(request) => {
                let definition = self.index.create_index(&request.property)?;
                Ok(serde_json::to_value(definition)?)
            }
            IndexCommand::Read(request) => {
                let definition = self.index.read_index(&request.id)?;
                Ok(serde_json::to_value(definition)?)
            }
            IndexCommand::Update(definition) => {
                let definition = self
                    .index
                    .update_index(&definition.id, &definition.property)?;
                Ok(serde_json::to_value(definition)?)
            }
            IndexCommand::Remove(request) => {
                let removed = self.index.remove_index(&request.id)?;
                Ok(json!({ "success": removed }))
            }
            IndexCommand::List => Ok(serde_json::to_value(self.index.list_indexes())?),
        }
    }

    fn execute_query(&self, command: QueryCommand) -> StoreResult<Value> {
        match command {
            QueryCommand::Create(request) => {
                let stored =
                    self.entities
                        .create(&request.key, request.value, request.index.as_deref())?;
                Ok(Value::Object(stored))
            }
            QueryCommand::BatchCreate(request) => {
                let stored = self.entities.batch_create(request.entries)?;
                Ok(Value::Array(stored.into_iter().map(Value::Object).collect()))
            }
            QueryCommand::Read(request) => {
                let entity = self
                    .entities
                    .read(request.key.as_deref(), request.index.as_deref())?;
                Ok(Value::Object(entity))
            }
            QueryCommand::BatchRead(request) => {
                let found = self
                    .entities
                    .batch_read(&request.keys, request.index.as_deref())?;
                Ok(Value::Array(
                    found
                        .into_iter()
                        .map(|entity| entity.map_or(Value::Null, Value::Object))
                        .collect(),
                ))
            }
            QueryCommand::Update(request) => {
                let merged = self.entities.update(&request.key, request.value)?;
                Ok(Value::Object(merged))
            }
            QueryCommand::BatchUpdate(request) => {
                let merged = self.entities.batch_update(request.entries)?;
                Ok(Value::Array(merged.into_iter().map(Value::Object).collect()))
            }
            QueryCommand::BatchUpsert(request) => {
                let merged = self.entities.batch_upsert(request.entries)?;
                Ok(Value::Array(merged.into_iter().map(Value::Object).collect()))
            }
            QueryCommand::Remove(request) => {
                self.entities.remove(&request.key)?;
                Ok(json!({ "success": true }))
            }
            QueryCommand::BatchRemove(request) => {
                self.entities.batch_remove(&request.keys)?;
                Ok(json!({ "success": true }))
            }
            QueryCommand::List(request) => {
                let listed = self.entities.list(&request)?;
                let mut mapping = serde_json::Map::new();
                for (id, entity) in listed {
                    mapping.insert(id, Value::Object(entity));
                }
                Ok(Value::Object(mapping))
            }
            QueryCommand::Purge => {
                self.entities.purge()?;
                Ok(json!(true))
            }
        }
    }

    fn execute_relationship(&self, command: RelationshipCommand) -> StoreResult<Value> {
        match command {
            RelationshipCommand::Create(spec) => {
                self.relationships.create(&spec)?;
                Ok(json!({ "success": true }))
            }
            RelationshipCommand::BatchCreate(specs) => {
                self.relationships.create_batch(&specs)?;
                Ok(json!({ "success": true }))
            }
            RelationshipCommand::Read(request) => {
                let exists = self.relationships.has(&request)?;
                Ok(json!({ "exists": exists }))
            }
            RelationshipCommand::Remove(spec) => {
                Ok(json!({ "success": self.relationships.remove(&spec) }))
            }
            RelationshipCommand::BatchRemove(specs) => {
                Ok(json!({ "success": self.relationships.remove_batch(&specs) }))
            }
            RelationshipCommand::RemoveNode(request) => {
                Ok(json!({ "success": self.relationships.remove_node(&request.node) }))
            }
            RelationshipCommand::BatchRemoveNode(requests) => {
                let nodes: Vec<String> =
                    requests.into_iter().map(|request| request.node).collect();
                Ok(json!({ "success": self.relationships.remove_node_batch(&nodes) }))
            }
            RelationshipCommand::List(request) => {
                let page = self.relationships.list(&request)?;
                Ok(serde_json::to_value(page)?)
            }
            RelationshipCommand::BatchList(request) => {
                let pages = self.relationships.list_batch(&request.requests)?;
                Ok(serde_json::to_value(pages)?)
            }
            RelationshipCommand::Purge => {
                let removed = self.relationships.purge()?;
                Ok(json!(removed))
            }
        }
    }

    fn execute_store(&self, command: StoreCommand) -> StoreResult<Value> {
        match command {
            StoreCommand::Backup => {
                let name = self.backups.backup(None)?;
                Ok(json!(name))
            }
            StoreCommand::Restore(request) => {
                let count = self.backups.restore(&request.backup_id)?;
                Ok(json!({ "count": count }))
            }
        }
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("partition", &self.config.partition)
            .finish_non_exhaustive()
    }
}
