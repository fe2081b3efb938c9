//! # VertexDB Core
//!
//! Core engine for VertexDB, an embedded graph-shaped key-value store.
//!
//! Three co-designed services share one flat KV namespace per tenant
//! partition:
//!
//! - **Entity store** - keyed records with CRUD, batch, list, and
//!   range-query operations
//! - **Secondary-index engine** - declared indexes on entity properties,
//!   maintained transactionally in lockstep with entity writes
//! - **Relationship engine** - symmetric named edges between nodes,
//!   maintained in both directions, with cursor pagination and cascading
//!   cleanup on node deletion
//!
//! Reads pass through an in-memory [`ReadCache`]; every mutation
//! invalidates the entire cache before touching the KV backend. Multi-key
//! operations are split into chunks of at most
//! [`vertexdb_storage::MAX_BATCH`] keys by [`ChunkedKv`]. A
//! [`BackupManager`] serializes the full partition image to a blob store
//! and rehydrates it on restore.
//!
//! The [`GraphStore`] facade wires the pieces together and dispatches
//! tagged request envelopes to the right engine.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vertexdb_core::{Config, GraphStore};
//! use vertexdb_storage::{InMemoryBlobStore, InMemoryKv};
//!
//! let store = GraphStore::open(
//!     Config::new("tenant-a"),
//!     Arc::new(InMemoryKv::new()),
//!     Arc::new(InMemoryBlobStore::new()),
//! ).unwrap();
//!
//! let entity = serde_json::json!({"name": "ada", "age": 36});
//! store.entities().create("user-1", entity.as_object().unwrap().clone(), None).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod cache;
mod chunk;
mod config;
mod entity;
mod error;
mod index;
mod keys;
mod pagination;
mod relationship;
mod router;
mod store;

pub use backup::BackupManager;
pub use cache::{CacheStats, ReadCache};
pub use chunk::ChunkedKv;
pub use config::Config;
pub use entity::{
    BatchCreateRequest, BatchEntriesRequest, BatchReadRequest, BatchRemoveRequest,
    CreateQueryRequest, Entity, EntityEngine, ListQueryRequest, RangePredicate,
    ReadQueryRequest, RemoveQueryRequest, UpdateQueryRequest,
};
pub use error::{StoreError, StoreResult};
pub use index::{IndexDefinition, IndexEngine};
pub use relationship::{
    BatchListRequest, EdgeSpec, ListPage, ListRelationshipsRequest, NodeRequest,
    ReadRelationshipRequest, RelationshipEngine, RemoveEdgeSpec,
};
pub use router::{
    Command, CreateIndexRequest, Envelope, IndexCommand, IndexIdRequest, QueryCommand,
    RelationshipCommand, RestoreRequest, StoreCommand,
};
pub use store::GraphStore;
