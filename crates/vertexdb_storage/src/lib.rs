//! # VertexDB Storage
//!
//! KV backend and blob store abstractions for VertexDB.
//!
//! This crate provides the lowest-level storage abstraction for VertexDB.
//! A backend is an **ordered key-value store** over JSON values with
//! single-partition transactions, prefix listing, and a hard cap of
//! [`MAX_BATCH`] keys per batched get/put/delete. VertexDB owns all key
//! encoding and value interpretation - backends do not understand entities,
//! indexes, or relationships.
//!
//! ## Design Principles
//!
//! - Backends store opaque `serde_json::Value` rows under string keys
//! - Listing is ordered by key; `reverse` flips the direction
//! - Batched operations reject more than [`MAX_BATCH`] keys; callers that
//!   need more split the work into chunks
//! - Must be `Send + Sync` for shared access
//!
//! ## Available Backends
//!
//! - [`InMemoryKv`] - For testing and ephemeral partitions
//!
//! ## Example
//!
//! ```rust
//! use vertexdb_storage::{InMemoryKv, KvBackend, ReadOptions};
//!
//! let kv = InMemoryKv::new();
//! kv.put("user:1", serde_json::json!({"name": "ada"})).unwrap();
//! let row = kv.get("user:1", &ReadOptions::default()).unwrap();
//! assert!(row.is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod blob;
mod error;
mod memory;

pub use backend::{KvBackend, KvTransaction, ListOptions, ReadOptions, MAX_BATCH};
pub use blob::{BlobStore, InMemoryBlobStore};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryKv;
