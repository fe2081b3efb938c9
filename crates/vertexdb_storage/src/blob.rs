//! Blob store abstraction for backup payloads.

use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A named blob store.
///
/// Backup payloads are written here as opaque byte blobs. The store does
/// not interpret blob contents or names beyond exact-match lookup.
pub trait BlobStore: Send + Sync {
    /// Writes a blob, replacing any existing blob of the same name.
    fn put(&self, name: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Reads a blob by name. Returns `None` if absent.
    fn get(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Returns all blob names in ascending order.
    fn names(&self) -> StorageResult<Vec<String>>;
}

/// An in-memory blob store for testing.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Creates a new empty blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns whether the store holds no blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, name: &str, data: Vec<u8>) -> StorageResult<()> {
        self.blobs.write().insert(name.to_owned(), data);
        Ok(())
    }

    fn get(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(name).cloned())
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        Ok(self.blobs.read().keys().cloned().collect())
    }
}
