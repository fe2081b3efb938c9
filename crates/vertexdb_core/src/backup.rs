//! Partition backup and restore.
//!
//! A backup serializes the full KV image - every row in the partition -
//! to a single JSON object blob. Restore takes a safety backup tagged
//! `before-restore`, purges the namespace, and re-inserts the parsed
//! mapping through the chunked layer.
//!
//! Blob names: `<partition>/graph-store-<epochMillis>[-<reason>].json`.

use crate::chunk::ChunkedKv;
use crate::error::{StoreError, StoreResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use vertexdb_storage::{BlobStore, KvBackend, ListOptions};

/// Tag appended to the safety backup taken before a restore.
const BEFORE_RESTORE_TAG: &str = "before-restore";

/// Serializes and rehydrates the full partition image.
pub struct BackupManager {
    partition: String,
    kv: Arc<dyn KvBackend>,
    chunked: ChunkedKv,
    blobs: Arc<dyn BlobStore>,
}

impl BackupManager {
    /// Creates the manager for the given partition.
    #[must_use]
    pub fn new(
        partition: impl Into<String>,
        kv: Arc<dyn KvBackend>,
        chunked: ChunkedKv,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            partition: partition.into(),
            kv,
            chunked,
            blobs,
        }
    }

    /// Builds the blob name for a backup taken now.
    fn blob_name(&self, reason: Option<&str>) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        match reason {
            Some(reason) => format!("{}/graph-store-{millis}-{reason}.json", self.partition),
            None => format!("{}/graph-store-{millis}.json", self.partition),
        }
    }

    /// Writes the full KV image to a new blob and returns its name.
    pub fn backup(&self, reason: Option<&str>) -> StoreResult<String> {
        let rows = self.kv.list(&ListOptions {
            allow_concurrency: true,
            ..ListOptions::default()
        })?;
        let count = rows.len();
        let image: serde_json::Map<String, Value> = rows.into_iter().collect();

        let name = self.blob_name(reason);
        self.blobs
            .put(&name, serde_json::to_vec(&Value::Object(image))?)?;
        tracing::info!(%name, count, "backup written");
        Ok(name)
    }

    /// Rehydrates the partition from the named backup.
    ///
    /// Takes a safety backup first, then purges the namespace and
    /// re-inserts the parsed mapping. Returns the number of rows
    /// restored. Missing blob → `NotFound`.
    pub fn restore(&self, backup_id: &str) -> StoreResult<usize> {
        let data = self
            .blobs
            .get(backup_id)?
            .ok_or_else(|| StoreError::not_found(format!("backup {backup_id}")))?;
        let image: serde_json::Map<String, Value> = match serde_json::from_slice(&data)? {
            Value::Object(image) => image,
            _ => {
                return Err(StoreError::unexpected(format!(
                    "backup {backup_id} is not a JSON object"
                )))
            }
        };

        self.backup(Some(BEFORE_RESTORE_TAG))?;

        self.chunked.invalidate_cache();
        let existing = self.kv.list(&ListOptions {
            allow_concurrency: true,
            ..ListOptions::default()
        })?;
        let keys: Vec<String> = existing.into_iter().map(|(key, _)| key).collect();
        self.chunked.delete_many(&keys)?;

        let entries: Vec<(String, Value)> = image.into_iter().collect();
        let count = entries.len();
        self.chunked.put_many(entries)?;
        tracing::info!(backup_id, count, "restore complete");
        Ok(count)
    }
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager")
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}
