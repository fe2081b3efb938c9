//! Store configuration.

use vertexdb_storage::MAX_BATCH;

/// Configuration for opening a [`crate::GraphStore`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier of the tenant partition this store serves.
    ///
    /// Used to namespace backup blob names; the KV backend itself is
    /// already partition-scoped.
    pub partition: String,

    /// Maximum keys per KV call issued by the chunked layer.
    ///
    /// Clamped to the backend cap of [`MAX_BATCH`].
    pub chunk_size: usize,

    /// Whether the read cache is consulted. Disabling it forces every
    /// read to the backend; useful when diagnosing coherence issues.
    pub cache_enabled: bool,
}

impl Config {
    /// Creates a configuration for the given partition with defaults.
    #[must_use]
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            chunk_size: MAX_BATCH,
            cache_enabled: true,
        }
    }

    /// Sets the chunk size, clamped to the backend cap.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, MAX_BATCH);
        self
    }

    /// Sets whether the read cache is consulted.
    #[must_use]
    pub const fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }
}
