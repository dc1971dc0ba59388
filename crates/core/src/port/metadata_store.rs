// Metadata Store Port — conditional-version layer of the checkpoint protocol (§3, §4.3)

use crate::domain::CheckpointMetadata;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataStoreError {
    #[error("no checkpoint metadata for job {0}")]
    NotFound(String),

    #[error("version conflict: expected {expected}, store has {actual}")]
    VersionConflict { expected: i64, actual: i64 },

    #[error("metadata store io error: {0}")]
    Io(String),
}

/// Versioned metadata storage. `compare_and_swap` succeeds only if the
/// stored row's `version` equals `expected_version`; on success the stored
/// version becomes `new.version` (I2). This is the second of the two
/// conditional writes the checkpoint engine must both win to commit (§4.3).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, job_id: &str) -> Result<Option<CheckpointMetadata>, MetadataStoreError>;

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        new: &CheckpointMetadata,
    ) -> Result<(), MetadataStoreError>;
}
