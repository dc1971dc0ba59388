// Blob Store Port — content layer of the dual-layer checkpoint protocol (§3, §4.3, §6)

use crate::domain::BlobTag;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("blob not found for key {0}")]
    NotFound(String),

    #[error("conditional write rejected for key {key}: expected tag {expected:?}, store has {actual}")]
    TagMismatch { key: String, expected: Option<BlobTag>, actual: BlobTag },

    #[error("blob store io error: {0}")]
    Io(String),
}

/// Content-addressed blob storage, used both for checkpoint snapshots (keyed
/// `checkpoint-blob/{job_id}`, written conditionally) and for batch/export
/// artifacts (keyed `export/{job_id}.{ext}` etc, written unconditionally by
/// passing `if_tag: None` against a key that is never contended).
///
/// `put` is the conditional primitive the checkpoint engine relies on for
/// I2: the write succeeds only if the store's current tag for `key` equals
/// `if_tag` (`None` meaning "no blob written yet"). On success the store
/// returns the new tag, derived from the blob's content so two writers who
/// raced to write identical bytes converge without a spurious conflict.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        if_tag: Option<&BlobTag>,
    ) -> Result<BlobTag, BlobStoreError>;

    async fn get(&self, key: &str) -> Result<(Vec<u8>, BlobTag), BlobStoreError>;

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError>;
}

pub fn checkpoint_key(job_id: &str) -> String {
    format!("checkpoint-blob/{job_id}")
}

pub fn batch_artifact_key(job_id: &str, batch_index: i64) -> String {
    format!("export-batch/{job_id}/{batch_index}")
}

pub fn export_key(job_id: &str, extension: &str) -> String {
    format!("export/{job_id}.{extension}")
}
