// Checkpoint Engine — dual-layer optimistic-concurrency persistence (§4.3)

use crate::domain::{CheckpointBlob, CheckpointMetadata};
use crate::error::{AppError, Result};
use crate::port::blob_store::checkpoint_key;
use crate::port::{BlobStore, MetadataStore};
use std::sync::Arc;
use tracing::{info, warn};

const MAX_CONFLICT_RETRIES: u32 = 3;

/// Result of a successful checkpoint write: the metadata row now agreed by
/// both stores.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub metadata: CheckpointMetadata,
    pub blob: CheckpointBlob,
}

pub struct CheckpointEngine {
    blob_store: Arc<dyn BlobStore>,
    metadata_store: Arc<dyn MetadataStore>,
    time_provider: Arc<dyn crate::port::TimeProvider>,
}

impl CheckpointEngine {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        metadata_store: Arc<dyn MetadataStore>,
        time_provider: Arc<dyn crate::port::TimeProvider>,
    ) -> Self {
        Self { blob_store, metadata_store, time_provider }
    }

    /// Read procedure (§4.3): fetch metadata, fetch the blob it names,
    /// verify I7 agreement, and reconcile on mismatch by keeping the
    /// higher-progress side.
    pub async fn resume(&self, job_id: &str) -> Result<Option<CommitOutcome>> {
        let meta = match self.metadata_store.get(job_id).await? {
            Some(m) => m,
            None => return Ok(None),
        };

        if meta.version == 0 {
            return Ok(None);
        }

        let (bytes, _tag) = self.blob_store.get(&checkpoint_key(job_id)).await?;
        let blob: CheckpointBlob = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::CorruptCheckpoint(job_id.to_string(), e.to_string()))?;

        if blob.counters_match(&meta) {
            return Ok(Some(CommitOutcome { metadata: meta, blob }));
        }

        warn!(job_id, "checkpoint blob/metadata disagreement on resume, reconciling by higher progress");
        let reconciled = if blob.records_generated >= meta.records_generated {
            blob
        } else {
            CheckpointBlob {
                records_generated: meta.records_generated,
                records_rejected: meta.records_rejected,
                tokens_used: meta.tokens_used,
                cost_accumulated: meta.cost_accumulated,
                cost_event_seq: blob.cost_event_seq,
                ..CheckpointBlob::initial(0)
            }
        };

        Ok(Some(CommitOutcome { metadata: meta, blob: reconciled }))
    }

    /// Write procedure (§4.3): attempt the conditional blob write then the
    /// conditional metadata swap; on either losing, merge and retry up to
    /// `MAX_CONFLICT_RETRIES` times before surfacing `checkpoint-contention`.
    pub async fn commit(
        &self,
        job_id: &str,
        prev: &CheckpointMetadata,
        mut state: CheckpointBlob,
    ) -> Result<CommitOutcome> {
        let mut prev = prev.clone();
        let key = checkpoint_key(job_id);

        for attempt in 0..=MAX_CONFLICT_RETRIES {
            let bytes = serde_json::to_vec(&state)
                .map_err(|e| AppError::CorruptCheckpoint(job_id.to_string(), e.to_string()))?;

            let expected_tag = if prev.version == 0 { None } else { Some(prev.tag.clone()) };

            let new_tag = match self.blob_store.put(&key, &bytes, expected_tag.as_ref()).await {
                Ok(tag) => tag,
                Err(_) => {
                    let (merged_meta, merged_blob) = self.reconcile_conflict(job_id, &state).await?;
                    prev = merged_meta;
                    state = merged_blob;
                    continue;
                }
            };

            let now = self.time_provider.now_millis();
            let candidate = CheckpointMetadata {
                job_id: job_id.to_string(),
                version: prev.version + 1,
                tag: new_tag,
                records_generated: state.records_generated,
                records_rejected: state.records_rejected,
                tokens_used: state.tokens_used,
                cost_accumulated: state.cost_accumulated,
                updated_at: now,
            };

            match self.metadata_store.compare_and_swap(prev.version, &candidate).await {
                Ok(()) => {
                    return Ok(CommitOutcome { metadata: candidate, blob: state });
                }
                Err(_) => {
                    let (merged_meta, merged_blob) = self.reconcile_conflict(job_id, &state).await?;
                    prev = merged_meta;
                    state = merged_blob;
                    if attempt == MAX_CONFLICT_RETRIES {
                        break;
                    }
                }
            }
        }

        Err(AppError::CheckpointContention(job_id.to_string()))
    }

    /// Conflict branch (§4.3 step 3): re-read current metadata+blob and
    /// max-merge counters so no retry ever loses progress (I1, P1).
    async fn reconcile_conflict(
        &self,
        job_id: &str,
        attempted_state: &CheckpointBlob,
    ) -> Result<(CheckpointMetadata, CheckpointBlob)> {
        let current_meta = match self.metadata_store.get(job_id).await? {
            Some(m) => m,
            None => CheckpointMetadata::initial(job_id),
        };

        let current_blob = if current_meta.version == 0 {
            CheckpointBlob::initial(attempted_state.rng_seed)
        } else {
            let (bytes, _tag) = self.blob_store.get(&checkpoint_key(job_id)).await?;
            serde_json::from_slice(&bytes)
                .map_err(|e| AppError::CorruptCheckpoint(job_id.to_string(), e.to_string()))?
        };

        let merged = current_blob.merge(attempted_state);

        info!(
            job_id,
            current_version = current_meta.version,
            merged_records_generated = merged.records_generated,
            "checkpoint write conflict, merged and retrying"
        );

        Ok((current_meta, merged))
    }
}
