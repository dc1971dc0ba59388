// Checkpoint Domain Model — dual-layer optimistic-concurrency snapshot (§3, §4.3)

use super::money::Micros;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque content tag returned by the blob store on a successful conditional write.
pub type BlobTag = String;

/// Checkpoint metadata row: the concurrency token for a job's progress.
///
/// `version` is the metadata store's conditional-update key (I2): a
/// successful write at version `v` requires the prior stored value to be
/// `v - 1`. `tag` names the blob that metadata currently agrees is current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub job_id: String,
    pub version: i64,
    pub tag: BlobTag,
    pub records_generated: i64,
    pub records_rejected: i64,
    pub tokens_used: i64,
    pub cost_accumulated: Micros,
    pub updated_at: i64,
}

impl CheckpointMetadata {
    pub fn initial(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            version: 0,
            tag: String::new(),
            records_generated: 0,
            records_rejected: 0,
            tokens_used: 0,
            cost_accumulated: Micros::ZERO,
            updated_at: 0,
        }
    }
}

/// Checkpoint blob: the opaque worker-state snapshot (§3).
///
/// Carries an embedded copy of the counters that also live in metadata —
/// deliberate redundancy used by the I7 reconciliation check on resume, not
/// a cyclic structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointBlob {
    pub records_generated: i64,
    pub records_rejected: i64,
    pub tokens_used: i64,
    pub cost_accumulated: Micros,
    pub rng_seed: u64,
    pub last_completed_batch_index: i64,
    /// Attempt indices (`records_generated + records_rejected` at the time
    /// each record was processed) already resolved to a terminal outcome,
    /// so a resume never redoes an attempt. Seed-data rows are sampled and
    /// may legitimately repeat across attempts — this set tracks attempts,
    /// not seed-row identity (§4.2 failure semantics, §4.3 merge, §8 P5).
    pub completed_record_indices: BTreeSet<i64>,
    /// Buffered records accumulated since the last checkpoint commit, kept
    /// so an in-progress batch survives a worker restart that lands exactly
    /// at a checkpoint boundary.
    pub partial_batch_records: Vec<serde_json::Value>,
    /// Monotonic per-job counter for cost-event sequence numbers: one tick
    /// per appended event, not per record, so a multi-step template's events
    /// for a single record never collide on the event log's `(job_id, seq)`
    /// key (§3, §4.4).
    #[serde(default)]
    pub cost_event_seq: i64,
    pub completed: bool,
}

impl CheckpointBlob {
    pub fn initial(rng_seed: u64) -> Self {
        Self {
            records_generated: 0,
            records_rejected: 0,
            tokens_used: 0,
            cost_accumulated: Micros::ZERO,
            rng_seed,
            last_completed_batch_index: -1,
            completed_record_indices: BTreeSet::new(),
            partial_batch_records: Vec::new(),
            cost_event_seq: 0,
            completed: false,
        }
    }

    /// I7 check: do this blob's embedded counters equal the metadata's?
    pub fn counters_match(&self, meta: &CheckpointMetadata) -> bool {
        self.records_generated == meta.records_generated
            && self.records_rejected == meta.records_rejected
            && self.tokens_used == meta.tokens_used
            && self.cost_accumulated == meta.cost_accumulated
    }

    /// Element-wise-max merge used by the checkpoint engine's conflict
    /// branch (§4.3 step 3): the winner's state must reflect at least the
    /// loser's counters, and the completed-record index sets union.
    pub fn merge(&self, other: &CheckpointBlob) -> CheckpointBlob {
        let mut indices = self.completed_record_indices.clone();
        indices.extend(other.completed_record_indices.iter().copied());

        let (newer, older) = if self.last_completed_batch_index >= other.last_completed_batch_index
        {
            (self, other)
        } else {
            (other, self)
        };

        CheckpointBlob {
            records_generated: self.records_generated.max(other.records_generated),
            records_rejected: self.records_rejected.max(other.records_rejected),
            tokens_used: self.tokens_used.max(other.tokens_used),
            cost_accumulated: self.cost_accumulated.max(other.cost_accumulated),
            rng_seed: newer.rng_seed,
            last_completed_batch_index: newer
                .last_completed_batch_index
                .max(older.last_completed_batch_index),
            completed_record_indices: indices,
            partial_batch_records: newer.partial_batch_records.clone(),
            cost_event_seq: self.cost_event_seq.max(other.cost_event_seq),
            completed: self.completed || other.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_takes_elementwise_max_and_unions_indices() {
        let mut a = CheckpointBlob::initial(42);
        a.records_generated = 50;
        a.completed_record_indices.insert(1);
        a.completed_record_indices.insert(2);

        let mut b = CheckpointBlob::initial(42);
        b.records_generated = 40;
        b.records_rejected = 3;
        b.completed_record_indices.insert(2);
        b.completed_record_indices.insert(3);

        let merged = a.merge(&b);
        assert_eq!(merged.records_generated, 50);
        assert_eq!(merged.records_rejected, 3);
        assert_eq!(merged.completed_record_indices.len(), 3);
    }

    #[test]
    fn counters_match_detects_mismatch() {
        let blob = CheckpointBlob::initial(1);
        let mut meta = CheckpointMetadata::initial("job-1");
        meta.records_generated = 1;
        assert!(!blob.counters_match(&meta));

        meta.records_generated = 0;
        assert!(blob.counters_match(&meta));
    }
}
