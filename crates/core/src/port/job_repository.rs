// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence.
///
/// The queue is not a separate aggregate: a job is "in the queue" exactly
/// when its status is `Queued` (§3). `pop_next` must perform an atomic
/// conditional claim (read a candidate, then `UPDATE ... WHERE status =
/// 'QUEUED'`), not a plain select-then-write, so two dispatchers racing on
/// the same row can never both win (I3).
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job in the `Queued` state.
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID.
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Persist an already-transitioned job (status, counters, timestamps).
    async fn update(&self, job: &Job) -> Result<()>;

    /// Atomically claim and return the oldest still-`Queued` job, marking it
    /// `Running` in the same operation. `None` if the queue is empty.
    async fn pop_next(&self) -> Result<Option<Job>>;

    /// Read the oldest still-`Queued` job without claiming it (§4.1: the
    /// `Queued -> Running` write must only land after the worker task has
    /// been submitted to the compute runtime, so the dispatcher peeks here
    /// first and claims separately via `try_start` once launch succeeds).
    async fn peek_next_queued(&self) -> Result<Option<Job>>;

    /// Atomically transition one specific job `Queued -> Running`,
    /// conditioned on it still being `Queued`. Returns `None` (not an
    /// error) if it raced away between the peek and this call — cancelled,
    /// or claimed by another dispatcher in the interim.
    async fn try_start(&self, job_id: &JobId, now_millis: i64) -> Result<Option<Job>>;

    /// Count jobs currently in the given status.
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Find all jobs in the given status (used by crash recovery to find
    /// orphaned `Running` jobs at startup, §5).
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    /// List jobs owned by `owner_id`, most recently created first, bounded
    /// by `limit`.
    async fn list_by_owner(&self, owner_id: &str, limit: i64) -> Result<Vec<Job>>;
}
