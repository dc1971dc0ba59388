// Crash recovery — requeues jobs orphaned by a daemon crash (§5).
//
// The dispatcher's heartbeat sweep handles staleness that develops while the
// daemon is up; this service handles the other half: jobs that were RUNNING
// when the process died, discovered once at startup before the dispatcher
// loop starts claiming work.

use crate::domain::{Job, JobStatus};
use crate::error::Result;
use crate::port::{JobRepository, MetadataStore, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    metadata_store: Arc<dyn MetadataStore>,
    time_provider: Arc<dyn TimeProvider>,
    heartbeat_timeout_ms: i64,
}

impl RecoveryService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        metadata_store: Arc<dyn MetadataStore>,
        time_provider: Arc<dyn TimeProvider>,
        heartbeat_timeout_ms: i64,
    ) -> Self {
        Self {
            job_repo,
            metadata_store,
            time_provider,
            heartbeat_timeout_ms,
        }
    }

    /// Find every RUNNING job and requeue it (§5: a crash leaves no worker
    /// alive to finish the job, but the checkpoint survives, so QUEUED lets
    /// the dispatcher relaunch and resume from the last commit rather than
    /// failing work that is otherwise recoverable).
    pub async fn recover_orphaned_jobs(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let running = self.job_repo.find_by_status(JobStatus::Running).await?;

        info!(count = running.len(), "found RUNNING jobs at startup, checking for orphans");

        let mut recovered = 0;
        for job in running {
            if self.is_orphaned(&job, now).await {
                self.requeue(job).await?;
                recovered += 1;
            }
        }

        info!(recovered, "orphaned job recovery complete");
        Ok(recovered)
    }

    /// A RUNNING job with no process alive to update its heartbeat looks
    /// identical, from storage alone, to one whose checkpoint is merely
    /// stale — so startup recovery uses the same signal as the dispatcher's
    /// own sweep rather than inventing a second staleness rule.
    async fn is_orphaned(&self, job: &Job, now: i64) -> bool {
        let last_update = self
            .metadata_store
            .get(&job.id)
            .await
            .ok()
            .flatten()
            .map(|m| m.updated_at)
            .unwrap_or(job.updated_at);

        now - last_update >= self.heartbeat_timeout_ms
    }

    async fn requeue(&self, mut job: Job) -> Result<()> {
        warn!(job_id = %job.id, "requeuing orphaned job after crash recovery");
        job.status = JobStatus::Queued;
        job.status_reason = None;
        job.status_detail = None;
        job.updated_at = self.time_provider.now_millis();
        self.job_repo.update(&job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckpointMetadata, ExportFormat, JobPayload, Micros, Tolerance};
    use crate::port::MetadataStoreError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedTime(i64);
    impl TimeProvider for FixedTime {
        fn now_millis(&self) -> i64 {
            self.0
        }
    }

    #[derive(Default)]
    struct InMemoryJobRepo {
        jobs: Mutex<HashMap<String, Job>>,
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepo {
        async fn insert(&self, job: &Job) -> Result<()> {
            self.jobs.lock().unwrap().insert(job.id.clone(), job.clone());
            Ok(())
        }
        async fn find_by_id(&self, id: &String) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }
        async fn update(&self, job: &Job) -> Result<()> {
            self.jobs.lock().unwrap().insert(job.id.clone(), job.clone());
            Ok(())
        }
        async fn pop_next(&self) -> Result<Option<Job>> {
            Ok(None)
        }
        async fn peek_next_queued(&self) -> Result<Option<Job>> {
            Ok(None)
        }
        async fn try_start(&self, _job_id: &String, _now_millis: i64) -> Result<Option<Job>> {
            Ok(None)
        }
        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            Ok(self.jobs.lock().unwrap().values().filter(|j| j.status == status).count() as i64)
        }
        async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .cloned()
                .collect())
        }
        async fn list_by_owner(&self, owner_id: &str, limit: i64) -> Result<Vec<Job>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.owner_id == owner_id)
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct StaleMetadataStore {
        updated_at: Mutex<HashMap<String, i64>>,
    }

    #[async_trait]
    impl MetadataStore for StaleMetadataStore {
        async fn get(&self, job_id: &str) -> std::result::Result<Option<CheckpointMetadata>, MetadataStoreError> {
            Ok(self.updated_at.lock().unwrap().get(job_id).map(|&updated_at| CheckpointMetadata {
                updated_at,
                ..CheckpointMetadata::initial(job_id)
            }))
        }
        async fn compare_and_swap(
            &self,
            _expected_version: i64,
            _new: &CheckpointMetadata,
        ) -> std::result::Result<(), MetadataStoreError> {
            Ok(())
        }
    }

    fn running_job(id: &str, created_at: i64) -> Job {
        let mut job = Job::new(
            id,
            "owner-1",
            created_at,
            "tmpl-1",
            1,
            "seed-1",
            100,
            Micros::from_dollars(10.0),
            Tolerance::STRICT,
            ExportFormat::JsonLines,
            JobPayload::new(serde_json::json!({})),
        );
        job.start(created_at).unwrap();
        job
    }

    #[tokio::test]
    async fn requeues_job_with_no_recent_heartbeat() {
        let repo = Arc::new(InMemoryJobRepo::default());
        let meta_store = Arc::new(StaleMetadataStore::default());
        meta_store.updated_at.lock().unwrap().insert("job-1".to_string(), 0);
        repo.insert(&running_job("job-1", 0)).await.unwrap();

        let recovery = RecoveryService::new(repo.clone(), meta_store, Arc::new(FixedTime(1_000_000)), 600_000);
        let recovered = recovery.recover_orphaned_jobs().await.unwrap();
        assert_eq!(recovered, 1);

        let job = repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn leaves_job_with_recent_heartbeat_running() {
        let repo = Arc::new(InMemoryJobRepo::default());
        let meta_store = Arc::new(StaleMetadataStore::default());
        meta_store.updated_at.lock().unwrap().insert("job-1".to_string(), 999_500);
        repo.insert(&running_job("job-1", 0)).await.unwrap();

        let recovery = RecoveryService::new(repo.clone(), meta_store, Arc::new(FixedTime(1_000_000)), 600_000);
        let recovered = recovery.recover_orphaned_jobs().await.unwrap();
        assert_eq!(recovered, 0);

        let job = repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
    }
}
