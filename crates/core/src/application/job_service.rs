// Job Service — create/inspect/list/cancel use cases (§3, §6 job-submission surface)
//
// Owns the QUEUED insertion; every transition out of QUEUED belongs to the
// Dispatcher (§3 ownership split), so `cancel` here is a thin delegation.

use crate::application::dispatcher::Dispatcher;
use crate::domain::{ExportFormat, Job, JobId, JobPayload, Micros, Tolerance};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider};
use std::sync::Arc;

/// Caller-supplied fields for a new job. Everything else (`id`, `status`,
/// counters, timestamps) is derived by the service.
pub struct CreateJobRequest {
    pub owner_id: String,
    pub template_id: String,
    pub template_version: i64,
    pub seed_locator: String,
    pub target_record_count: i64,
    pub budget_limit: Micros,
    pub budget_tolerance: Tolerance,
    pub output_format: ExportFormat,
    pub payload: serde_json::Value,
}

pub struct JobService {
    job_repo: Arc<dyn JobRepository>,
    dispatcher: Arc<Dispatcher>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        dispatcher: Arc<Dispatcher>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_repo,
            dispatcher,
            id_provider,
            time_provider,
        }
    }

    /// Validate and insert a new QUEUED job.
    pub async fn create(&self, req: CreateJobRequest) -> Result<Job> {
        if req.target_record_count < 0 {
            return Err(AppError::Validation(
                "target_record_count must be >= 0".to_string(),
            ));
        }
        if req.budget_limit <= Micros::ZERO {
            return Err(AppError::Validation(
                "budget_limit must be positive".to_string(),
            ));
        }
        if req.seed_locator.trim().is_empty() {
            return Err(AppError::Validation("seed_locator is required".to_string()));
        }

        let id = self.id_provider.generate_id();
        let now = self.time_provider.now_millis();

        let job = Job::new(
            id,
            req.owner_id,
            now,
            req.template_id,
            req.template_version,
            req.seed_locator,
            req.target_record_count,
            req.budget_limit,
            req.budget_tolerance,
            req.output_format,
            JobPayload::new(req.payload),
        );

        self.job_repo.insert(&job).await?;
        Ok(job)
    }

    pub async fn get(&self, job_id: &JobId) -> Result<Option<Job>> {
        self.job_repo.find_by_id(job_id).await
    }

    pub async fn list(&self, owner_id: &str, limit: i64) -> Result<Vec<Job>> {
        self.job_repo.list_by_owner(owner_id, limit).await
    }

    /// Cancel a job regardless of its current non-terminal status (§4.1
    /// `job-not-found`, `illegal-transition` failures surface from here).
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        self.dispatcher.cancel(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckpointMetadata, JobStatus, RateTable};
    use crate::port::{
        BlobStoreError, ComputeError, ComputeRuntime, MetadataStore, MetadataStoreError, ModelClient,
        ModelError, ModelResponse, SeedDataError, SeedDataSource, TemplateStore,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedId(&'static str);
    impl IdProvider for FixedId {
        fn generate_id(&self) -> String {
            self.0.to_string()
        }
    }

    struct FixedTime(i64);
    impl TimeProvider for FixedTime {
        fn now_millis(&self) -> i64 {
            self.0
        }
    }

    #[derive(Default)]
    struct InMemoryJobRepo {
        jobs: Mutex<std::collections::HashMap<JobId, Job>>,
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepo {
        async fn insert(&self, job: &Job) -> Result<()> {
            self.jobs.lock().unwrap().insert(job.id.clone(), job.clone());
            Ok(())
        }
        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
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
        async fn try_start(&self, _job_id: &JobId, _now_millis: i64) -> Result<Option<Job>> {
            Ok(None)
        }
        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .count() as i64)
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
            let mut jobs: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.owner_id == owner_id)
                .cloned()
                .collect();
            jobs.sort_by_key(|j| std::cmp::Reverse(j.created_at));
            jobs.truncate(limit as usize);
            Ok(jobs)
        }
    }

    struct NoopMetadataStore;
    #[async_trait]
    impl MetadataStore for NoopMetadataStore {
        async fn get(&self, _job_id: &str) -> std::result::Result<Option<CheckpointMetadata>, MetadataStoreError> {
            Ok(None)
        }
        async fn compare_and_swap(
            &self,
            _expected_version: i64,
            _new: &CheckpointMetadata,
        ) -> std::result::Result<(), MetadataStoreError> {
            Ok(())
        }
    }

    struct NoopComputeRuntime;
    #[async_trait]
    impl ComputeRuntime for NoopComputeRuntime {
        async fn spawn(
            &self,
            _task: crate::port::compute_runtime::BoxedUnitFuture,
        ) -> std::result::Result<(), ComputeError> {
            Ok(())
        }
    }

    struct EmptyBlobStore;
    #[async_trait]
    impl crate::port::BlobStore for EmptyBlobStore {
        async fn put(
            &self,
            _key: &str,
            _bytes: &[u8],
            _if_tag: Option<&crate::domain::BlobTag>,
        ) -> std::result::Result<crate::domain::BlobTag, BlobStoreError> {
            Ok("tag-1".to_string())
        }
        async fn get(&self, key: &str) -> std::result::Result<(Vec<u8>, crate::domain::BlobTag), BlobStoreError> {
            Err(BlobStoreError::NotFound(key.to_string()))
        }
        async fn delete(&self, _key: &str) -> std::result::Result<(), BlobStoreError> {
            Ok(())
        }
    }

    struct NoopCostEventStore;
    #[async_trait]
    impl crate::port::CostEventStore for NoopCostEventStore {
        async fn append(&self, _event: &crate::domain::CostEvent) -> Result<()> {
            Ok(())
        }
        async fn list_for_job(&self, _job_id: &str) -> Result<Vec<crate::domain::CostEvent>> {
            Ok(Vec::new())
        }
        async fn gc_expired(&self, _now: i64) -> Result<i64> {
            Ok(0)
        }
    }

    struct NoopModelClient;
    #[async_trait]
    impl ModelClient for NoopModelClient {
        async fn generate(
            &self,
            _tier: &str,
            _prompt: &str,
            _required_schema_fields: &[String],
        ) -> std::result::Result<ModelResponse, ModelError> {
            Err(ModelError::Unrecoverable("unused in these tests".to_string()))
        }
    }

    struct NoopTemplateStore;
    #[async_trait]
    impl TemplateStore for NoopTemplateStore {
        async fn get(&self, _template_id: &str, _version: i64) -> Result<Option<crate::domain::Template>> {
            Ok(None)
        }
    }

    struct NoopSeedDataSource;
    #[async_trait]
    impl SeedDataSource for NoopSeedDataSource {
        async fn len(&self, _seed_locator: &str) -> std::result::Result<i64, SeedDataError> {
            Ok(0)
        }
        async fn read_at(
            &self,
            _seed_locator: &str,
            _index: i64,
        ) -> std::result::Result<serde_json::Value, SeedDataError> {
            Err(SeedDataError::OutOfRange(0))
        }
    }

    fn test_service() -> (Arc<InMemoryJobRepo>, JobService) {
        let repo = Arc::new(InMemoryJobRepo::default());
        let checkpoint_engine = Arc::new(crate::application::checkpoint::CheckpointEngine::new(
            Arc::new(EmptyBlobStore),
            Arc::new(NoopMetadataStore),
            Arc::new(FixedTime(0)),
        ));
        let cost_tracker = Arc::new(crate::application::cost::CostTracker::new(
            Arc::new(NoopCostEventStore),
            Arc::new(FixedTime(0)),
        ));
        let budget_guard = Arc::new(crate::application::cost::BudgetGuard::new(
            RateTable::default(),
            Tolerance::STRICT,
        ));
        let worker = Arc::new(crate::application::worker::GenerationWorker::new(
            checkpoint_engine,
            cost_tracker,
            budget_guard,
            Arc::new(NoopModelClient),
            Arc::new(NoopTemplateStore),
            Arc::new(NoopSeedDataSource),
            Arc::new(crate::application::export::ExportAssembler::new(Arc::new(EmptyBlobStore))),
            Arc::new(FixedTime(0)),
            crate::application::worker::WorkerConfig::default(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            repo.clone(),
            Arc::new(NoopMetadataStore),
            Arc::new(NoopComputeRuntime),
            worker,
            Arc::new(FixedTime(0)),
            crate::application::dispatcher::DispatcherConfig::default(),
        ));
        let svc = JobService::new(
            repo.clone(),
            dispatcher,
            Arc::new(FixedId("job-1")),
            Arc::new(FixedTime(1000)),
        );
        (repo, svc)
    }

    fn valid_request() -> CreateJobRequest {
        CreateJobRequest {
            owner_id: "owner-1".to_string(),
            template_id: "tmpl-1".to_string(),
            template_version: 1,
            seed_locator: "seed-1".to_string(),
            target_record_count: 10,
            budget_limit: Micros::from_dollars(5.0),
            budget_tolerance: Tolerance::STRICT,
            output_format: ExportFormat::JsonLines,
            payload: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn create_inserts_queued_job() {
        let (_repo, svc) = test_service();
        let job = svc.create(valid_request()).await.unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(job.status, JobStatus::Queued);

        let fetched = svc.get(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(fetched.owner_id, "owner-1");
    }

    #[tokio::test]
    async fn create_rejects_negative_target() {
        let (_repo, svc) = test_service();
        let mut req = valid_request();
        req.target_record_count = -1;
        assert!(svc.create(req).await.is_err());
    }

    #[tokio::test]
    async fn create_rejects_nonpositive_budget() {
        let (_repo, svc) = test_service();
        let mut req = valid_request();
        req.budget_limit = Micros::ZERO;
        assert!(svc.create(req).await.is_err());
    }

    #[tokio::test]
    async fn cancel_queued_job_transitions_immediately() {
        let (_repo, svc) = test_service();
        svc.create(valid_request()).await.unwrap();
        svc.cancel("job-1").await.unwrap();
        let job = svc.get(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }
}
