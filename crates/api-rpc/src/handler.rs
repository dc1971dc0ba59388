//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::rate_limiter::RateLimiter;
use crate::types::{
    CancelResponse, CreateJobRequest, ExportUrlResponse, JobIdRequest, JobResponse,
    ListJobsRequest, ListJobsResponse, MaintenanceRequest, MaintenanceResponse, OutputFormat,
    StatsRequest, StatsResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use plotpalette_core::application::job_service::{CreateJobRequest as CoreCreateJobRequest, JobService};
use plotpalette_core::domain::{ExportFormat, Job, Micros, Tolerance};
use plotpalette_core::error::AppError;
use plotpalette_core::port::blob_store::export_key;
use plotpalette_core::port::{BlobStore, BlobStoreError, JobRepository, Maintenance};
use std::sync::Arc;

fn job_to_response(job: Job) -> JobResponse {
    JobResponse {
        job_id: job.id,
        owner_id: job.owner_id,
        status: job.status.to_string(),
        status_reason: job.status_reason.map(|r| r.to_string()),
        status_detail: job.status_detail,
        template_id: job.template_id,
        template_version: job.template_version,
        target_record_count: job.target_record_count,
        records_generated: job.records_generated,
        records_rejected: job.records_rejected,
        tokens_used: job.tokens_used,
        cost_accumulated_dollars: job.cost_accumulated.as_dollars(),
        budget_limit_dollars: job.budget_limit.as_dollars(),
        created_at: job.created_at,
        updated_at: job.updated_at,
    }
}

fn output_format(fmt: OutputFormat) -> ExportFormat {
    match fmt {
        OutputFormat::Jsonl => ExportFormat::JsonLines,
        OutputFormat::Csv => ExportFormat::Csv,
        OutputFormat::Columnar => ExportFormat::Columnar,
    }
}

fn throttled() -> ErrorObjectOwned {
    jsonrpsee::types::error::ErrorObject::owned(
        crate::error::code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    job_service: Arc<JobService>,
    job_repo: Arc<dyn JobRepository>,
    blob_store: Arc<dyn BlobStore>,
    maintenance: Arc<dyn Maintenance>,
    rate_limiter: Arc<RateLimiter>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(
        job_service: Arc<JobService>,
        job_repo: Arc<dyn JobRepository>,
        blob_store: Arc<dyn BlobStore>,
        maintenance: Arc<dyn Maintenance>,
    ) -> Self {
        // Default: 200 burst, 100 req/sec (configurable via env)
        let max_burst: u32 = std::env::var("PLOTPALETTE_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        let rate_per_sec: u32 = std::env::var("PLOTPALETTE_RATE_LIMIT_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Self {
            job_service,
            job_repo,
            blob_store,
            maintenance,
            rate_limiter: Arc::new(RateLimiter::new(max_burst, rate_per_sec)),
            start_time: std::time::Instant::now(),
        }
    }

    /// job.create.v1
    pub async fn create_job(
        &self,
        params: CreateJobRequest,
    ) -> Result<JobResponse, ErrorObjectOwned> {
        if !self.rate_limiter.check().await {
            return Err(throttled());
        }

        let tolerance = if params.budget_tolerance_ppm <= 0 {
            Tolerance::STRICT
        } else {
            Tolerance::new(params.budget_tolerance_ppm, 1_000_000)
        };

        let job = self
            .job_service
            .create(CoreCreateJobRequest {
                owner_id: params.owner_id,
                template_id: params.template_id,
                template_version: params.template_version,
                seed_locator: params.seed_locator,
                target_record_count: params.target_record_count,
                budget_limit: Micros::from_dollars(params.budget_limit_dollars),
                budget_tolerance: tolerance,
                output_format: output_format(params.output_format),
                payload: params.payload,
            })
            .await
            .map_err(to_rpc_error)?;

        Ok(job_to_response(job))
    }

    /// job.get.v1
    pub async fn get_job(&self, params: JobIdRequest) -> Result<JobResponse, ErrorObjectOwned> {
        let job = self
            .job_service
            .get(&params.job_id)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("job {}", params.job_id))))?;

        Ok(job_to_response(job))
    }

    /// job.list.v1
    pub async fn list_jobs(
        &self,
        params: ListJobsRequest,
    ) -> Result<ListJobsResponse, ErrorObjectOwned> {
        let jobs = self
            .job_service
            .list(&params.owner_id, params.limit)
            .await
            .map_err(to_rpc_error)?;

        Ok(ListJobsResponse {
            jobs: jobs.into_iter().map(job_to_response).collect(),
        })
    }

    /// job.cancel.v1
    pub async fn cancel_job(&self, params: JobIdRequest) -> Result<CancelResponse, ErrorObjectOwned> {
        if !self.rate_limiter.check().await {
            return Err(throttled());
        }

        self.job_service
            .cancel(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(CancelResponse {
            job_id: params.job_id,
            cancelled: true,
        })
    }

    /// job.export_url.v1 — resolves the deterministic export blob key for a
    /// completed job. Returns `blob_key: None` if nothing has been written yet.
    pub async fn export_url(
        &self,
        params: JobIdRequest,
    ) -> Result<ExportUrlResponse, ErrorObjectOwned> {
        let job = self
            .job_repo
            .find_by_id(&params.job_id)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("job {}", params.job_id))))?;

        let key = export_key(&job.id, job.output_format.extension());
        let blob_key = match self.blob_store.get(&key).await {
            Ok(_) => Some(key),
            Err(BlobStoreError::NotFound(_)) => None,
            Err(e) => return Err(to_rpc_error(AppError::Blob(e))),
        };

        Ok(ExportUrlResponse {
            job_id: params.job_id,
            blob_key,
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        use plotpalette_core::domain::JobStatus;

        let queued = self
            .job_repo
            .count_by_status(JobStatus::Queued)
            .await
            .map_err(to_rpc_error)?;
        let running = self
            .job_repo
            .count_by_status(JobStatus::Running)
            .await
            .map_err(to_rpc_error)?;
        let completed = self
            .job_repo
            .count_by_status(JobStatus::Completed)
            .await
            .map_err(to_rpc_error)?;
        let failed = self
            .job_repo
            .count_by_status(JobStatus::Failed)
            .await
            .map_err(to_rpc_error)?;

        let stats = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            total_jobs: stats.job_count,
            queued_jobs: queued,
            running_jobs: running,
            completed_jobs: completed,
            failed_jobs: failed,
            db_size_bytes: stats.db_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }

    /// admin.maintenance.v1
    pub async fn maintenance(
        &self,
        params: MaintenanceRequest,
    ) -> Result<MaintenanceResponse, ErrorObjectOwned> {
        let stats_before = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        let vacuum_run = if params.force_vacuum || stats_before.fragmentation_percent > 10.0 {
            self.maintenance.vacuum().await.map_err(to_rpc_error)?;
            true
        } else {
            false
        };

        let jobs_deleted = self
            .maintenance
            .gc_finished_jobs(params.retention_days)
            .await
            .map_err(to_rpc_error)?;

        let checkpoint_blobs_deleted = self
            .maintenance
            .gc_checkpoint_blobs(params.retention_days)
            .await
            .map_err(to_rpc_error)?;

        let cost_events_deleted = self
            .maintenance
            .gc_expired_cost_events()
            .await
            .map_err(to_rpc_error)?;

        let stats_after = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        Ok(MaintenanceResponse {
            vacuum_run,
            jobs_deleted,
            checkpoint_blobs_deleted: checkpoint_blobs_deleted as i64,
            cost_events_deleted,
            db_size_before_bytes: stats_before.db_size_bytes,
            db_size_after_bytes: stats_after.db_size_bytes,
        })
    }
}
