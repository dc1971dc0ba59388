//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use serde::{Deserialize, Serialize};

/// job.create.v1 - Submit a new generation job
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub owner_id: String,
    pub template_id: String,
    pub template_version: i64,
    pub seed_locator: String,
    pub target_record_count: i64,
    pub budget_limit_dollars: f64,
    #[serde(default = "default_tolerance_ppm")]
    pub budget_tolerance_ppm: i64,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_payload")]
    pub payload: serde_json::Value,
}

fn default_tolerance_ppm() -> i64 {
    0
}

fn default_payload() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Csv,
    Columnar,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub job_id: String,
    pub owner_id: String,
    pub status: String,
    pub status_reason: Option<String>,
    pub status_detail: Option<String>,
    pub template_id: String,
    pub template_version: i64,
    pub target_record_count: i64,
    pub records_generated: i64,
    pub records_rejected: i64,
    pub tokens_used: i64,
    pub cost_accumulated_dollars: f64,
    pub budget_limit_dollars: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// job.get.v1 / job.cancel.v1 / job.export_url.v1 - operate on one job
#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

/// job.list.v1 - list jobs owned by a caller
#[derive(Debug, Deserialize)]
pub struct ListJobsRequest {
    pub owner_id: String,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
}

/// job.export_url.v1 - resolve the blob key holding a completed job's export
#[derive(Debug, Clone, Serialize)]
pub struct ExportUrlResponse {
    pub job_id: String,
    pub blob_key: Option<String>,
}

/// admin.stats.v1 - get system statistics
#[derive(Debug, Deserialize)]
pub struct StatsRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub queued_jobs: i64,
    pub running_jobs: i64,
    pub completed_jobs: i64,
    pub failed_jobs: i64,
    pub db_size_bytes: i64,
    pub uptime_seconds: i64,
}

/// admin.maintenance.v1 - run manual maintenance
#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    #[serde(default)]
    pub force_vacuum: bool,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_retention_days() -> i64 {
    30
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceResponse {
    pub vacuum_run: bool,
    pub jobs_deleted: i64,
    pub checkpoint_blobs_deleted: i64,
    pub cost_events_deleted: i64,
    pub db_size_before_bytes: i64,
    pub db_size_after_bytes: i64,
}
