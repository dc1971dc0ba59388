//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from the api-rpc crate.

use serde::{Deserialize, Serialize};

/// Request to submit a new generation job
#[derive(Debug, Clone, Serialize)]
pub struct CreateJobRequest {
    pub owner_id: String,
    pub template_id: String,
    pub template_version: i64,
    pub seed_locator: String,
    pub target_record_count: i64,
    pub budget_limit_dollars: f64,
    #[serde(default)]
    pub budget_tolerance_ppm: i64,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_payload")]
    pub payload: serde_json::Value,
}

fn default_payload() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Csv,
    Columnar,
}

/// A job's current state and progress
#[derive(Debug, Clone, Deserialize)]
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

#[derive(Debug, Clone, Serialize)]
pub struct JobIdRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListJobsRequest {
    pub owner_id: String,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportUrlResponse {
    pub job_id: String,
    pub blob_key: Option<String>,
}
