//! PlotPalette SDK - Rust Client Library
//!
//! Provides a convenient client for interacting with the PlotPalette Engine daemon.
//!
//! # Example
//!
//! ```no_run
//! use plotpalette_sdk::{PlotPaletteClient, CreateJobRequest};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect to daemon
//!     let client = PlotPaletteClient::connect("http://127.0.0.1:9527").await?;
//!
//!     // Submit a job
//!     let job = client.create_job(CreateJobRequest {
//!         owner_id: "owner-1".to_string(),
//!         template_id: "tmpl-1".to_string(),
//!         template_version: 1,
//!         seed_locator: "/data/seed.jsonl".to_string(),
//!         target_record_count: 1000,
//!         budget_limit_dollars: 25.0,
//!         budget_tolerance_ppm: 0,
//!         output_format: Default::default(),
//!         payload: json!({}),
//!     }).await?;
//!
//!     println!("Job submitted: {}", job.job_id);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::PlotPaletteClient;
pub use error::{Result, SdkError};
pub use types::{
    CancelResponse, CreateJobRequest, ExportUrlResponse, JobIdRequest, JobResponse,
    ListJobsRequest, ListJobsResponse, OutputFormat,
};
