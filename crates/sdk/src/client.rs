//! Plot Palette Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    CancelResponse, CreateJobRequest, ExportUrlResponse, JobIdRequest, JobResponse,
    ListJobsRequest, ListJobsResponse,
};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use std::time::Duration;

/// Plot Palette Engine Client
///
/// Provides a high-level interface to interact with the Plot Palette daemon.
///
/// # Example
///
/// ```no_run
/// use plotpalette_sdk::PlotPaletteClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PlotPaletteClient::connect("http://127.0.0.1:9527").await?;
/// # Ok(())
/// # }
/// ```
pub struct PlotPaletteClient {
    client: HttpClient,
}

impl PlotPaletteClient {
    /// Connect to the Plot Palette daemon
    ///
    /// # Arguments
    ///
    /// * `url` - RPC endpoint URL (e.g., `http://127.0.0.1:9527`)
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use plotpalette_sdk::PlotPaletteClient;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = PlotPaletteClient::connect("http://127.0.0.1:9527").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();

        let client = HttpClientBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .build(url)
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client })
    }

    /// Submit a new generation job
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use plotpalette_sdk::{PlotPaletteClient, CreateJobRequest};
    /// # use serde_json::json;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = PlotPaletteClient::connect("http://127.0.0.1:9527").await?;
    /// let job = client.create_job(CreateJobRequest {
    ///     owner_id: "owner-1".to_string(),
    ///     template_id: "tmpl-1".to_string(),
    ///     template_version: 1,
    ///     seed_locator: "/data/seed.jsonl".to_string(),
    ///     target_record_count: 1000,
    ///     budget_limit_dollars: 25.0,
    ///     budget_tolerance_ppm: 0,
    ///     output_format: Default::default(),
    ///     payload: json!({}),
    /// }).await?;
    ///
    /// println!("Job ID: {}", job.job_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<JobResponse> {
        let params = rpc_params![request];
        let response: JobResponse = self.client.request("job.create.v1", params).await?;
        Ok(response)
    }

    /// Fetch a job's current state
    pub async fn get_job(&self, job_id: impl Into<String>) -> Result<JobResponse> {
        let request = JobIdRequest {
            job_id: job_id.into(),
        };
        let params = rpc_params![request];
        let response: JobResponse = self.client.request("job.get.v1", params).await?;
        Ok(response)
    }

    /// List jobs owned by an account
    pub async fn list_jobs(
        &self,
        owner_id: impl Into<String>,
        limit: Option<i64>,
    ) -> Result<ListJobsResponse> {
        let request = ListJobsRequest {
            owner_id: owner_id.into(),
            limit: limit.unwrap_or(50),
        };
        let params = rpc_params![request];
        let response: ListJobsResponse = self.client.request("job.list.v1", params).await?;
        Ok(response)
    }

    /// Cancel a job
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use plotpalette_sdk::PlotPaletteClient;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = PlotPaletteClient::connect("http://127.0.0.1:9527").await?;
    /// let response = client.cancel_job("job-123").await?;
    /// assert!(response.cancelled);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn cancel_job(&self, job_id: impl Into<String>) -> Result<CancelResponse> {
        let request = JobIdRequest {
            job_id: job_id.into(),
        };
        let params = rpc_params![request];
        let response: CancelResponse = self.client.request("job.cancel.v1", params).await?;
        Ok(response)
    }

    /// Resolve the blob key holding a job's export artifact, if one exists yet
    pub async fn export_url(&self, job_id: impl Into<String>) -> Result<ExportUrlResponse> {
        let request = JobIdRequest {
            job_id: job_id.into(),
        };
        let params = rpc_params![request];
        let response: ExportUrlResponse = self.client.request("job.export_url.v1", params).await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_sdk_types() {
        // Basic smoke test to ensure SDK compiles
        // Integration tests require a running daemon
    }
}
