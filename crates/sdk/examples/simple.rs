//! Simple SDK Example
//!
//! Demonstrates basic usage of the Plot Palette SDK.
//!
//! # Usage
//!
//! 1. Start the daemon:
//!    ```bash
//!    cargo run --package plotpalette-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --example simple
//!    ```

use plotpalette_sdk::{CreateJobRequest, PlotPaletteClient};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Plot Palette SDK - Simple Example");
    println!("==================================\n");

    // 1. Connect to daemon
    println!("1. Connecting to daemon...");
    let client = PlotPaletteClient::connect("http://127.0.0.1:9527").await?;
    println!("   ✓ Connected\n");

    // 2. Submit a job
    println!("2. Submitting a job...");
    let job = client
        .create_job(CreateJobRequest {
            owner_id: "owner-1".to_string(),
            template_id: "tmpl-customer-profile".to_string(),
            template_version: 1,
            seed_locator: "examples/seed-data/customers.jsonl".to_string(),
            target_record_count: 100,
            budget_limit_dollars: 10.0,
            budget_tolerance_ppm: 0,
            output_format: Default::default(),
            payload: json!({}),
        })
        .await?;

    println!("   ✓ Job submitted:");
    println!("     - ID: {}", job.job_id);
    println!("     - Status: {}\n", job.status);

    // 3. Wait a bit for processing
    println!("3. Waiting 2 seconds...");
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    println!("   ✓ Done\n");

    // 4. Check progress
    println!("4. Checking job status...");
    let job = client.get_job(&job.job_id).await?;
    println!("   ✓ Status: {}", job.status);
    println!("     - Records generated: {}", job.records_generated);
    println!("     - Cost so far: ${:.4}\n", job.cost_accumulated_dollars);

    // 5. Cancel the job (if still running)
    println!("5. Cancelling job...");
    let cancel_response = client.cancel_job(&job.job_id).await?;

    if cancel_response.cancelled {
        println!("   ✓ Job cancelled");
    } else {
        println!("   ⚠ Job was already finished");
    }

    println!("\n✓ Example completed successfully!");

    Ok(())
}
