//! Plot Palette CLI - Command-line interface for Plot Palette Worker

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "plotpalette")]
#[command(about = "Plot Palette Worker CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "PLOTPALETTE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new generation job
    Submit {
        /// Owning account
        #[arg(long)]
        owner: String,

        /// Template ID
        #[arg(long)]
        template: String,

        /// Template version
        #[arg(long, default_value = "1")]
        template_version: i64,

        /// Path to the seed-data JSONL file
        #[arg(long)]
        seed: String,

        /// Number of records to generate
        #[arg(short = 'n', long)]
        target_records: i64,

        /// Budget limit in dollars
        #[arg(long)]
        budget: f64,

        /// Output format: jsonl, csv, columnar
        #[arg(long, default_value = "jsonl")]
        format: String,

        /// Extra payload as a JSON string
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Get a job's current status
    Status { job_id: String },

    /// List jobs owned by an account
    List {
        #[arg(long)]
        owner: String,

        #[arg(short = 'n', long, default_value = "50")]
        limit: i64,
    },

    /// Cancel a job
    Cancel { job_id: String },

    /// Resolve a completed job's export blob key
    Export { job_id: String },

    /// Show daemon-wide statistics
    Stats,

    /// Run maintenance operations
    Maintenance {
        /// Force VACUUM even if not needed
        #[arg(long)]
        force_vacuum: bool,

        #[arg(long, default_value = "30")]
        retention_days: i64,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct JobRow {
    job_id: String,
    status: String,
    records_generated: i64,
    target_record_count: i64,
    cost_accumulated_dollars: f64,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            owner,
            template,
            template_version,
            seed,
            target_records,
            budget,
            format,
            payload,
        } => {
            let payload_json: serde_json::Value =
                serde_json::from_str(&payload).context("Invalid JSON payload")?;

            let params = json!({
                "owner_id": owner,
                "template_id": template,
                "template_version": template_version,
                "seed_locator": seed,
                "target_record_count": target_records,
                "budget_limit_dollars": budget,
                "output_format": format,
                "payload": payload_json,
            });

            let result = call_rpc(&cli.rpc_url, "job.create.v1", params).await?;
            let job: JobRow = serde_json::from_value(result)?;

            println!("{}", "✓ Job submitted".green().bold());
            println!();
            println!("{}", Table::new(vec![job]));
        }

        Commands::Status { job_id } => {
            let result = call_rpc(&cli.rpc_url, "job.get.v1", json!({ "job_id": job_id })).await?;
            let job: JobRow = serde_json::from_value(result)?;
            println!("{}", Table::new(vec![job]));
        }

        Commands::List { owner, limit } => {
            let result = call_rpc(
                &cli.rpc_url,
                "job.list.v1",
                json!({ "owner_id": owner, "limit": limit }),
            )
            .await?;

            let jobs: Vec<JobRow> = result
                .get("jobs")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();

            if jobs.is_empty() {
                println!("{}", "No jobs found".yellow());
            } else {
                println!("{}", Table::new(jobs));
            }
        }

        Commands::Cancel { job_id } => {
            call_rpc(&cli.rpc_url, "job.cancel.v1", json!({ "job_id": job_id })).await?;
            println!("{}", format!("✓ Job {} cancelled", job_id).green().bold());
        }

        Commands::Export { job_id } => {
            let result = call_rpc(
                &cli.rpc_url,
                "job.export_url.v1",
                json!({ "job_id": job_id }),
            )
            .await?;

            match result.get("blob_key").and_then(|v| v.as_str()) {
                Some(key) => println!("{} {}", "Export blob key:".bold(), key),
                None => println!("{}", "No export available yet".yellow()),
            }
        }

        Commands::Stats => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Queued:".bold(), stats["queued_jobs"]);
                    println!("  {} {}", "Running:".bold(), stats["running_jobs"]);
                    println!("  {} {}", "Completed:".bold(), stats["completed_jobs"]);
                    println!("  {} {}", "Failed:".bold(), stats["failed_jobs"]);
                    println!();
                    let db_mb =
                        stats["db_size_bytes"].as_i64().unwrap_or(0) as f64 / (1024.0 * 1024.0);
                    println!("  {} {:.2} MB", "DB Size:".bold(), db_mb);
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Maintenance {
            force_vacuum,
            retention_days,
        } => {
            println!("{}", "Running maintenance...".cyan().bold());
            println!();

            if force_vacuum {
                println!("  {} Force VACUUM enabled", "•".bold());
            }

            let params = json!({
                "force_vacuum": force_vacuum,
                "retention_days": retention_days,
            });

            match call_rpc(&cli.rpc_url, "admin.maintenance.v1", params).await {
                Ok(result) => {
                    println!("  ✓ Maintenance completed");
                    println!();
                    if result["vacuum_run"].as_bool().unwrap_or(false) {
                        println!("  {} VACUUM executed", "✓".green());
                    } else {
                        println!("  ○ VACUUM skipped (not needed)");
                    }
                    println!("  {} {} jobs deleted", "✓".green(), result["jobs_deleted"]);
                    println!(
                        "  {} {} checkpoint blobs deleted",
                        "✓".green(),
                        result["checkpoint_blobs_deleted"]
                    );
                    println!(
                        "  {} {} cost events deleted",
                        "✓".green(),
                        result["cost_events_deleted"]
                    );
                    println!();
                    let size_before_mb = result["db_size_before_bytes"].as_i64().unwrap_or(0) as f64
                        / (1024.0 * 1024.0);
                    let size_after_mb = result["db_size_after_bytes"].as_i64().unwrap_or(0) as f64
                        / (1024.0 * 1024.0);
                    println!(
                        "  {} {:.2} MB → {:.2} MB",
                        "DB Size:".bold(),
                        size_before_mb,
                        size_after_mb
                    );
                    let saved_mb = size_before_mb - size_after_mb;
                    if saved_mb > 0.0 {
                        println!("  {} {:.2} MB saved", "💾".bold(), saved_mb);
                    }
                }
                Err(e) => {
                    println!("  {} Maintenance failed: {}", "✗".red(), e);
                }
            }
        }
    }

    Ok(())
}
