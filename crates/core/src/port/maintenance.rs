// DB Maintenance port

use crate::error::Result;
use async_trait::async_trait;

/// Database maintenance statistics
#[derive(Debug, Clone)]
pub struct MaintenanceStats {
    pub db_size_mb: f64,
    pub db_size_bytes: i64,
    pub job_count: i64,
    pub finished_job_count: i64,
    pub checkpoint_blob_count: usize,
    pub expired_cost_event_count: i64,
    pub fragmentation_percent: f64,
}

/// Maintenance configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Retention period for finished jobs (days)
    pub finished_job_retention_days: i64,

    /// Maximum DB size before forcing VACUUM (MB)
    pub max_db_size_mb: f64,

    /// Checkpoint blob retention period for terminal jobs (days)
    pub checkpoint_retention_days: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            finished_job_retention_days: 7,
            max_db_size_mb: 1000.0,
            checkpoint_retention_days: 3,
        }
    }
}

/// Database maintenance operations (§3): expired-cost-event pruning, terminal
/// job garbage collection, and blob/metadata compaction.
#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Run VACUUM to reclaim space and optimize DB.
    ///
    /// # Returns
    /// Space reclaimed in MB
    async fn vacuum(&self) -> Result<f64>;

    /// Delete finished jobs (and their checkpoint rows) older than retention period.
    ///
    /// # Returns
    /// Number of jobs deleted
    async fn gc_finished_jobs(&self, retention_days: i64) -> Result<i64>;

    /// Delete checkpoint blobs belonging to jobs that reached a terminal
    /// state more than `retention_days` ago.
    ///
    /// # Returns
    /// Number of blobs deleted
    async fn gc_checkpoint_blobs(&self, retention_days: i64) -> Result<usize>;

    /// Delete cost events whose `ttl_expires_at` has passed.
    ///
    /// # Returns
    /// Number of cost events deleted
    async fn gc_expired_cost_events(&self) -> Result<i64>;

    /// Get maintenance statistics
    async fn get_stats(&self) -> Result<MaintenanceStats>;

    /// Run full maintenance (VACUUM + GC)
    async fn run_full_maintenance(&self, config: &MaintenanceConfig) -> Result<MaintenanceStats> {
        let stats_before = self.get_stats().await?;

        let deleted_jobs = self
            .gc_finished_jobs(config.finished_job_retention_days)
            .await?;

        let deleted_blobs = self
            .gc_checkpoint_blobs(config.checkpoint_retention_days)
            .await?;

        let deleted_cost_events = self.gc_expired_cost_events().await?;

        let reclaimed_mb = if stats_before.db_size_mb > config.max_db_size_mb {
            self.vacuum().await?
        } else {
            0.0
        };

        let stats_after = self.get_stats().await?;

        tracing::info!(
            deleted_jobs = deleted_jobs,
            deleted_blobs = deleted_blobs,
            deleted_cost_events = deleted_cost_events,
            reclaimed_mb = reclaimed_mb,
            db_size_mb = stats_after.db_size_mb,
            "Maintenance completed"
        );

        Ok(stats_after)
    }
}
