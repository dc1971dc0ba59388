// SQLite Maintenance Implementation

use async_trait::async_trait;
use plotpalette_core::error::{AppError, Result};
use plotpalette_core::port::{Maintenance, MaintenanceStats, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Get DB file size in MB
    async fn get_db_size(&self) -> Result<f64> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("failed to get page count: {}", e)))?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("failed to get page size: {}", e)))?;

        let size_bytes = page_count * page_size;
        Ok(size_bytes as f64 / (1024.0 * 1024.0))
    }
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn vacuum(&self) -> Result<f64> {
        info!("running VACUUM to optimize database");

        let size_before = self.get_db_size().await?;

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("VACUUM failed: {}", e)))?;

        let size_after = self.get_db_size().await?;
        let reclaimed = (size_before - size_after).max(0.0);

        info!(
            size_before_mb = size_before,
            size_after_mb = size_after,
            reclaimed_mb = reclaimed,
            "VACUUM completed"
        );

        Ok(reclaimed)
    }

    async fn gc_finished_jobs(&self, retention_days: i64) -> Result<i64> {
        let now = self.time_provider.now_millis();
        let cutoff_time = now - retention_days * 24 * 60 * 60 * 1000;

        info!(retention_days, cutoff_time, "running finished job GC");

        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status IN ('COMPLETED', 'FAILED', 'CANCELLED', 'BUDGET_EXCEEDED')
            AND updated_at < ?
            "#,
        )
        .bind(cutoff_time)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("job GC failed: {}", e)))?;

        let deleted = result.rows_affected() as i64;
        info!(deleted_jobs = deleted, "finished job GC completed");
        Ok(deleted)
    }

    async fn gc_checkpoint_blobs(&self, retention_days: i64) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff_time = now - retention_days * 24 * 60 * 60 * 1000;

        info!(retention_days, cutoff_time, "running checkpoint blob GC");

        // Delete checkpoint-metadata rows (and their blobs) for jobs that
        // reached a terminal state more than `retention_days` ago, or that no
        // longer have a job row at all (swept already by gc_finished_jobs).
        let job_ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT cm.job_id FROM checkpoint_metadata cm
            LEFT JOIN jobs j ON j.id = cm.job_id
            WHERE j.id IS NULL
               OR (j.status IN ('COMPLETED', 'FAILED', 'CANCELLED', 'BUDGET_EXCEEDED')
                   AND j.updated_at < ?)
            "#,
        )
        .bind(cutoff_time)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("checkpoint blob GC scan failed: {}", e)))?;

        let mut deleted = 0usize;
        for job_id in job_ids {
            let key = plotpalette_core::port::blob_store::checkpoint_key(&job_id);

            sqlx::query("DELETE FROM blobs WHERE key = ?")
                .bind(&key)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::Internal(format!("blob delete failed: {}", e)))?;

            sqlx::query("DELETE FROM checkpoint_metadata WHERE job_id = ?")
                .bind(&job_id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::Internal(format!("checkpoint metadata delete failed: {}", e)))?;

            deleted += 1;
        }

        info!(deleted_blobs = deleted, "checkpoint blob GC completed");
        Ok(deleted)
    }

    async fn gc_expired_cost_events(&self) -> Result<i64> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query("DELETE FROM cost_events WHERE ttl_expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("cost event GC failed: {}", e)))?;

        let deleted = result.rows_affected() as i64;
        info!(deleted_cost_events = deleted, "cost event GC completed");
        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_mb = self.get_db_size().await?;
        let db_size_bytes = (db_size_mb * 1024.0 * 1024.0) as i64;

        let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("failed to count jobs: {}", e)))?;

        let finished_job_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE status IN ('COMPLETED', 'FAILED', 'CANCELLED', 'BUDGET_EXCEEDED')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("failed to count finished jobs: {}", e)))?;

        let checkpoint_blob_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("failed to count blobs: {}", e)))?;

        let now = self.time_provider.now_millis();
        let expired_cost_event_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cost_events WHERE ttl_expires_at <= ?")
                .bind(now)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::Internal(format!("failed to count expired cost events: {}", e)))?;

        let fragmentation_percent = if job_count > 0 {
            (finished_job_count as f64 / job_count as f64) * 100.0
        } else {
            0.0
        };

        Ok(MaintenanceStats {
            db_size_mb,
            db_size_bytes,
            job_count,
            finished_job_count,
            checkpoint_blob_count: checkpoint_blob_count as usize,
            expired_cost_event_count,
            fragmentation_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteJobRepository};
    use plotpalette_core::domain::{ExportFormat, Job, JobPayload, JobStatus, Micros, Tolerance};
    use plotpalette_core::port::time_provider::SystemTimeProvider;
    use plotpalette_core::port::JobRepository;

    #[tokio::test]
    async fn test_maintenance_stats() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time_provider = Arc::new(SystemTimeProvider);
        let maintenance = SqliteMaintenance::new(pool, time_provider);

        let stats = maintenance.get_stats().await.unwrap();
        assert!(stats.db_size_mb > 0.0);
        assert_eq!(stats.job_count, 0);
        assert_eq!(stats.finished_job_count, 0);
    }

    #[tokio::test]
    async fn test_vacuum() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time_provider = Arc::new(SystemTimeProvider);
        let maintenance = SqliteMaintenance::new(pool, time_provider);

        let reclaimed = maintenance.vacuum().await.unwrap();
        assert!(reclaimed >= 0.0);
    }

    #[tokio::test]
    async fn test_gc_finished_jobs() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let job_repo = SqliteJobRepository::new(pool.clone());
        let maintenance = SqliteMaintenance::new(pool, time_provider.clone());

        let now_ms = time_provider.now_millis();
        let ten_days_ago = now_ms - (10 * 24 * 60 * 60 * 1000);

        let mut job = Job::new(
            "job-1",
            "owner-1",
            ten_days_ago,
            "tmpl-1",
            1,
            "seed-1",
            10,
            Micros::from_dollars(1.0),
            Tolerance::STRICT,
            ExportFormat::JsonLines,
            JobPayload::new(serde_json::json!({})),
        );
        job.status = JobStatus::Completed;
        job.updated_at = ten_days_ago;

        job_repo.insert(&job).await.unwrap();

        let deleted = maintenance.gc_finished_jobs(7).await.unwrap();
        assert_eq!(deleted, 1);

        let found = job_repo.find_by_id(&job.id).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_gc_expired_cost_events() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO cost_events (job_id, seq, timestamp, kind, model_id, input_tokens, output_tokens, cost_micros, ttl_expires_at) VALUES ('job-1', 1, 1000, 'model-call', 'tier-a', 10, 10, 100, 5000)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let time_provider = Arc::new(SystemTimeProvider);
        let maintenance = SqliteMaintenance::new(pool, time_provider);

        // SystemTimeProvider reports real wall-clock time, well past the
        // fixture's ttl_expires_at of 5000ms since epoch.
        let deleted = maintenance.gc_expired_cost_events().await.unwrap();
        assert_eq!(deleted, 1);
    }
}
