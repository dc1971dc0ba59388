// SQLite Job Repository — implements JobRepository against the `jobs` table.

use async_trait::async_trait;
use plotpalette_core::domain::{
    ExportFormat, Job, JobId, JobPayload, JobStatus, Micros, StatusReason, Tolerance,
};
use plotpalette_core::error::{AppError, Result};
use plotpalette_core::port::JobRepository;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "QUEUED",
        JobStatus::Running => "RUNNING",
        JobStatus::Completed => "COMPLETED",
        JobStatus::Failed => "FAILED",
        JobStatus::Cancelled => "CANCELLED",
        JobStatus::BudgetExceeded => "BUDGET_EXCEEDED",
    }
}

fn status_from_str(s: &str) -> Result<JobStatus> {
    Ok(match s {
        "QUEUED" => JobStatus::Queued,
        "RUNNING" => JobStatus::Running,
        "COMPLETED" => JobStatus::Completed,
        "FAILED" => JobStatus::Failed,
        "CANCELLED" => JobStatus::Cancelled,
        "BUDGET_EXCEEDED" => JobStatus::BudgetExceeded,
        other => return Err(AppError::Database(format!("unknown job status '{other}' in row"))),
    })
}

fn reason_to_str(reason: StatusReason) -> &'static str {
    match reason {
        StatusReason::RestartBudgetExhausted => "restart-budget-exhausted",
        StatusReason::TemplateRenderError => "template-render-error",
        StatusReason::ModelUnrecoverable => "model-unrecoverable",
        StatusReason::CorruptedCheckpoint => "corrupted-checkpoint",
        StatusReason::CheckpointContention => "checkpoint-contention",
        StatusReason::BudgetPreCall => "budget-pre-call",
        StatusReason::UserCancelled => "user-cancelled",
        StatusReason::LaunchFailed => "launch-failed",
    }
}

fn reason_from_str(s: &str) -> Result<StatusReason> {
    Ok(match s {
        "restart-budget-exhausted" => StatusReason::RestartBudgetExhausted,
        "template-render-error" => StatusReason::TemplateRenderError,
        "model-unrecoverable" => StatusReason::ModelUnrecoverable,
        "corrupted-checkpoint" => StatusReason::CorruptedCheckpoint,
        "checkpoint-contention" => StatusReason::CheckpointContention,
        "budget-pre-call" => StatusReason::BudgetPreCall,
        "user-cancelled" => StatusReason::UserCancelled,
        "launch-failed" => StatusReason::LaunchFailed,
        other => return Err(AppError::Database(format!("unknown status reason '{other}' in row"))),
    })
}

fn format_to_str(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::JsonLines => "jsonlines",
        ExportFormat::Csv => "csv",
        ExportFormat::Columnar => "columnar",
    }
}

fn format_from_str(s: &str) -> Result<ExportFormat> {
    Ok(match s {
        "jsonlines" => ExportFormat::JsonLines,
        "csv" => ExportFormat::Csv,
        "columnar" => ExportFormat::Columnar,
        other => return Err(AppError::Database(format!("unknown output format '{other}' in row"))),
    })
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

fn row_to_job(row: SqliteRow) -> Result<Job> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let status_reason: Option<String> = row.try_get("status_reason").map_err(db_err)?;
    let output_format: String = row.try_get("output_format").map_err(db_err)?;
    let payload: String = row.try_get("payload").map_err(db_err)?;

    Ok(Job {
        id: row.try_get("id").map_err(db_err)?,
        owner_id: row.try_get("owner_id").map_err(db_err)?,
        status: status_from_str(&status)?,
        status_reason: status_reason.map(|s| reason_from_str(&s)).transpose()?,
        status_detail: row.try_get("status_detail").map_err(db_err)?,
        template_id: row.try_get("template_id").map_err(db_err)?,
        template_version: row.try_get("template_version").map_err(db_err)?,
        seed_locator: row.try_get("seed_locator").map_err(db_err)?,
        target_record_count: row.try_get("target_record_count").map_err(db_err)?,
        budget_limit: Micros(row.try_get("budget_limit_micros").map_err(db_err)?),
        budget_tolerance: Tolerance::new(
            row.try_get("budget_tolerance_numerator").map_err(db_err)?,
            row.try_get("budget_tolerance_denominator").map_err(db_err)?,
        ),
        output_format: format_from_str(&output_format)?,
        records_generated: row.try_get("records_generated").map_err(db_err)?,
        records_rejected: row.try_get("records_rejected").map_err(db_err)?,
        tokens_used: row.try_get("tokens_used").map_err(db_err)?,
        cost_accumulated: Micros(row.try_get("cost_accumulated_micros").map_err(db_err)?),
        payload: JobPayload::new(
            serde_json::from_str(&payload)
                .map_err(|e| AppError::Database(format!("corrupt payload JSON: {e}")))?,
        ),
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        let payload = serde_json::to_string(job.payload.as_value())
            .map_err(|e| AppError::Database(format!("payload serialization failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, owner_id, status, status_reason, status_detail,
                template_id, template_version, seed_locator, target_record_count,
                budget_limit_micros, budget_tolerance_numerator, budget_tolerance_denominator,
                output_format, records_generated, records_rejected, tokens_used,
                cost_accumulated_micros, payload, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.owner_id)
        .bind(status_to_str(job.status))
        .bind(job.status_reason.map(reason_to_str))
        .bind(&job.status_detail)
        .bind(&job.template_id)
        .bind(job.template_version)
        .bind(&job.seed_locator)
        .bind(job.target_record_count)
        .bind(job.budget_limit.0)
        .bind(job.budget_tolerance.numerator)
        .bind(job.budget_tolerance.denominator)
        .bind(format_to_str(job.output_format))
        .bind(job.records_generated)
        .bind(job.records_rejected)
        .bind(job.tokens_used)
        .bind(job.cost_accumulated.0)
        .bind(payload)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(row_to_job).transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let payload = serde_json::to_string(job.payload.as_value())
            .map_err(|e| AppError::Database(format!("payload serialization failed: {e}")))?;

        sqlx::query(
            r#"
            UPDATE jobs SET
                status = ?, status_reason = ?, status_detail = ?,
                records_generated = ?, records_rejected = ?, tokens_used = ?,
                cost_accumulated_micros = ?, payload = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status_to_str(job.status))
        .bind(job.status_reason.map(reason_to_str))
        .bind(&job.status_detail)
        .bind(job.records_generated)
        .bind(job.records_rejected)
        .bind(job.tokens_used)
        .bind(job.cost_accumulated.0)
        .bind(payload)
        .bind(job.updated_at)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Atomic claim (I3): select the oldest QUEUED candidate, then
    /// `UPDATE ... WHERE id = ? AND status = 'QUEUED'` — a second dispatcher
    /// racing on the same row loses the status guard once the first write
    /// commits, and simply moves on to whatever is next on its poll tick.
    async fn pop_next(&self) -> Result<Option<Job>> {
        let candidate: Option<String> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE status = 'QUEUED' ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(id) = candidate else {
            return Ok(None);
        };

        let result = sqlx::query("UPDATE jobs SET status = 'RUNNING' WHERE id = ? AND status = 'QUEUED'")
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(&id).await
    }

    /// Read-only peek, no write (§4.1: the dispatcher claims separately via
    /// `try_start` only after the worker task is submitted).
    async fn peek_next_queued(&self) -> Result<Option<Job>> {
        let candidate: Option<String> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE status = 'QUEUED' ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(id) = candidate else {
            return Ok(None);
        };

        self.find_by_id(&id).await
    }

    /// Atomic single-row claim, conditioned on the job still being QUEUED.
    /// `None` if it raced away between the peek and this call.
    async fn try_start(&self, job_id: &JobId, now_millis: i64) -> Result<Option<Job>> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'RUNNING', updated_at = ? WHERE id = ? AND status = 'QUEUED'",
        )
        .bind(now_millis)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(job_id).await
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status_to_str(status))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs WHERE status = ? ORDER BY created_at ASC")
            .bind(status_to_str(status))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(row_to_job).collect()
    }

    async fn list_by_owner(&self, owner_id: &str, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs WHERE owner_id = ? ORDER BY created_at DESC LIMIT ?")
            .bind(owner_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(row_to_job).collect()
    }
}
