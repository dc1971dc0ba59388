// SQLite Cost Event Store — append-only ledger backing the Cost Tracker (§4.4).

use async_trait::async_trait;
use plotpalette_core::domain::{CostEvent, CostEventKind, Micros};
use plotpalette_core::error::{AppError, Result};
use plotpalette_core::port::CostEventStore;
use sqlx::{Row, SqlitePool};

pub struct SqliteCostEventStore {
    pool: SqlitePool,
}

impl SqliteCostEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

fn kind_to_str(kind: CostEventKind) -> &'static str {
    match kind {
        CostEventKind::ModelCall => "model-call",
        CostEventKind::ComputeSlice => "compute-slice",
        CostEventKind::Storage => "storage",
    }
}

fn kind_from_str(s: &str) -> Result<CostEventKind> {
    Ok(match s {
        "model-call" => CostEventKind::ModelCall,
        "compute-slice" => CostEventKind::ComputeSlice,
        "storage" => CostEventKind::Storage,
        other => return Err(AppError::Database(format!("unknown cost event kind '{other}'"))),
    })
}

#[async_trait]
impl CostEventStore for SqliteCostEventStore {
    async fn append(&self, event: &CostEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cost_events (
                job_id, seq, timestamp, kind, model_id,
                input_tokens, output_tokens, cost_micros, ttl_expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.job_id)
        .bind(event.seq)
        .bind(event.timestamp)
        .bind(kind_to_str(event.kind))
        .bind(&event.model_id)
        .bind(event.input_tokens)
        .bind(event.output_tokens)
        .bind(event.cost.0)
        .bind(event.ttl_expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn list_for_job(&self, job_id: &str) -> Result<Vec<CostEvent>> {
        let rows = sqlx::query("SELECT * FROM cost_events WHERE job_id = ? ORDER BY seq ASC")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let kind: String = row.try_get("kind").map_err(db_err)?;
                Ok(CostEvent {
                    job_id: row.try_get("job_id").map_err(db_err)?,
                    seq: row.try_get("seq").map_err(db_err)?,
                    timestamp: row.try_get("timestamp").map_err(db_err)?,
                    kind: kind_from_str(&kind)?,
                    model_id: row.try_get("model_id").map_err(db_err)?,
                    input_tokens: row.try_get("input_tokens").map_err(db_err)?,
                    output_tokens: row.try_get("output_tokens").map_err(db_err)?,
                    cost: Micros(row.try_get("cost_micros").map_err(db_err)?),
                    ttl_expires_at: row.try_get("ttl_expires_at").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn gc_expired(&self, now: i64) -> Result<i64> {
        let result = sqlx::query("DELETE FROM cost_events WHERE ttl_expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn store() -> SqliteCostEventStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteCostEventStore::new(pool)
    }

    #[tokio::test]
    async fn append_and_list_round_trips_ordered_by_seq() {
        let store = store().await;
        store
            .append(&CostEvent::model_call(
                "job-1", 2, 2000, "gpt-tier-1", 100, 50, Micros::from_dollars(0.01), 99_999,
            ))
            .await
            .unwrap();
        store
            .append(&CostEvent::model_call(
                "job-1", 1, 1000, "gpt-tier-1", 100, 50, Micros::from_dollars(0.01), 99_999,
            ))
            .await
            .unwrap();

        let events = store.list_for_job("job-1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, 1);
        assert_eq!(events[1].seq, 2);
    }

    #[tokio::test]
    async fn gc_expired_deletes_only_past_ttl() {
        let store = store().await;
        store
            .append(&CostEvent::model_call(
                "job-1", 1, 1000, "gpt-tier-1", 100, 50, Micros::from_dollars(0.01), 5_000,
            ))
            .await
            .unwrap();
        store
            .append(&CostEvent::model_call(
                "job-1", 2, 2000, "gpt-tier-1", 100, 50, Micros::from_dollars(0.01), 50_000,
            ))
            .await
            .unwrap();

        let deleted = store.gc_expired(10_000).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = store.list_for_job("job-1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].seq, 2);
    }
}
