// SQLite Metadata Store — the conditional-version layer of the dual-layer
// checkpoint protocol (§4.3 I2).

use async_trait::async_trait;
use plotpalette_core::domain::{CheckpointMetadata, Micros};
use plotpalette_core::port::{MetadataStore, MetadataStoreError};
use sqlx::{Row, SqlitePool};

pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn io_err(e: sqlx::Error) -> MetadataStoreError {
    MetadataStoreError::Io(e.to_string())
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, job_id: &str) -> Result<Option<CheckpointMetadata>, MetadataStoreError> {
        let row = sqlx::query("SELECT * FROM checkpoint_metadata WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(io_err)?;

        row.map(|r| {
            Ok(CheckpointMetadata {
                job_id: r.try_get("job_id").map_err(io_err)?,
                version: r.try_get("version").map_err(io_err)?,
                tag: r.try_get("tag").map_err(io_err)?,
                records_generated: r.try_get("records_generated").map_err(io_err)?,
                records_rejected: r.try_get("records_rejected").map_err(io_err)?,
                tokens_used: r.try_get("tokens_used").map_err(io_err)?,
                cost_accumulated: Micros(r.try_get("cost_accumulated_micros").map_err(io_err)?),
                updated_at: r.try_get("updated_at").map_err(io_err)?,
            })
        })
        .transpose()
    }

    /// Checked with an explicit `BEGIN IMMEDIATE` so the read-then-write is
    /// atomic against a second writer racing on the same `job_id`: SQLite
    /// grants the write lock to whichever connection issues `BEGIN IMMEDIATE`
    /// first, and blocks the other until it commits or rolls back.
    async fn compare_and_swap(
        &self,
        expected_version: i64,
        new: &CheckpointMetadata,
    ) -> Result<(), MetadataStoreError> {
        let mut conn = self.pool.acquire().await.map_err(io_err)?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(io_err)?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM checkpoint_metadata WHERE job_id = ?")
                .bind(&new.job_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(io_err)?;

        let actual = current_version.unwrap_or(0);
        if actual != expected_version {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(MetadataStoreError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO checkpoint_metadata (
                job_id, version, tag, records_generated, records_rejected,
                tokens_used, cost_accumulated_micros, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id) DO UPDATE SET
                version = excluded.version,
                tag = excluded.tag,
                records_generated = excluded.records_generated,
                records_rejected = excluded.records_rejected,
                tokens_used = excluded.tokens_used,
                cost_accumulated_micros = excluded.cost_accumulated_micros,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&new.job_id)
        .bind(new.version)
        .bind(&new.tag)
        .bind(new.records_generated)
        .bind(new.records_rejected)
        .bind(new.tokens_used)
        .bind(new.cost_accumulated.0)
        .bind(new.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(io_err)?;

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(io_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn store() -> SqliteMetadataStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteMetadataStore::new(pool)
    }

    #[tokio::test]
    async fn first_write_at_version_zero_succeeds() {
        let store = store().await;
        let mut meta = CheckpointMetadata::initial("job-1");
        meta.version = 1;
        meta.tag = "tag-a".into();

        store.compare_and_swap(0, &meta).await.unwrap();

        let fetched = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.tag, "tag-a");
    }

    #[tokio::test]
    async fn stale_expected_version_is_rejected() {
        let store = store().await;
        let mut meta = CheckpointMetadata::initial("job-1");
        meta.version = 1;
        store.compare_and_swap(0, &meta).await.unwrap();

        let mut stale_write = CheckpointMetadata::initial("job-1");
        stale_write.version = 2;
        let err = store.compare_and_swap(0, &stale_write).await.unwrap_err();
        match err {
            MetadataStoreError::VersionConflict { expected, actual } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected VersionConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sequential_writes_advance_version() {
        let store = store().await;
        let mut v1 = CheckpointMetadata::initial("job-1");
        v1.version = 1;
        store.compare_and_swap(0, &v1).await.unwrap();

        let mut v2 = CheckpointMetadata::initial("job-1");
        v2.version = 2;
        v2.records_generated = 10;
        store.compare_and_swap(1, &v2).await.unwrap();

        let fetched = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(fetched.version, 2);
        assert_eq!(fetched.records_generated, 10);
    }
}
