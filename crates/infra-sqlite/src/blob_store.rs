// SQLite Blob Store — content layer of the dual-layer checkpoint protocol
// (§4.3 I2, §6). Checkpoint snapshots and export/batch artifacts share the
// `blobs` table, distinguished only by key prefix.

use async_trait::async_trait;
use plotpalette_core::domain::BlobTag;
use plotpalette_core::port::{BlobStore, BlobStoreError};
use sqlx::SqlitePool;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Deterministic content tag: two writers racing to store identical bytes
/// land on the same tag and converge instead of conflicting.
fn content_tag(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn io_err(e: sqlx::Error) -> BlobStoreError {
    BlobStoreError::Io(e.to_string())
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    /// Checked with `BEGIN IMMEDIATE` so the read-compare-write is atomic
    /// against a second writer racing on the same key.
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        if_tag: Option<&BlobTag>,
    ) -> Result<BlobTag, BlobStoreError> {
        let tag = content_tag(bytes);
        let mut conn = self.pool.acquire().await.map_err(io_err)?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(io_err)?;

        let current: Option<String> = sqlx::query_scalar("SELECT tag FROM blobs WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *conn)
            .await
            .map_err(io_err)?;

        let matches_expected = current.as_deref() == if_tag.map(|t| t.as_str());
        let already_converged = current.as_deref() == Some(tag.as_str());

        if !matches_expected && !already_converged {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(BlobStoreError::TagMismatch {
                key: key.to_string(),
                expected: if_tag.cloned(),
                actual: current.unwrap_or_default(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO blobs (key, tag, bytes) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET tag = excluded.tag, bytes = excluded.bytes
            "#,
        )
        .bind(key)
        .bind(&tag)
        .bind(bytes)
        .execute(&mut *conn)
        .await
        .map_err(io_err)?;

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(io_err)?;

        Ok(tag)
    }

    async fn get(&self, key: &str) -> Result<(Vec<u8>, BlobTag), BlobStoreError> {
        let row: Option<(Vec<u8>, String)> =
            sqlx::query_as("SELECT bytes, tag FROM blobs WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(io_err)?;

        row.ok_or_else(|| BlobStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        sqlx::query("DELETE FROM blobs WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(io_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn store() -> SqliteBlobStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteBlobStore::new(pool)
    }

    #[tokio::test]
    async fn first_write_with_no_expected_tag_succeeds() {
        let store = store().await;
        let tag = store.put("k1", b"hello", None).await.unwrap();

        let (bytes, fetched_tag) = store.get("k1").await.unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(fetched_tag, tag);
    }

    #[tokio::test]
    async fn conditional_write_with_wrong_tag_is_rejected() {
        let store = store().await;
        store.put("k1", b"hello", None).await.unwrap();

        let err = store
            .put("k1", b"goodbye", Some(&"bogus-tag".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobStoreError::TagMismatch { .. }));
    }

    #[tokio::test]
    async fn identical_bytes_converge_despite_tag_mismatch() {
        let store = store().await;
        let tag = store.put("k1", b"hello", None).await.unwrap();

        // A second writer races with a stale `if_tag` but writes the exact
        // same bytes — this must succeed rather than spuriously conflict.
        let tag2 = store
            .put("k1", b"hello", Some(&"some-other-tag".to_string()))
            .await
            .unwrap();
        assert_eq!(tag, tag2);
    }

    #[tokio::test]
    async fn missing_key_get_errors_not_found() {
        let store = store().await;
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, BlobStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_blob() {
        let store = store().await;
        store.put("k1", b"hello", None).await.unwrap();
        store.delete("k1").await.unwrap();
        assert!(store.get("k1").await.is_err());
    }
}
