// SQLite Template Store — read-only access to immutable (template_id, version) definitions (I6).

use async_trait::async_trait;
use plotpalette_core::domain::Template;
use plotpalette_core::error::{AppError, Result};
use plotpalette_core::port::TemplateStore;
use sqlx::SqlitePool;

pub struct SqliteTemplateStore {
    pool: SqlitePool,
}

impl SqliteTemplateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Templates are immutable once written (I6); callers load them at
    /// startup or via an out-of-band admin path, not through the job-facing API.
    pub async fn put(&self, template: &Template) -> Result<()> {
        let definition = serde_json::to_string(template)
            .map_err(|e| AppError::Database(format!("template serialization failed: {e}")))?;

        sqlx::query(
            "INSERT INTO templates (template_id, version, definition) VALUES (?, ?, ?)",
        )
        .bind(&template.template_id)
        .bind(template.version)
        .bind(definition)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl TemplateStore for SqliteTemplateStore {
    async fn get(&self, template_id: &str, version: i64) -> Result<Option<Template>> {
        let definition: Option<String> = sqlx::query_scalar(
            "SELECT definition FROM templates WHERE template_id = ? AND version = ?",
        )
        .bind(template_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        definition
            .map(|d| {
                serde_json::from_str(&d)
                    .map_err(|e| AppError::Database(format!("corrupt template JSON: {e}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use plotpalette_core::domain::TemplateStep;

    async fn store() -> SqliteTemplateStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteTemplateStore::new(pool)
    }

    fn test_template() -> Template {
        Template::new(
            "tmpl-1",
            1,
            vec![TemplateStep {
                step_id: "step-1".into(),
                tier: "tier-a".into(),
                prompt_source: "generate a record".into(),
                required_schema_fields: vec!["name".into()],
            }],
        )
    }

    #[tokio::test]
    async fn put_and_get_round_trips() {
        let store = store().await;
        store.put(&test_template()).await.unwrap();

        let found = store.get("tmpl-1", 1).await.unwrap().unwrap();
        assert_eq!(found.template_id, "tmpl-1");
        assert_eq!(found.schema_requirements, vec!["name".to_string()]);
    }

    #[tokio::test]
    async fn missing_version_returns_none() {
        let store = store().await;
        store.put(&test_template()).await.unwrap();
        assert!(store.get("tmpl-1", 2).await.unwrap().is_none());
    }
}
