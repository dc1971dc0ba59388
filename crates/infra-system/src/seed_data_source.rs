// File Seed Data Source — reads newline-delimited JSON seed records off disk.
//
// `seed_locator` is a filesystem path to a `.jsonl` file. Each worker batch
// only ever touches a handful of indices, but re-parsing the file on every
// `read_at` would make a large seed set quadratic in practice, so a parsed
// file is cached in memory keyed by its locator after the first access.

use async_trait::async_trait;
use plotpalette_core::port::{SeedDataError, SeedDataSource};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct FileSeedDataSource {
    cache: RwLock<HashMap<String, Arc<Vec<serde_json::Value>>>>,
}

impl FileSeedDataSource {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn load(&self, seed_locator: &str) -> Result<Arc<Vec<serde_json::Value>>, SeedDataError> {
        if let Some(rows) = self.cache.read().await.get(seed_locator) {
            return Ok(Arc::clone(rows));
        }

        let contents = tokio::fs::read_to_string(seed_locator)
            .await
            .map_err(|e| SeedDataError::NotFound(format!("{seed_locator}: {e}")))?;

        let mut rows = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value = serde_json::from_str(line).map_err(|e| {
                SeedDataError::Io(format!(
                    "{seed_locator}:{} malformed JSON: {e}",
                    line_no + 1
                ))
            })?;
            rows.push(value);
        }

        let rows = Arc::new(rows);
        self.cache
            .write()
            .await
            .insert(seed_locator.to_string(), Arc::clone(&rows));
        Ok(rows)
    }
}

impl Default for FileSeedDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeedDataSource for FileSeedDataSource {
    async fn len(&self, seed_locator: &str) -> Result<i64, SeedDataError> {
        Ok(self.load(seed_locator).await?.len() as i64)
    }

    async fn read_at(
        &self,
        seed_locator: &str,
        index: i64,
    ) -> Result<serde_json::Value, SeedDataError> {
        let rows = self.load(seed_locator).await?;
        if index < 0 {
            return Err(SeedDataError::OutOfRange(index));
        }
        rows.get(index as usize)
            .cloned()
            .ok_or(SeedDataError::OutOfRange(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TempJsonl(PathBuf);

    impl Drop for TempJsonl {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn write_jsonl(name: &str, lines: &[&str]) -> TempJsonl {
        let mut path = std::env::temp_dir();
        path.push(format!("plotpalette-seed-test-{name}-{}.jsonl", std::process::id()));
        std::fs::write(&path, lines.join("\n")).unwrap();
        TempJsonl(path)
    }

    #[tokio::test]
    async fn reads_rows_by_index() {
        let path = write_jsonl("reads", &[r#"{"name":"a"}"#, r#"{"name":"b"}"#]);
        let source = FileSeedDataSource::new();
        let locator = path.0.to_str().unwrap();

        assert_eq!(source.len(locator).await.unwrap(), 2);
        assert_eq!(source.read_at(locator, 1).await.unwrap()["name"], "b");
    }

    #[tokio::test]
    async fn out_of_range_index_errors() {
        let path = write_jsonl("range", &[r#"{"name":"a"}"#]);
        let source = FileSeedDataSource::new();
        let locator = path.0.to_str().unwrap();

        assert!(matches!(
            source.read_at(locator, 5).await,
            Err(SeedDataError::OutOfRange(5))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let source = FileSeedDataSource::new();
        assert!(matches!(
            source.read_at("/nonexistent/path.jsonl", 0).await,
            Err(SeedDataError::NotFound(_))
        ));
    }
}
