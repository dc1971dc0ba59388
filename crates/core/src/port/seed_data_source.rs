// Seed Data Source Port (§3)

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeedDataError {
    #[error("seed source not found: {0}")]
    NotFound(String),

    #[error("seed record at index {0} is out of range")]
    OutOfRange(i64),

    #[error("seed source io error: {0}")]
    Io(String),
}

/// A single record drawn from the seed-data source that anchors a batch of
/// generated output. Indices are stable across reads, but rows are sampled
/// and may legitimately repeat across attempts (e.g. a small seed source
/// serving a larger target record count); a resumed worker's attempt-level
/// `completed_record_indices` (not seed-row identity) is what keeps it from
/// redoing earlier work (§8 P5).
#[async_trait]
pub trait SeedDataSource: Send + Sync {
    async fn len(&self, seed_locator: &str) -> Result<i64, SeedDataError>;

    async fn read_at(
        &self,
        seed_locator: &str,
        index: i64,
    ) -> Result<serde_json::Value, SeedDataError>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fixed in-memory row set, keyed by locator. Avoids touching the
    /// filesystem in tests that only care about the worker's record loop.
    pub struct InMemorySeedDataSource {
        rows: Mutex<HashMap<String, Vec<serde_json::Value>>>,
    }

    impl InMemorySeedDataSource {
        pub fn new(locator: impl Into<String>, rows: Vec<serde_json::Value>) -> Self {
            let mut map = HashMap::new();
            map.insert(locator.into(), rows);
            Self { rows: Mutex::new(map) }
        }
    }

    #[async_trait]
    impl SeedDataSource for InMemorySeedDataSource {
        async fn len(&self, seed_locator: &str) -> Result<i64, SeedDataError> {
            self.rows
                .lock()
                .unwrap()
                .get(seed_locator)
                .map(|rows| rows.len() as i64)
                .ok_or_else(|| SeedDataError::NotFound(seed_locator.to_string()))
        }

        async fn read_at(
            &self,
            seed_locator: &str,
            index: i64,
        ) -> Result<serde_json::Value, SeedDataError> {
            let rows = self.rows.lock().unwrap();
            let rows = rows
                .get(seed_locator)
                .ok_or_else(|| SeedDataError::NotFound(seed_locator.to_string()))?;
            rows.get(index as usize)
                .cloned()
                .ok_or(SeedDataError::OutOfRange(index))
        }
    }
}
