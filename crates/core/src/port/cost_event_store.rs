// Cost Event Store Port — append-only ledger backing the Cost Tracker (§3, §4.4)

use crate::domain::CostEvent;
use crate::error::Result;
use async_trait::async_trait;

/// Append-only store for cost events. Writes never mutate prior events;
/// failures here are non-fatal to the worker (§4.4 `cost-event-write-failed`)
/// since the checkpoint's running total is the authoritative figure for
/// pre-call budget checks.
#[async_trait]
pub trait CostEventStore: Send + Sync {
    async fn append(&self, event: &CostEvent) -> Result<()>;

    async fn list_for_job(&self, job_id: &str) -> Result<Vec<CostEvent>>;

    /// Delete events whose `ttl_expires_at` has passed; returns count deleted.
    async fn gc_expired(&self, now: i64) -> Result<i64>;
}
