// Cost Event Domain Model — append-only accounting trail (§3, §4.4)

use super::money::Micros;
use serde::{Deserialize, Serialize};

/// The kind of billable event a cost record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostEventKind {
    ModelCall,
    ComputeSlice,
    Storage,
}

/// A single append-only cost event. Never mutated once written; carries a
/// TTL for later pruning by the maintenance sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEvent {
    pub job_id: String,
    /// Monotonic per-job sequence number, used as the event log's sort key.
    pub seq: i64,
    pub timestamp: i64,
    pub kind: CostEventKind,
    pub model_id: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: Micros,
    pub ttl_expires_at: i64,
}

impl CostEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn model_call(
        job_id: impl Into<String>,
        seq: i64,
        timestamp: i64,
        model_id: impl Into<String>,
        input_tokens: i64,
        output_tokens: i64,
        cost: Micros,
        ttl_expires_at: i64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            seq,
            timestamp,
            kind: CostEventKind::ModelCall,
            model_id: Some(model_id.into()),
            input_tokens,
            output_tokens,
            cost,
            ttl_expires_at,
        }
    }
}

/// Per-tier rate pair, expressed per 1,000,000 tokens (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierRate {
    pub input_rate_per_million: Micros,
    pub output_rate_per_million: Micros,
}

impl TierRate {
    pub fn cost_of(&self, input_tokens: i64, output_tokens: i64) -> Micros {
        let input_cost = (self.input_rate_per_million.0 as i128 * input_tokens as i128)
            / 1_000_000;
        let output_cost = (self.output_rate_per_million.0 as i128 * output_tokens as i128)
            / 1_000_000;
        Micros((input_cost + output_cost) as i64)
    }
}

/// Tier -> rate table, the `rate_table` configuration key from §6. Required
/// at construction; never a process-wide mutable singleton (§9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateTable {
    pub tiers: std::collections::BTreeMap<String, TierRate>,
}

impl RateTable {
    pub fn rate_for(&self, tier: &str) -> Option<TierRate> {
        self.tiers.get(tier).copied()
    }
}
