// Cost Tracker / Budget Guard (§4.4)

use crate::domain::{CostEvent, Micros, RateTable, Tolerance};
use crate::port::CostEventStore;
use std::sync::Arc;
use tracing::warn;

/// Default cost-event TTL: 90 days in milliseconds.
pub const DEFAULT_COST_EVENT_TTL_MS: i64 = 90 * 24 * 60 * 60 * 1000;

/// Pre-call budget check. Holds only the rate table and tolerance; the
/// running total always comes from the caller's checkpoint state so there
/// is no process-wide mutable counter (§9).
pub struct BudgetGuard {
    rate_table: RateTable,
    tolerance: Tolerance,
}

impl BudgetGuard {
    pub fn new(rate_table: RateTable, tolerance: Tolerance) -> Self {
        Self { rate_table, tolerance }
    }

    /// §4.4: `cost_accumulated + projected_call_cost <= budget_limit * (1 + tolerance)`.
    pub fn allows(&self, accumulated: Micros, projected: Micros, budget_limit: Micros) -> bool {
        self.tolerance.within_budget(accumulated, projected, budget_limit)
    }

    /// Worst-case projected cost for one batch: batch size times the
    /// per-record upper-bound token estimate, priced at the most expensive
    /// tier used by the template (§4.2 step 2a).
    pub fn project_batch_cost(
        &self,
        batch_size: i64,
        max_input_tokens_per_record: i64,
        max_output_tokens_per_record: i64,
        most_expensive_tier: &str,
    ) -> Option<Micros> {
        let rate = self.rate_table.rate_for(most_expensive_tier)?;
        Some(rate.cost_of(
            batch_size * max_input_tokens_per_record,
            batch_size * max_output_tokens_per_record,
        ))
    }

    pub fn rate_for(&self, tier: &str) -> Option<crate::domain::TierRate> {
        self.rate_table.rate_for(tier)
    }
}

/// Append-only cost-event ledger. `record` is authoritative for audits
/// (P3); the in-memory/checkpoint running total remains authoritative for
/// pre-call checks even if a cost-event write fails (§4.4 non-fatal rule).
pub struct CostTracker {
    cost_events: Arc<dyn CostEventStore>,
    time_provider: Arc<dyn crate::port::TimeProvider>,
}

impl CostTracker {
    pub fn new(
        cost_events: Arc<dyn CostEventStore>,
        time_provider: Arc<dyn crate::port::TimeProvider>,
    ) -> Self {
        Self { cost_events, time_provider }
    }

    pub fn model_call_event(
        &self,
        job_id: &str,
        seq: i64,
        model_id: &str,
        input_tokens: i64,
        output_tokens: i64,
        cost: Micros,
    ) -> CostEvent {
        let now = self.time_provider.now_millis();
        CostEvent::model_call(job_id, seq, now, model_id, input_tokens, output_tokens, cost, now + DEFAULT_COST_EVENT_TTL_MS)
    }

    /// Non-fatal append: a failed write is logged and swallowed per §4.4,
    /// since the checkpoint's running total already reflects the cost.
    pub async fn try_record(&self, event: &CostEvent) {
        if let Err(e) = self.cost_events.append(event).await {
            warn!(job_id = %event.job_id, error = %e, "cost event write failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TierRate;
    use std::collections::BTreeMap;

    fn guard(tolerance: Tolerance) -> BudgetGuard {
        let mut tiers = BTreeMap::new();
        tiers.insert(
            "tier-1".to_string(),
            TierRate {
                input_rate_per_million: Micros::from_dollars(1.0),
                output_rate_per_million: Micros::from_dollars(3.0),
            },
        );
        BudgetGuard::new(RateTable { tiers }, tolerance)
    }

    #[test]
    fn strict_tolerance_allows_exact_match_only() {
        let guard = guard(Tolerance::STRICT);
        let budget = Micros::from_dollars(1.0);
        assert!(guard.allows(Micros::ZERO, Micros::from_dollars(1.0), budget));
        assert!(!guard.allows(Micros::ZERO, Micros::from_dollars(1.000001), budget));
    }

    #[test]
    fn projected_batch_cost_uses_most_expensive_tier_rate() {
        let guard = guard(Tolerance::STRICT);
        let cost = guard
            .project_batch_cost(50, 1_000_000 / 50, 1_000_000 / 50, "tier-1")
            .unwrap();
        assert_eq!(cost, Micros::from_dollars(4.0));
    }
}
