// Exponential backoff with jitter, shared by model-call retries, checkpoint
// contention retries, and transient infra-error retries (§4.2, §6).

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_ms: i64,
    pub cap_ms: i64,
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            cap_ms: 32_000,
            jitter: 0.1,
        }
    }
}

/// Quota (rate-limit) errors back off `QUOTA_BACKOFF_MULTIPLIER` times
/// longer than ordinary transient errors at the same attempt number (§4.5:
/// "quota (retryable with longer backoff)").
const QUOTA_BACKOFF_MULTIPLIER: i64 = 4;

impl BackoffPolicy {
    pub fn new(base_ms: i64, cap_ms: i64, jitter: f64) -> Self {
        Self { base_ms, cap_ms, jitter }
    }

    /// Delay for the given zero-based attempt number, seeded off `seed_key`
    /// (typically the job id) so retries are deterministic per job rather
    /// than drawing from a process-wide RNG (§9: no mutable singletons).
    pub fn delay_ms(&self, attempt: u32, seed_key: &str) -> i64 {
        let exponential = self.base_ms.saturating_mul(1i64 << attempt.min(20));
        let capped = exponential.min(self.cap_ms);

        let seed = seed_key.bytes().map(|b| b as u32).sum::<u32>().wrapping_add(attempt);
        let jitter_span = (seed % 2001) as f64 / 1000.0 - 1.0; // -1.0..=1.0
        let jitter_factor = 1.0 + jitter_span * self.jitter;

        ((capped as f64) * jitter_factor).max(0.0) as i64
    }

    /// Same as `delay_ms`, stretched out for quota/rate-limit backoff.
    pub fn delay_ms_for_quota(&self, attempt: u32, seed_key: &str) -> i64 {
        self.delay_ms(attempt, seed_key).saturating_mul(QUOTA_BACKOFF_MULTIPLIER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_respects_cap() {
        let policy = BackoffPolicy::default();
        let d0 = policy.delay_ms(0, "job-a");
        let d5 = policy.delay_ms(5, "job-a");
        assert!(d5 >= d0);
        assert!(d5 <= (policy.cap_ms as f64 * (1.0 + policy.jitter)) as i64 + 1);
    }

    #[test]
    fn delay_is_deterministic_per_seed() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_ms(2, "job-a"), policy.delay_ms(2, "job-a"));
    }

    #[test]
    fn quota_backoff_is_longer_than_ordinary_backoff() {
        let policy = BackoffPolicy::default();
        assert!(policy.delay_ms_for_quota(0, "job-a") > policy.delay_ms(0, "job-a"));
    }
}
