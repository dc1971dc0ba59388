// Dispatcher constants (no magic values)
use std::time::Duration;

/// Sleep duration when the queue is empty.
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a dispatcher error before retrying.
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default worker-restart cap on non-terminal exits (§4.1, §6 `max_worker_restarts`).
pub const DEFAULT_MAX_WORKER_RESTARTS: u32 = 3;

/// Default staleness before a RUNNING job is considered dead (§5 `heartbeat_timeout_seconds`).
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: i64 = 600_000;

/// Default preemption grace window (§5 `preempt_grace_seconds`).
pub const DEFAULT_PREEMPT_GRACE_MS: i64 = 120_000;
