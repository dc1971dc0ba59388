// Generation worker constants (no magic values, §6 defaults)
use std::time::Duration;

/// Records between checkpoint commits (§6 `checkpoint_interval`).
pub const DEFAULT_CHECKPOINT_INTERVAL: i64 = 50;

/// Per-invocation model-call retry budget (§6 `model_call_retries`).
pub const DEFAULT_MODEL_CALL_RETRIES: u32 = 5;

/// Local repair attempts for a record failing schema validation (§4.2 step 2d).
pub const DEFAULT_VALIDATION_REPAIR_ATTEMPTS: u32 = 2;

/// Preemption grace window, milliseconds (§6 `preempt_grace_seconds`).
pub const DEFAULT_PREEMPT_GRACE_MS: i64 = 120_000;

/// Hard per-call model deadline, milliseconds (§5).
pub const DEFAULT_MODEL_CALL_TIMEOUT_MS: i64 = 60_000;

/// Sleep while idle-polling for a preemption signal during a long flush.
pub const PREEMPTION_POLL_INTERVAL: Duration = Duration::from_millis(50);
