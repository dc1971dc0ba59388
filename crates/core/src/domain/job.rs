// Job Domain Model

use super::error::DomainError;
use super::money::{Micros, Tolerance};
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4, generated via the IdProvider port)
pub type JobId = String;

/// Owning user/account ID
pub type OwnerId = String;

/// Job lifecycle status (§4.1 state machine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    BudgetExceeded,
}

impl JobStatus {
    /// Terminal states are sinks (I4): no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed
                | JobStatus::Failed
                | JobStatus::Cancelled
                | JobStatus::BudgetExceeded
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
            JobStatus::BudgetExceeded => write!(f, "BUDGET_EXCEEDED"),
        }
    }
}

/// Machine-readable reason for a terminal non-completed transition (§7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusReason {
    RestartBudgetExhausted,
    TemplateRenderError,
    ModelUnrecoverable,
    CorruptedCheckpoint,
    CheckpointContention,
    BudgetPreCall,
    UserCancelled,
    LaunchFailed,
}

impl std::fmt::Display for StatusReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusReason::RestartBudgetExhausted => "restart-budget-exhausted",
            StatusReason::TemplateRenderError => "template-render-error",
            StatusReason::ModelUnrecoverable => "model-unrecoverable",
            StatusReason::CorruptedCheckpoint => "corrupted-checkpoint",
            StatusReason::CheckpointContention => "checkpoint-contention",
            StatusReason::BudgetPreCall => "budget-pre-call",
            StatusReason::UserCancelled => "user-cancelled",
            StatusReason::LaunchFailed => "launch-failed",
        };
        write!(f, "{}", s)
    }
}

/// Output export format requested for the job (§6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    JsonLines,
    Csv,
    Columnar,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::JsonLines => "jsonl",
            ExportFormat::Csv => "csv",
            ExportFormat::Columnar => "columnar",
        }
    }
}

/// Template identity (template_id, version) — version is immutable once written (I6).
pub type TemplateId = String;
pub type TemplateVersion = i64;

/// Seed-data locator: opaque handle resolved by the SeedDataSource port.
pub type SeedLocator = String;

/// Job Payload (JSON serializable) — extra user-supplied context passed to
/// the template's prompt rendering, distinct from the template/seed/budget
/// fields that live directly on Job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Job Entity — the unit the Dispatcher and Worker cooperate on (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub status: JobStatus,
    pub status_reason: Option<StatusReason>,
    pub status_detail: Option<String>,

    pub template_id: TemplateId,
    pub template_version: TemplateVersion,
    pub seed_locator: SeedLocator,
    pub target_record_count: i64,
    pub budget_limit: Micros,
    pub budget_tolerance: Tolerance,
    pub output_format: ExportFormat,

    pub records_generated: i64,
    pub records_rejected: i64,
    pub tokens_used: i64,
    pub cost_accumulated: Micros,

    pub payload: JobPayload,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        created_at: i64,
        template_id: impl Into<String>,
        template_version: TemplateVersion,
        seed_locator: impl Into<String>,
        target_record_count: i64,
        budget_limit: Micros,
        budget_tolerance: Tolerance,
        output_format: ExportFormat,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            status: JobStatus::Queued,
            status_reason: None,
            status_detail: None,
            template_id: template_id.into(),
            template_version,
            seed_locator: seed_locator.into(),
            target_record_count,
            budget_limit,
            budget_tolerance,
            output_format,
            records_generated: 0,
            records_rejected: 0,
            tokens_used: 0,
            cost_accumulated: Micros::ZERO,
            payload,
            created_at,
            updated_at: created_at,
        }
    }

    /// A target of 0 records is already satisfied on creation (§8 boundary).
    pub fn target_already_met(&self) -> bool {
        self.records_generated >= self.target_record_count
    }

    /// QUEUED -> RUNNING, only called by the Dispatcher after launch.
    pub fn start(&mut self, now_millis: i64) -> Result<(), DomainError> {
        self.transition(JobStatus::Running, now_millis, None, None)
    }

    /// RUNNING -> COMPLETED
    pub fn complete(&mut self, now_millis: i64) -> Result<(), DomainError> {
        self.transition(JobStatus::Completed, now_millis, None, None)
    }

    /// RUNNING|QUEUED -> FAILED
    pub fn fail(
        &mut self,
        now_millis: i64,
        reason: StatusReason,
        detail: impl Into<String>,
    ) -> Result<(), DomainError> {
        self.transition(
            JobStatus::Failed,
            now_millis,
            Some(reason),
            Some(detail.into()),
        )
    }

    /// RUNNING|QUEUED -> CANCELLED
    pub fn cancel(&mut self, now_millis: i64) -> Result<(), DomainError> {
        self.transition(
            JobStatus::Cancelled,
            now_millis,
            Some(StatusReason::UserCancelled),
            None,
        )
    }

    /// RUNNING -> BUDGET_EXCEEDED
    pub fn exceed_budget(
        &mut self,
        now_millis: i64,
        detail: impl Into<String>,
    ) -> Result<(), DomainError> {
        self.transition(
            JobStatus::BudgetExceeded,
            now_millis,
            Some(StatusReason::BudgetPreCall),
            Some(detail.into()),
        )
    }

    fn transition(
        &mut self,
        to: JobStatus,
        now_millis: i64,
        reason: Option<StatusReason>,
        detail: Option<String>,
    ) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.status_reason = reason;
        self.status_detail = detail;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Element-wise-max merge of progress counters (I1): used when
    /// reconciling a checkpoint read against the job record, so a lost race
    /// never regresses the job's visible progress.
    pub fn merge_progress(
        &mut self,
        records_generated: i64,
        records_rejected: i64,
        tokens_used: i64,
        cost_accumulated: Micros,
    ) {
        self.records_generated = self.records_generated.max(records_generated);
        self.records_rejected = self.records_rejected.max(records_rejected);
        self.tokens_used = self.tokens_used.max(tokens_used);
        self.cost_accumulated = self.cost_accumulated.max(cost_accumulated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> Job {
        Job::new(
            "job-1",
            "owner-1",
            1000,
            "tmpl-1",
            1,
            "seed-1",
            100,
            Micros::from_dollars(10.0),
            Tolerance::STRICT,
            ExportFormat::JsonLines,
            JobPayload::new(serde_json::json!({})),
        )
    }

    #[test]
    fn new_job_is_queued() {
        let job = test_job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.records_generated, 0);
    }

    #[test]
    fn zero_target_is_already_met() {
        let mut job = test_job();
        job.target_record_count = 0;
        assert!(job.target_already_met());
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut job = test_job();
        job.start(2000).unwrap();
        job.complete(3000).unwrap();
        assert!(job.status.is_terminal());

        let err = job
            .fail(4000, StatusReason::ModelUnrecoverable, "x")
            .unwrap_err();
        match err {
            DomainError::InvalidStateTransition { from, to } => {
                assert_eq!(from, "COMPLETED");
                assert_eq!(to, "FAILED");
            }
            _ => panic!("expected InvalidStateTransition"),
        }
    }

    #[test]
    fn progress_merge_never_regresses() {
        let mut job = test_job();
        job.records_generated = 50;
        job.merge_progress(30, 0, 1000, Micros::from_dollars(1.0));
        assert_eq!(job.records_generated, 50);

        job.merge_progress(70, 2, 2000, Micros::from_dollars(2.0));
        assert_eq!(job.records_generated, 70);
        assert_eq!(job.records_rejected, 2);
    }
}
