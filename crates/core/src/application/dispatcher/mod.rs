// Dispatcher — Job Lifecycle Controller (§4.1)
//
// Owns every job status transition. Workers never write status directly
// (§3 ownership split): they return a `WorkerOutcome` and the dispatcher
// maps it onto the state machine. The dispatcher also owns worker restarts
// on non-terminal exit and best-effort cancellation of a running job.

pub mod constants;

use crate::application::worker::{shutdown_channel, GenerationWorker, ShutdownSender, WorkerOutcome};
use crate::domain::{Job, JobId, JobStatus, StatusReason};
use crate::error::{AppError, Result};
use crate::port::{ComputeRuntime, JobRepository, MetadataStore, TimeProvider};
use constants::*;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::time::sleep;
use tracing::{error, info, warn};

pub struct DispatcherConfig {
    pub max_worker_restarts: u32,
    pub heartbeat_timeout_ms: i64,
    pub preempt_grace_ms: i64,
    pub poll_interval: std::time::Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_worker_restarts: DEFAULT_MAX_WORKER_RESTARTS,
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
            preempt_grace_ms: DEFAULT_PREEMPT_GRACE_MS,
            poll_interval: IDLE_SLEEP_DURATION,
        }
    }
}

/// Job lifecycle controller (§4.1). `try_start` on the job repository is the
/// atomic QUEUED -> RUNNING claim, performed after the worker task is
/// submitted; this type is responsible for the submission itself, detecting
/// a dead worker via heartbeat staleness, bounded restarts, and cancellation.
pub struct Dispatcher {
    job_repo: Arc<dyn JobRepository>,
    metadata_store: Arc<dyn MetadataStore>,
    compute_runtime: Arc<dyn ComputeRuntime>,
    worker: Arc<GenerationWorker>,
    time_provider: Arc<dyn TimeProvider>,
    config: DispatcherConfig,
    active: Mutex<HashMap<JobId, ShutdownSender>>,
    restart_counts: Mutex<HashMap<JobId, u32>>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        metadata_store: Arc<dyn MetadataStore>,
        compute_runtime: Arc<dyn ComputeRuntime>,
        worker: Arc<GenerationWorker>,
        time_provider: Arc<dyn TimeProvider>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            job_repo,
            metadata_store,
            compute_runtime,
            worker,
            time_provider,
            config,
            active: Mutex::new(HashMap::new()),
            restart_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Main event loop: alternately claims queued work and sweeps running
    /// jobs for dead workers, until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: crate::application::worker::ShutdownToken) {
        info!("dispatcher loop started");
        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("dispatcher loop stopping");
                    return;
                }
                _ = sleep(self.config.poll_interval) => {}
            }

            if let Err(e) = self.dispatch_once().await {
                error!(error = ?e, "dispatch_once failed");
                sleep(ERROR_RECOVERY_SLEEP_DURATION).await;
            }

            if let Err(e) = self.sweep_heartbeats().await {
                error!(error = ?e, "heartbeat sweep failed");
            }
        }
    }

    /// Peek at most one queued job and launch it. §4.1: RUNNING is recorded
    /// only once the worker task is at least submitted, so `launch` itself
    /// performs the QUEUED -> RUNNING claim after `compute_runtime.spawn`
    /// returns, not before (I5).
    pub async fn dispatch_once(self: &Arc<Self>) -> Result<()> {
        if let Some(job) = self.job_repo.peek_next_queued().await? {
            self.launch(job).await?;
        }
        Ok(())
    }

    /// Re-launch every RUNNING job whose checkpoint metadata has gone stale
    /// past `heartbeat_timeout_ms` (§5), up to `max_worker_restarts` (§4.1).
    async fn sweep_heartbeats(self: &Arc<Self>) -> Result<()> {
        let now = self.time_provider.now_millis();
        for job in self.job_repo.find_by_status(JobStatus::Running).await? {
            if self.active.lock().unwrap().contains_key(&job.id) {
                continue;
            }

            let last_update = self
                .metadata_store
                .get(&job.id)
                .await
                .ok()
                .flatten()
                .map(|m| m.updated_at)
                .unwrap_or(job.updated_at);

            if now - last_update < self.config.heartbeat_timeout_ms {
                continue;
            }

            let restarts = {
                let mut counts = self.restart_counts.lock().unwrap();
                let entry = counts.entry(job.id.clone()).or_insert(0);
                *entry += 1;
                *entry
            };

            if restarts > self.config.max_worker_restarts {
                warn!(job_id = %job.id, restarts, "restart budget exhausted");
                let mut job = job;
                job.fail(
                    now,
                    StatusReason::RestartBudgetExhausted,
                    "restart-budget-exhausted",
                )?;
                self.job_repo.update(&job).await?;
                continue;
            }

            warn!(job_id = %job.id, restarts, "heartbeat stale, relaunching worker");
            self.launch(job).await?;
        }
        Ok(())
    }

    /// Submit the job's worker task to the compute runtime (§4.1, §6
    /// `launch_worker`). Failure to submit is `launch-failed`, a terminal
    /// condition — the job never ran, so it cannot be retried.
    ///
    /// For a fresh QUEUED job, the atomic `Queued -> Running` claim happens
    /// only after `spawn` returns `Ok` (§4.1: status reflects reality, not
    /// intent). If the claim then loses the race — cancelled or claimed by
    /// another dispatcher between the peek and the claim — the just-spawned
    /// task is shut down immediately rather than left to run under a status
    /// assumption that no longer holds. A relaunch of an already-RUNNING job
    /// (heartbeat sweep) skips the claim: there is nothing left to claim.
    async fn launch(self: &Arc<Self>, job: Job) -> Result<()> {
        let was_queued = job.status == JobStatus::Queued;
        let (tx, rx) = shutdown_channel();
        self.active.lock().unwrap().insert(job.id.clone(), tx.clone());

        let dispatcher = Arc::clone(self);
        let worker = Arc::clone(&self.worker);
        let job_id = job.id.clone();
        let job_for_task = job.clone();

        let task: crate::port::compute_runtime::BoxedUnitFuture = Box::pin(async move {
            // Catch panics here, inside the dispatcher's own task, rather
            // than relying solely on the compute runtime's isolation: a
            // panic caught only at the runtime boundary would skip
            // `reconcile`, leaving the job stuck RUNNING and its entry in
            // `active` forever (the heartbeat sweep skips anything it
            // already considers active).
            let outcome = match AssertUnwindSafe(worker.run(&job_for_task, rx)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(AppError::Internal(format!(
                    "worker task panicked: {}",
                    panic_message(payload)
                ))),
            };
            dispatcher.reconcile(&job_id, outcome).await;
        });

        match self.compute_runtime.spawn(task).await {
            Ok(()) => {
                if was_queued {
                    match self.job_repo.try_start(&job.id, self.time_provider.now_millis()).await {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            warn!(job_id = %job.id, "lost claim race after spawn, shutting down task");
                            tx.shutdown();
                        }
                        Err(e) => {
                            error!(job_id = %job.id, error = ?e, "failed to record RUNNING after spawn, shutting down task");
                            tx.shutdown();
                        }
                    }
                }
            }
            Err(e) => {
                self.active.lock().unwrap().remove(&job.id);
                let mut job = job;
                job.fail(
                    self.time_provider.now_millis(),
                    StatusReason::LaunchFailed,
                    e.to_string(),
                )?;
                self.job_repo.update(&job).await?;
            }
        }
        Ok(())
    }

    /// Maps a worker's terminal outcome onto the state machine. Called from
    /// inside the spawned task, never from `run`'s own poll loop.
    async fn reconcile(&self, job_id: &str, outcome: Result<WorkerOutcome>) {
        self.active.lock().unwrap().remove(job_id);

        let job = match self.job_repo.find_by_id(&job_id.to_string()).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id, "reconcile: job vanished");
                return;
            }
            Err(e) => {
                error!(job_id, error = ?e, "reconcile: failed to load job");
                return;
            }
        };

        if job.status.is_terminal() {
            return;
        }

        let now = self.time_provider.now_millis();
        let mut job = job;

        // Sync the job record's user-visible counters from the checkpoint
        // before transitioning (§3: the dispatcher never touches in-flight
        // counters except via reconciliation of a checkpoint read; §7 user-
        // visible surface requires records_generated/rejected/cost on Job).
        if let Ok(Some(meta)) = self.metadata_store.get(job_id).await {
            job.merge_progress(
                meta.records_generated,
                meta.records_rejected,
                meta.tokens_used,
                meta.cost_accumulated,
            );
        }

        let result = match outcome {
            Ok(WorkerOutcome::Completed) => job.complete(now),
            Ok(WorkerOutcome::BudgetExceeded { detail }) => job.exceed_budget(now, detail),
            Ok(WorkerOutcome::Preempted { .. }) => job.cancel(now),
            Ok(WorkerOutcome::Failed { reason, detail }) => job.fail(now, reason, detail),
            Err(e) => job.fail(now, StatusReason::ModelUnrecoverable, e.to_string()),
        };

        if let Err(e) = result {
            warn!(job_id, error = ?e, "reconcile: illegal transition, leaving job as-is");
            return;
        }

        if let Err(e) = self.job_repo.update(&job).await {
            error!(job_id, error = ?e, "reconcile: failed to persist job transition");
        }
    }

    /// User-initiated delete (§4.1). QUEUED jobs are cancelled immediately;
    /// RUNNING jobs are signalled, given up to `preempt_grace_ms` to land a
    /// final checkpoint via their own reconcile, then force-cancelled.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self
            .job_repo
            .find_by_id(&job_id.to_string())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;

        match job.status {
            JobStatus::Queued => {
                let mut job = job;
                job.cancel(self.time_provider.now_millis())?;
                self.job_repo.update(&job).await
            }
            JobStatus::Running => self.cancel_running(job_id).await,
            other => Err(AppError::InvalidState(format!(
                "job {job_id} is already {other}, cannot cancel"
            ))),
        }
    }

    async fn cancel_running(&self, job_id: &str) -> Result<()> {
        if let Some(tx) = self.active.lock().unwrap().get(job_id) {
            tx.shutdown();
        }

        let deadline = self.time_provider.now_millis() + self.config.preempt_grace_ms;
        loop {
            if let Some(job) = self.job_repo.find_by_id(&job_id.to_string()).await? {
                if job.status.is_terminal() {
                    return Ok(());
                }
            } else {
                return Ok(());
            }
            if self.time_provider.now_millis() >= deadline {
                break;
            }
            sleep(std::time::Duration::from_millis(50)).await;
        }

        warn!(job_id, "preempt grace window elapsed, forcing CANCELLED");
        if let Some(mut job) = self.job_repo.find_by_id(&job_id.to_string()).await? {
            if !job.status.is_terminal() {
                job.cancel(self.time_provider.now_millis())?;
                self.job_repo.update(&job).await?;
            }
        }
        Ok(())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker task panicked with a non-string payload".to_string()
    }
}
