// Generation Worker — renders templates, invokes the model, accumulates
// records, and persists checkpoints for a single job (§4.2).

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::backoff::BackoffPolicy;
use crate::application::checkpoint::CheckpointEngine;
use crate::application::cost::{BudgetGuard, CostTracker};
use crate::application::export::ExportAssembler;
use crate::application::render::{render_prompt, validate_schema};
use crate::domain::{CheckpointBlob, CheckpointMetadata, Job, Micros, StatusReason, Template};
use crate::error::{AppError, Result};
use crate::port::{ModelClient, ModelError, SeedDataSource, TemplateStore, TimeProvider};
use constants::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

/// How a worker run ended. The worker never writes job status itself
/// (ownership split in §3); the dispatcher maps this outcome to a
/// transition.
#[derive(Debug)]
pub enum WorkerOutcome {
    Completed,
    BudgetExceeded { detail: String },
    Preempted { records_generated: i64 },
    Failed { reason: StatusReason, detail: String },
}

pub struct WorkerConfig {
    pub checkpoint_interval: i64,
    pub model_call_retries: u32,
    pub validation_repair_attempts: u32,
    pub preempt_grace_ms: i64,
    pub max_input_tokens_per_call: i64,
    pub max_output_tokens_per_call: i64,
    pub backoff: BackoffPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            model_call_retries: DEFAULT_MODEL_CALL_RETRIES,
            validation_repair_attempts: DEFAULT_VALIDATION_REPAIR_ATTEMPTS,
            preempt_grace_ms: DEFAULT_PREEMPT_GRACE_MS,
            max_input_tokens_per_call: 2000,
            max_output_tokens_per_call: 1000,
            backoff: BackoffPolicy::default(),
        }
    }
}

pub struct GenerationWorker {
    checkpoint_engine: Arc<CheckpointEngine>,
    cost_tracker: Arc<CostTracker>,
    budget_guard: Arc<BudgetGuard>,
    model_client: Arc<dyn ModelClient>,
    template_store: Arc<dyn TemplateStore>,
    seed_source: Arc<dyn SeedDataSource>,
    export: Arc<ExportAssembler>,
    time_provider: Arc<dyn TimeProvider>,
    config: WorkerConfig,
}

impl GenerationWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checkpoint_engine: Arc<CheckpointEngine>,
        cost_tracker: Arc<CostTracker>,
        budget_guard: Arc<BudgetGuard>,
        model_client: Arc<dyn ModelClient>,
        template_store: Arc<dyn TemplateStore>,
        seed_source: Arc<dyn SeedDataSource>,
        export: Arc<ExportAssembler>,
        time_provider: Arc<dyn TimeProvider>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            checkpoint_engine,
            cost_tracker,
            budget_guard,
            model_client,
            template_store,
            seed_source,
            export,
            time_provider,
            config,
        }
    }

    /// Single public operation: run the job to completion, budget violation,
    /// preemption, or fatal error (§4.2).
    pub async fn run(&self, job: &Job, mut shutdown: ShutdownToken) -> Result<WorkerOutcome> {
        let template = self
            .template_store
            .get(&job.template_id, job.template_version)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("template {}", job.template_id)))?;

        let resumed = self.checkpoint_engine.resume(&job.id).await?;
        let (mut meta, mut state) = match resumed {
            Some(outcome) => (outcome.metadata, outcome.blob),
            None => (
                CheckpointMetadata::initial(&job.id),
                CheckpointBlob::initial(seed_rng(&job.id)),
            ),
        };

        if state.completed {
            return Ok(WorkerOutcome::Completed);
        }

        let most_expensive_tier = most_expensive_tier(&template, &self.budget_guard);
        let mut last_batch_index: i64 = -1;

        loop {
            if shutdown.is_shutdown() {
                return self.preempt(job, &meta, state).await;
            }

            if state.records_generated >= job.target_record_count {
                break;
            }

            let remaining_in_batch =
                self.config.checkpoint_interval - (state.partial_batch_records.len() as i64);
            let batch_size = remaining_in_batch
                .max(1)
                .min(job.target_record_count - state.records_generated);

            if let Some(tier) = &most_expensive_tier {
                let projected = self
                    .budget_guard
                    .project_batch_cost(
                        batch_size,
                        self.config.max_input_tokens_per_call,
                        self.config.max_output_tokens_per_call,
                        tier,
                    )
                    .unwrap_or(Micros::ZERO);

                if !self
                    .budget_guard
                    .allows(job.cost_accumulated.max(state.cost_accumulated), projected, job.budget_limit)
                {
                    return Ok(WorkerOutcome::BudgetExceeded {
                        detail: "projected batch cost exceeds remaining budget".to_string(),
                    });
                }
            }

            match self
                .process_one_record(job, &template, &mut state, shutdown.clone())
                .await?
            {
                RecordOutcome::Produced => {}
                RecordOutcome::Rejected => {}
                RecordOutcome::Fatal(reason, detail) => {
                    return Ok(WorkerOutcome::Failed { reason, detail });
                }
                RecordOutcome::Preempted => {
                    return self.preempt(job, &meta, state).await;
                }
            }

            if state.partial_batch_records.len() as i64 >= self.config.checkpoint_interval
                || state.records_generated >= job.target_record_count
            {
                let batch_index = meta.version; // batches are 1:1 with the commit they ride in on
                self.export
                    .write_batch(&job.id, batch_index, &state.partial_batch_records)
                    .await?;
                state.partial_batch_records.clear();
                state.last_completed_batch_index = batch_index;
                last_batch_index = batch_index;

                let outcome = self.checkpoint_engine.commit(&job.id, &meta, state.clone()).await?;
                meta = outcome.metadata;
                state = outcome.blob;
            }
        }

        state.completed = true;
        if !state.partial_batch_records.is_empty() {
            let batch_index = meta.version;
            self.export
                .write_batch(&job.id, batch_index, &state.partial_batch_records)
                .await?;
            state.partial_batch_records.clear();
            state.last_completed_batch_index = batch_index;
            last_batch_index = batch_index;
        }
        self.checkpoint_engine.commit(&job.id, &meta, state.clone()).await?;

        self.export
            .finalize(&job.id, last_batch_index, job.output_format)
            .await?;

        Ok(WorkerOutcome::Completed)
    }

    /// §4.2 step 4: flush a final checkpoint within the grace window.
    async fn preempt(
        &self,
        job: &Job,
        meta: &CheckpointMetadata,
        state: CheckpointBlob,
    ) -> Result<WorkerOutcome> {
        info!(job_id = %job.id, "preemption signalled, flushing checkpoint");
        let grace_deadline = self.time_provider.now_millis() + self.config.preempt_grace_ms;

        let flush = self.checkpoint_engine.commit(&job.id, meta, state);
        tokio::select! {
            result = flush => {
                let outcome = result?;
                Ok(WorkerOutcome::Preempted { records_generated: outcome.blob.records_generated })
            }
            _ = sleep(std::time::Duration::from_millis(
                (grace_deadline - self.time_provider.now_millis()).max(0) as u64,
            )) => {
                warn!(job_id = %job.id, "preemption flush exceeded grace window, abandoning partial batch");
                Ok(WorkerOutcome::Preempted { records_generated: meta.records_generated })
            }
        }
    }

    async fn process_one_record(
        &self,
        job: &Job,
        template: &Template,
        state: &mut CheckpointBlob,
        mut shutdown: ShutdownToken,
    ) -> Result<RecordOutcome> {
        let attempt_index = state.records_generated + state.records_rejected;
        let seed_len = self.seed_source.len(&job.seed_locator).await?;
        if seed_len == 0 {
            return Ok(RecordOutcome::Fatal(
                StatusReason::TemplateRenderError,
                "seed data source is empty".to_string(),
            ));
        }
        // Seed rows are sampled and may legitimately repeat across attempts
        // (e.g. a 10-row source serving a 100-record target); uniqueness is
        // tracked per attempt below, not per seed row.
        let row_index = seed_row_index(state.rng_seed, attempt_index, seed_len);
        let seed_row = self.seed_source.read_at(&job.seed_locator, row_index).await?;

        let mut outputs: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        let mut input_tokens_total = 0i64;
        let mut output_tokens_total = 0i64;

        for step in &template.steps {
            if shutdown.is_shutdown() {
                return Ok(RecordOutcome::Preempted);
            }

            let prompt = render_prompt(&step.prompt_source, &seed_row, &outputs);

            let mut last_err = None;
            let mut response = None;
            for attempt in 0..=self.config.model_call_retries {
                match self
                    .model_client
                    .generate(&step.tier, &prompt, &step.required_schema_fields)
                    .await
                {
                    Ok(r) => {
                        response = Some(r);
                        break;
                    }
                    Err(ModelError::Unrecoverable(msg)) => {
                        return Ok(RecordOutcome::Fatal(StatusReason::ModelUnrecoverable, msg));
                    }
                    Err(e) => {
                        let is_quota = matches!(e, ModelError::RateLimited);
                        last_err = Some(e);
                        if attempt < self.config.model_call_retries {
                            let delay = if is_quota {
                                self.config.backoff.delay_ms_for_quota(attempt, &job.id)
                            } else {
                                self.config.backoff.delay_ms(attempt, &job.id)
                            };
                            sleep(std::time::Duration::from_millis(delay as u64)).await;
                        }
                    }
                }
            }

            let response = match response {
                Some(r) => r,
                None => {
                    warn!(
                        job_id = %job.id,
                        step_id = %step.step_id,
                        error = ?last_err,
                        "model call retries exhausted, dropping record"
                    );
                    state.records_rejected += 1;
                    state.completed_record_indices.insert(attempt_index);
                    return Ok(RecordOutcome::Rejected);
                }
            };

            // Local repair re-invokes the model up to `validation_repair_attempts`
            // times with the same prompt before giving up on this step (§4.2 2d).
            let mut response = response;
            let mut repair_attempts_left = self.config.validation_repair_attempts;
            while !validate_schema(&response.output, &step.required_schema_fields)
                && repair_attempts_left > 0
            {
                repair_attempts_left -= 1;
                response = match self
                    .model_client
                    .generate(&step.tier, &prompt, &step.required_schema_fields)
                    .await
                {
                    Ok(r) => r,
                    Err(_) => break,
                };
            }

            if !validate_schema(&response.output, &step.required_schema_fields) {
                state.records_rejected += 1;
                state.completed_record_indices.insert(attempt_index);
                return Ok(RecordOutcome::Rejected);
            }

            input_tokens_total += response.input_tokens;
            output_tokens_total += response.output_tokens;

            let rate = self.budget_guard.rate_for(&step.tier);
            let call_cost = rate
                .map(|r| r.cost_of(response.input_tokens, response.output_tokens))
                .unwrap_or(Micros::ZERO);

            state.tokens_used += response.input_tokens + response.output_tokens;
            state.cost_accumulated = state.cost_accumulated.saturating_add(call_cost);

            // §3: cost events are keyed by (job_id, monotonic sequence), not
            // by record — a multi-step template appends one event per step,
            // so the sequence must tick per event rather than per record.
            let seq = state.cost_event_seq;
            state.cost_event_seq += 1;
            let event = self.cost_tracker.model_call_event(
                &job.id,
                seq,
                &step.tier,
                response.input_tokens,
                response.output_tokens,
                call_cost,
            );
            self.cost_tracker.try_record(&event).await;

            outputs.insert(step.step_id.clone(), response.output);
        }

        let _ = (input_tokens_total, output_tokens_total);

        let record = serde_json::Value::Object(outputs.into_iter().collect());
        state.partial_batch_records.push(record);
        state.records_generated += 1;
        state.completed_record_indices.insert(attempt_index);

        Ok(RecordOutcome::Produced)
    }
}

enum RecordOutcome {
    Produced,
    Rejected,
    Fatal(StatusReason, String),
    Preempted,
}

/// Deterministic per-job RNG seed, derived from the job id so two resumes
/// of the same job draw the same sequence (§4.2 step 1, §8 idempotence law).
fn seed_rng(job_id: &str) -> u64 {
    job_id.bytes().fold(0xcbf29ce484222325u64, |acc, b| {
        (acc ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

/// Maps a logical attempt counter to a seed-row index, mixing in the
/// job's RNG seed so the sequence is reproducible but not merely
/// sequential (§4.2 step 2b).
fn seed_row_index(rng_seed: u64, attempt_index: i64, seed_len: i64) -> i64 {
    let mixed = rng_seed ^ (attempt_index as u64).wrapping_mul(0x9e3779b97f4a7c15);
    let scrambled = mixed.wrapping_mul(0xff51afd7ed558ccd);
    (scrambled % seed_len as u64) as i64
}

fn most_expensive_tier(template: &Template, budget_guard: &BudgetGuard) -> Option<String> {
    template
        .steps
        .iter()
        .map(|s| s.tier.clone())
        .filter_map(|tier| {
            budget_guard
                .rate_for(&tier)
                .map(|rate| (tier, rate.cost_of(1, 1)))
        })
        .max_by_key(|(_, cost)| *cost)
        .map(|(tier, _)| tier)
}
