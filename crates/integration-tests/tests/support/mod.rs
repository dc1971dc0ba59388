//! Shared fixtures for the Plot Palette end-to-end scenario tests.

use std::sync::Arc;
use std::time::Duration;

use plotpalette_core::application::cost::{BudgetGuard, CostTracker};
use plotpalette_core::application::dispatcher::DispatcherConfig;
use plotpalette_core::application::worker::WorkerConfig;
use plotpalette_core::application::{
    CheckpointEngine, Dispatcher, ExportAssembler, GenerationWorker, JobService,
};
use plotpalette_core::domain::{
    ExportFormat, Job, Micros, RateTable, Template, TemplateStep, TierRate, Tolerance,
};
use plotpalette_core::port::id_provider::UuidProvider;
use plotpalette_core::port::seed_data_source::mocks::InMemorySeedDataSource;
use plotpalette_core::port::template_store::mocks::InMemoryTemplateStore;
use plotpalette_core::port::time_provider::SystemTimeProvider;
use plotpalette_core::port::{
    BlobStore, IdProvider, JobRepository, MetadataStore, ModelClient, TimeProvider,
};
use plotpalette_infra_sqlite::{
    create_pool, run_migrations, SqliteBlobStore, SqliteCostEventStore, SqliteJobRepository,
    SqliteMaintenance, SqliteMetadataStore,
};
use plotpalette_infra_system::TokioComputeRuntime;
use sqlx::SqlitePool;

pub const TEMPLATE_ID: &str = "tmpl-customer-profile";
pub const TEMPLATE_VERSION: i64 = 1;
pub const SEED_LOCATOR: &str = "mem://customers";
pub const TIER: &str = "standard";

/// A single-step template: render the seed row's name into a prompt and
/// require the model response to carry a `summary` field.
pub fn one_step_template() -> Template {
    Template::new(
        TEMPLATE_ID,
        TEMPLATE_VERSION,
        vec![TemplateStep {
            step_id: "profile".to_string(),
            tier: TIER.to_string(),
            prompt_source: "Summarize {{seed.name}}".to_string(),
            required_schema_fields: vec!["summary".to_string()],
        }],
    )
}

pub fn seed_rows(n: usize) -> Vec<serde_json::Value> {
    (0..n).map(|i| serde_json::json!({"name": format!("customer-{i}")})).collect()
}

pub fn rate_table() -> RateTable {
    let mut tiers = std::collections::BTreeMap::new();
    tiers.insert(
        TIER.to_string(),
        TierRate {
            input_rate_per_million: Micros::from_dollars(1.0),
            output_rate_per_million: Micros::from_dollars(1.0),
        },
    );
    RateTable { tiers }
}

/// Fully wired test harness backed by an in-memory SQLite pool and stub
/// model/seed adapters, mirroring the daemon's composition root at a scale
/// suitable for a single scenario test.
pub struct Harness {
    pub pool: SqlitePool,
    pub job_repo: Arc<dyn JobRepository>,
    pub metadata_store: Arc<dyn MetadataStore>,
    pub blob_store: Arc<dyn BlobStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub id_provider: Arc<dyn IdProvider>,
}

impl Harness {
    pub async fn new(model_client: Arc<dyn ModelClient>, seed_row_count: usize) -> Self {
        Self::with_config(model_client, seed_row_count, WorkerConfig::default(), DispatcherConfig::default())
            .await
    }

    pub async fn with_config(
        model_client: Arc<dyn ModelClient>,
        seed_row_count: usize,
        worker_config: WorkerConfig,
        dispatcher_config: DispatcherConfig,
    ) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);

        let job_repo: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
        let metadata_store = Arc::new(SqliteMetadataStore::new(pool.clone()));
        let blob_store = Arc::new(SqliteBlobStore::new(pool.clone()));
        let cost_event_store = Arc::new(SqliteCostEventStore::new(pool.clone()));

        let template_store = Arc::new(InMemoryTemplateStore::new(one_step_template()));
        let seed_data_source =
            Arc::new(InMemorySeedDataSource::new(SEED_LOCATOR, seed_rows(seed_row_count)));

        let checkpoint_engine = Arc::new(CheckpointEngine::new(
            blob_store.clone(),
            metadata_store.clone(),
            time_provider.clone(),
        ));
        let cost_tracker = Arc::new(CostTracker::new(cost_event_store, time_provider.clone()));
        let budget_guard = Arc::new(BudgetGuard::new(rate_table(), Tolerance::STRICT));
        let export_blob_store = blob_store.clone();
        let export_assembler = Arc::new(ExportAssembler::new(blob_store));

        let worker = Arc::new(GenerationWorker::new(
            checkpoint_engine,
            cost_tracker,
            budget_guard,
            model_client,
            template_store,
            seed_data_source,
            export_assembler,
            time_provider.clone(),
            worker_config,
        ));

        let compute_runtime = Arc::new(TokioComputeRuntime::new());
        let dispatcher = Arc::new(Dispatcher::new(
            job_repo.clone(),
            metadata_store.clone(),
            compute_runtime,
            worker,
            time_provider.clone(),
            dispatcher_config,
        ));

        Self {
            pool,
            job_repo,
            metadata_store,
            blob_store: export_blob_store,
            dispatcher,
            time_provider,
            id_provider,
        }
    }

    pub fn job_service(&self) -> Arc<JobService> {
        Arc::new(JobService::new(
            self.job_repo.clone(),
            self.dispatcher.clone(),
            self.id_provider.clone(),
            self.time_provider.clone(),
        ))
    }

    pub fn maintenance(&self) -> Arc<SqliteMaintenance> {
        Arc::new(SqliteMaintenance::new(self.pool.clone(), self.time_provider.clone()))
    }

    pub fn new_job(&self, owner: &str, target_record_count: i64, budget_dollars: f64) -> Job {
        Job::new(
            self.id_provider.generate_id(),
            owner,
            self.time_provider.now_millis(),
            TEMPLATE_ID,
            TEMPLATE_VERSION,
            SEED_LOCATOR,
            target_record_count,
            Micros::from_dollars(budget_dollars),
            Tolerance::STRICT,
            ExportFormat::JsonLines,
            plotpalette_core::domain::JobPayload::new(serde_json::json!({})),
        )
    }
}

/// Poll `job_repo` until the job reaches a terminal status or `timeout` elapses.
pub async fn poll_until_terminal(
    job_repo: &Arc<dyn JobRepository>,
    job_id: &str,
    timeout: Duration,
) -> Job {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = job_repo.find_by_id(&job_id.to_string()).await.unwrap().unwrap();
        if job.status.is_terminal() {
            return job;
        }
        if tokio::time::Instant::now() >= deadline {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
