//! Plot Palette Worker - Main Entry Point
//!
//! Composition root (ADR-001): wires every port to its production adapter,
//! runs crash recovery, then starts the RPC server and the dispatcher loop
//! side by side until shutdown.

mod config;
mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::DaemonConfig;
use plotpalette_core::application::cost::BudgetGuard;
use plotpalette_core::application::dispatcher::DispatcherConfig;
use plotpalette_core::application::worker::{shutdown_channel, WorkerConfig};
use plotpalette_core::application::{
    CheckpointEngine, CostTracker, Dispatcher, ExportAssembler, GenerationWorker, JobService,
    MaintenanceScheduler, RecoveryService,
};
use plotpalette_core::domain::{RateTable, Tolerance};
use plotpalette_core::port::id_provider::UuidProvider;
use plotpalette_core::port::time_provider::SystemTimeProvider;
use plotpalette_core::port::MaintenanceConfig;
use plotpalette_infra_sqlite::{
    create_pool, run_migrations, SqliteBlobStore, SqliteCostEventStore, SqliteJobRepository,
    SqliteMaintenance, SqliteMetadataStore, SqliteTemplateStore,
};
use plotpalette_infra_system::{FileSeedDataSource, HttpModelClient, TokioComputeRuntime};
use plotpalette_rpc::{server::RpcServerConfig, RpcServer};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = DaemonConfig::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("plotpalette=info"))
        .expect("failed to build env filter");

    match cfg.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Plot Palette Worker v{} starting...", VERSION);

    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "failed to initialize OpenTelemetry (continuing without it)");
    }

    info!(db_path = %cfg.db_path, "initializing database");
    let pool = create_pool(&cfg.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("migration failed: {}", e))?;

    // Port adapters.
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);

    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));
    let metadata_store = Arc::new(SqliteMetadataStore::new(pool.clone()));
    let blob_store = Arc::new(SqliteBlobStore::new(pool.clone()));
    let cost_event_store = Arc::new(SqliteCostEventStore::new(pool.clone()));
    let template_store = Arc::new(SqliteTemplateStore::new(pool.clone()));
    let maintenance =
        Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));

    let compute_runtime = Arc::new(TokioComputeRuntime::new());
    let model_client = Arc::new(HttpModelClient::new(
        cfg.model_base_url.clone(),
        cfg.model_api_key.clone(),
        cfg.model_tiers.clone(),
    ));
    let seed_data_source = Arc::new(FileSeedDataSource::new());

    // Application services.
    let checkpoint_engine = Arc::new(CheckpointEngine::new(
        blob_store.clone(),
        metadata_store.clone(),
        time_provider.clone(),
    ));
    let cost_tracker = Arc::new(CostTracker::new(cost_event_store.clone(), time_provider.clone()));
    let rate_table = RateTable { tiers: cfg.rate_table.clone() };
    let budget_guard = Arc::new(BudgetGuard::new(rate_table, Tolerance::STRICT));
    let export_assembler = Arc::new(ExportAssembler::new(blob_store.clone()));

    let worker_config = WorkerConfig {
        preempt_grace_ms: cfg.preempt_grace_ms,
        ..WorkerConfig::default()
    };
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

    let dispatcher_config = DispatcherConfig {
        heartbeat_timeout_ms: cfg.heartbeat_timeout_ms,
        preempt_grace_ms: cfg.preempt_grace_ms,
        ..DispatcherConfig::default()
    };
    let dispatcher = Arc::new(Dispatcher::new(
        job_repo.clone(),
        metadata_store.clone(),
        compute_runtime,
        worker,
        time_provider.clone(),
        dispatcher_config,
    ));

    let job_service = Arc::new(JobService::new(
        job_repo.clone(),
        dispatcher.clone(),
        id_provider,
        time_provider.clone(),
    ));

    // Crash recovery: requeue RUNNING jobs whose heartbeat went stale before
    // this process existed.
    info!("running crash recovery");
    let recovery_service = RecoveryService::new(
        job_repo.clone(),
        metadata_store.clone(),
        time_provider.clone(),
        cfg.heartbeat_timeout_ms,
    );
    match recovery_service.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "crash recovery completed"),
        Err(e) => tracing::error!(error = ?e, "crash recovery failed"),
    }

    // RPC server.
    info!("starting JSON-RPC server");
    let rpc_config = RpcServerConfig {
        host: cfg.rpc_host.clone(),
        port: cfg.rpc_port,
        ..Default::default()
    };
    let rpc_server =
        RpcServer::new(rpc_config, job_service, job_repo, blob_store, maintenance.clone());
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // Dispatcher loop.
    info!("starting dispatcher");
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let dispatcher_handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.run(shutdown_rx).await;
        })
    };

    // Maintenance sweep.
    info!("starting maintenance scheduler");
    let maintenance_scheduler = MaintenanceScheduler::new(
        maintenance,
        MaintenanceConfig::default(),
        cfg.maintenance_interval_hours,
    );
    tokio::spawn(async move {
        maintenance_scheduler.run().await;
    });

    info!("system ready, waiting for jobs (Ctrl+C to shut down)");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, exiting gracefully");

    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), dispatcher_handle).await;

    info!("shutdown complete");
    Ok(())
}
