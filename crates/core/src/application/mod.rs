// Application Layer - Use Cases and Business Logic

pub mod backoff;
pub mod checkpoint;
pub mod cost;
pub mod dispatcher;
pub mod export;
pub mod job_service;
pub mod maintenance;
pub mod recovery;
pub mod render;
pub mod worker;

// Re-exports
pub use checkpoint::CheckpointEngine;
pub use cost::{BudgetGuard, CostTracker};
pub use dispatcher::Dispatcher;
pub use export::ExportAssembler;
pub use job_service::JobService;
pub use maintenance::MaintenanceScheduler;
pub use recovery::RecoveryService;
pub use worker::{shutdown_channel, GenerationWorker, ShutdownSender, ShutdownToken, WorkerOutcome};
