// Port Layer - Interfaces for external dependencies

pub mod blob_store;
pub mod compute_runtime;
pub mod cost_event_store;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod maintenance;
pub mod metadata_store;
pub mod model_client;
pub mod seed_data_source;
pub mod template_store;
pub mod time_provider;

// Re-exports
pub use blob_store::{BlobStore, BlobStoreError};
pub use compute_runtime::{ComputeError, ComputeRuntime};
pub use cost_event_store::CostEventStore;
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats};
pub use metadata_store::{MetadataStore, MetadataStoreError};
pub use model_client::{ModelClient, ModelError, ModelResponse};
pub use seed_data_source::{SeedDataError, SeedDataSource};
pub use template_store::TemplateStore;
pub use time_provider::TimeProvider;
