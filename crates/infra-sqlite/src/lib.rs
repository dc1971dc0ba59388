// Plot Palette Infrastructure - SQLite Adapter
// Implements: JobRepository, MetadataStore, BlobStore, CostEventStore,
// TemplateStore, Maintenance.

mod blob_store;
mod connection;
mod cost_event_store;
mod job_repository;
mod maintenance_impl;
mod metadata_store;
mod migration;
mod template_store;

pub use blob_store::SqliteBlobStore;
pub use connection::create_pool;
pub use cost_event_store::SqliteCostEventStore;
pub use job_repository::SqliteJobRepository;
pub use maintenance_impl::SqliteMaintenance;
pub use metadata_store::SqliteMetadataStore;
pub use migration::run_migrations;
pub use template_store::SqliteTemplateStore;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
