// Domain Layer - Pure business logic and entities

pub mod checkpoint;
pub mod cost;
pub mod error;
pub mod job;
pub mod money;
pub mod template;

// Re-exports
pub use checkpoint::{BlobTag, CheckpointBlob, CheckpointMetadata};
pub use cost::{CostEvent, CostEventKind, RateTable, TierRate};
pub use error::DomainError;
pub use job::{
    ExportFormat, Job, JobId, JobPayload, JobStatus, OwnerId, SeedLocator, StatusReason,
    TemplateId, TemplateVersion,
};
pub use money::{Micros, Tolerance};
pub use template::{Template, TemplateStep, Tier};
