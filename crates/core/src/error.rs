// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Checkpoint contention exhausted retries for job {0}")]
    CheckpointContention(String),

    #[error("Corrupt checkpoint blob for job {0}: {1}")]
    CorruptCheckpoint(String, String),

    #[error("Restart budget exhausted for job {0}")]
    RestartBudgetExhausted(String),

    #[error("Model error: {0}")]
    Model(#[from] crate::port::ModelError),

    #[error("Compute runtime error: {0}")]
    Compute(#[from] crate::port::ComputeError),

    #[error("Blob store error: {0}")]
    Blob(#[from] crate::port::BlobStoreError),

    #[error("Metadata store error: {0}")]
    Metadata(#[from] crate::port::MetadataStoreError),

    #[error("Seed data error: {0}")]
    SeedData(#[from] crate::port::SeedDataError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// From implementations for infra crates (to avoid circular dependency)
impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Database(err)
    }
}

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)
