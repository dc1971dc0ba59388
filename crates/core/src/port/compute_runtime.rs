// Compute Runtime Port — where a worker's generation loop actually executes (§3, §4.2)

use async_trait::async_trait;
use thiserror::Error;
use std::future::Future;
use std::pin::Pin;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("worker task panicked: {0}")]
    Panicked(String),

    #[error("worker task was cancelled")]
    Cancelled,
}

pub type BoxedUnitFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs a generation worker's loop to completion, isolating panics so one
/// worker task crashing never takes the dispatcher down with it (§4.2,
/// the same panic-guard discipline used for subprocess-backed workers).
#[async_trait]
pub trait ComputeRuntime: Send + Sync {
    async fn spawn(&self, task: BoxedUnitFuture) -> Result<(), ComputeError>;
}
