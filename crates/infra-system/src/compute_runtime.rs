// Tokio Compute Runtime — executes worker tasks with panic isolation (§4.2).

use async_trait::async_trait;
use futures::FutureExt;
use plotpalette_core::port::compute_runtime::{BoxedUnitFuture, ComputeError, ComputeRuntime};
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Submits worker tasks to the Tokio runtime's thread pool. `spawn` returns
/// as soon as the task is queued — it does not wait for the worker to
/// finish, so the dispatcher can run many jobs concurrently without one
/// slow worker blocking the claim loop.
///
/// A panicking worker is caught with `catch_unwind` inside the spawned task
/// rather than propagated: Tokio already isolates a panicking task from the
/// rest of the runtime, but without `catch_unwind` the panic would only
/// surface as a silent `JoinError` nobody awaits. We log it here instead.
pub struct TokioComputeRuntime;

impl TokioComputeRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioComputeRuntime {
    fn default() -> Self {
        Self::new()
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

#[async_trait]
impl ComputeRuntime for TokioComputeRuntime {
    async fn spawn(&self, task: BoxedUnitFuture) -> Result<(), ComputeError> {
        tokio::spawn(async move {
            if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
                error!(
                    error = %panic_message(payload),
                    "worker task panicked; isolated by compute runtime"
                );
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn spawn_runs_the_task() {
        let runtime = TokioComputeRuntime::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        runtime
            .spawn(Box::pin(async move {
                ran_clone.store(true, Ordering::SeqCst);
            }))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn spawn_isolates_a_panicking_task() {
        let runtime = TokioComputeRuntime::new();
        let ran_after = Arc::new(AtomicBool::new(false));
        let ran_after_clone = Arc::clone(&ran_after);

        runtime
            .spawn(Box::pin(async move {
                panic!("boom");
            }))
            .await
            .unwrap();

        runtime
            .spawn(Box::pin(async move {
                ran_after_clone.store(true, Ordering::SeqCst);
            }))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ran_after.load(Ordering::SeqCst));
    }
}
