// Model Client Port — abstraction over foundation-model invocation (§3, §4.2)
//
// Replaces the subprocess-shaped TaskExecutor the local dev-task runner used:
// a generation worker's unit of work is a prompt/response round trip against
// a tiered foundation model, not a child process.

use async_trait::async_trait;
use thiserror::Error;

/// A single model invocation's result.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub output: serde_json::Value,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// Errors a model call can fail with. The worker treats `Unrecoverable` as
/// terminal (§4.1 `model-unrecoverable`) and everything else as retryable
/// subject to the restart-budget backoff policy (§4.5).
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model request timed out after {0}ms")]
    Timeout(i64),

    #[error("model provider rate limited the request")]
    RateLimited,

    #[error("transient model provider error: {0}")]
    Transient(String),

    #[error("model call is unrecoverable: {0}")]
    Unrecoverable(String),
}

/// Invokes a tiered foundation model with a rendered prompt.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run `prompt` against the model mapped to `tier`, validating the
    /// response against `required_schema_fields` before returning it.
    async fn generate(
        &self,
        tier: &str,
        prompt: &str,
        required_schema_fields: &[String],
    ) -> Result<ModelResponse, ModelError>;
}

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Success { output: serde_json::Value, input_tokens: i64, output_tokens: i64 },
        Transient(String),
        Unrecoverable(String),
        Panic(String),
    }

    pub struct MockModelClient {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockModelClient {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn new_success(output: serde_json::Value, input_tokens: i64, output_tokens: i64) -> Self {
            Self::new(MockBehavior::Success { output, input_tokens, output_tokens })
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModelClient for MockModelClient {
        async fn generate(
            &self,
            _tier: &str,
            _prompt: &str,
            _required_schema_fields: &[String],
        ) -> Result<ModelResponse, ModelError> {
            *self.call_count.lock().unwrap() += 1;
            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Success { output, input_tokens, output_tokens } => {
                    Ok(ModelResponse { output, input_tokens, output_tokens })
                }
                MockBehavior::Transient(msg) => Err(ModelError::Transient(msg)),
                MockBehavior::Unrecoverable(msg) => Err(ModelError::Unrecoverable(msg)),
                MockBehavior::Panic(msg) => panic!("{}", msg),
            }
        }
    }
}
