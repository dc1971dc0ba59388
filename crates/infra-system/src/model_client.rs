// HTTP Model Client — invokes a foundation-model provider over HTTP (§4.5).
//
// The core treats the model provider as an abstract collaborator; this
// adapter is one concrete binding, built against a generic "chat completion"
// style JSON endpoint. The tier -> concrete model id mapping is a
// configuration table passed in at construction (§6), never wired into core.

use async_trait::async_trait;
use plotpalette_core::port::{ModelClient, ModelError, ModelResponse};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Per-tier endpoint configuration: which model id a tier resolves to, and
/// the hard per-call deadline (§5, default 60s).
#[derive(Debug, Clone)]
pub struct TierEndpoint {
    pub model_id: String,
    pub timeout: Duration,
}

/// HTTP-backed `ModelClient`. Speaks a minimal JSON request/response
/// contract against `base_url/v1/generate`; a real deployment would swap
/// this for the provider's actual wire format behind the same trait.
pub struct HttpModelClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    tiers: BTreeMap<String, TierEndpoint>,
}

impl HttpModelClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        tiers: BTreeMap<String, TierEndpoint>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            tiers,
        }
    }

    fn endpoint_for(&self, tier: &str) -> Result<&TierEndpoint, ModelError> {
        self.tiers
            .get(tier)
            .ok_or_else(|| ModelError::Unrecoverable(format!("unknown model tier '{tier}'")))
    }
}

#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    required_schema_fields: &'a [String],
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    output: serde_json::Value,
    input_tokens: i64,
    output_tokens: i64,
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn generate(
        &self,
        tier: &str,
        prompt: &str,
        required_schema_fields: &[String],
    ) -> Result<ModelResponse, ModelError> {
        let endpoint = self.endpoint_for(tier)?;

        let mut request = self
            .client
            .post(format!("{}/v1/generate", self.base_url))
            .timeout(endpoint.timeout)
            .json(&GenerateRequest {
                model: &endpoint.model_id,
                prompt,
                required_schema_fields,
            });

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(endpoint.timeout.as_millis() as i64)
            } else {
                ModelError::Transient(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::OK => response
                .json::<GenerateResponse>()
                .await
                .map(|body| ModelResponse {
                    output: body.output,
                    input_tokens: body.input_tokens,
                    output_tokens: body.output_tokens,
                })
                .map_err(|e| ModelError::Transient(format!("malformed response body: {e}"))),
            StatusCode::TOO_MANY_REQUESTS => Err(ModelError::RateLimited),
            status if status.is_server_error() => {
                Err(ModelError::Transient(format!("provider returned {status}")))
            }
            status => {
                warn!(%status, tier, "model provider rejected request as unrecoverable");
                Err(ModelError::Unrecoverable(format!(
                    "provider returned {status}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tier_is_unrecoverable() {
        let client = HttpModelClient::new("http://localhost", None, BTreeMap::new());
        let err = client.endpoint_for("tier-9").unwrap_err();
        assert!(matches!(err, ModelError::Unrecoverable(_)));
    }
}
