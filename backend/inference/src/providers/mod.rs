pub mod mock;
pub mod ollama;
pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use coldmail_core::{ColdMailError, InferenceProvider};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::config::{InferenceConfig, Protocol};

/// Model discovery is bounded; a slow endpoint degrades to "no models".
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);
/// Health probes are bounded tighter than discovery.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
/// Transport-level ceiling for inference calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Builds a provider for a resolved endpoint configuration.
///
/// Configuration is resolved per workspace, so providers are built per request.
pub trait ProviderFactory: Send + Sync {
    fn connect(&self, config: &InferenceConfig) -> Arc<dyn InferenceProvider>;
}

/// Factory for the real HTTP providers. Shares one connection pool.
#[derive(Clone)]
pub struct HttpProviderFactory {
    client: Client,
}

impl HttpProviderFactory {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for HttpProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn connect(&self, config: &InferenceConfig) -> Arc<dyn InferenceProvider> {
        match config.protocol {
            Protocol::Native => Arc::new(ollama::OllamaProvider::new(
                self.client.clone(),
                config.base_url.clone(),
            )),
            Protocol::OpenAiCompatible => Arc::new(openai_compat::OpenAiCompatProvider::new(
                self.client.clone(),
                config.base_url.clone(),
                config.api_key.clone(),
            )),
        }
    }
}

/// Check the status and decode a JSON body, mapping failures to `Upstream`.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    provider: &str,
    response: Response,
) -> Result<T, ColdMailError> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(ColdMailError::upstream(
            provider,
            format!("returned {status}: {error_body}"),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| ColdMailError::upstream(provider, format!("failed to parse response: {e}")))
}

pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> ColdMailError {
    ColdMailError::upstream(provider, format!("HTTP request failed: {err}"))
}
