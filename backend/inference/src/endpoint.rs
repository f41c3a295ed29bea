//! A connected inference endpoint with its model already chosen.

use std::sync::Arc;

use coldmail_core::{
    ColdMailError, GenerateRequest, InferenceProvider, InferenceRequest, InferenceResponse,
    Message, ProviderHealth,
};
use tracing::{debug, info, warn};

use crate::config::InferenceConfig;
use crate::providers::ProviderFactory;
use crate::selection::select_model;

/// One workspace's view of the inference service for the duration of a request.
///
/// Model discovery runs once in [`Endpoint::connect`]; every call after that
/// uses the selected model.
#[derive(Clone)]
pub struct Endpoint {
    provider: Arc<dyn InferenceProvider>,
    config: InferenceConfig,
    model: String,
}

impl Endpoint {
    /// Build the provider for `config` and pick a model from what it reports.
    pub async fn connect(factory: &dyn ProviderFactory, config: InferenceConfig) -> Self {
        let provider = factory.connect(&config);
        let available = provider.available_models().await;
        let model = select_model(&config.model, &available);

        if available.is_empty() {
            warn!(
                provider = %provider.name(),
                base_url = %config.base_url,
                model = %model,
                "No models discovered, using configured model"
            );
        } else {
            debug!(
                provider = %provider.name(),
                discovered = available.len(),
                model = %model,
                "Model selected"
            );
        }

        Self {
            provider,
            config,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Multi-turn completion over `messages`.
    pub async fn chat(&self, messages: Vec<Message>) -> Result<InferenceResponse, ColdMailError> {
        let request = InferenceRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self.provider.chat(&request).await;
        if let Ok(response) = &response {
            info!(
                provider = %response.provider,
                model = %response.model,
                latency_ms = response.latency_ms,
                "Chat completion received"
            );
        }
        response
    }

    /// Single-shot completion of `prompt`.
    pub async fn generate(&self, prompt: impl Into<String>) -> Result<InferenceResponse, ColdMailError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        self.provider.generate(&request).await
    }

    pub async fn health(&self) -> ProviderHealth {
        self.provider.health().await
    }
}
