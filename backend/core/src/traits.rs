use async_trait::async_trait;
use serde::Serialize;

use crate::error::ColdMailError;
use crate::message::Message;

/// Trait for text-generation backends used by the chat and email pipelines.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Provider name (e.g., "ollama", "openai-compatible").
    fn name(&self) -> &str;

    /// Names of models the endpoint reports as installed. Empty on any failure.
    async fn available_models(&self) -> Vec<String>;

    /// Multi-turn chat completion.
    async fn chat(&self, request: &InferenceRequest) -> Result<InferenceResponse, ColdMailError>;

    /// Single-shot completion of one prompt.
    async fn generate(&self, request: &GenerateRequest)
        -> Result<InferenceResponse, ColdMailError>;

    /// Reachability probe of the discovery endpoint.
    async fn health(&self) -> ProviderHealth;
}

/// Chat request to an inference provider.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Single-shot request to an inference provider.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an inference provider.
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProviderHealth {
    pub ok: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub models: Vec<String>,
}
