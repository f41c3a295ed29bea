//! Inference endpoint configuration.
//!
//! The wire protocol is decided once, when the config is built, and carried as
//! an explicit [`Protocol`] from then on.

use std::fmt;
use std::str::FromStr;

use coldmail_core::WorkspaceSettings;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// Ollama-style `/api/chat`, `/api/generate`, `/api/tags`.
    Native,
    /// `/chat/completions` and `/models` with bearer auth.
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
}

impl Protocol {
    /// Infer the protocol from a base URL: `/v1` or `openai` in the URL means
    /// an OpenAI-compatible server.
    pub fn detect(base_url: &str) -> Self {
        if base_url.contains("/v1") || base_url.contains("openai") {
            Protocol::OpenAiCompatible
        } else {
            Protocol::Native
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Native => f.write_str("native"),
            Protocol::OpenAiCompatible => f.write_str("openai-compatible"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "ollama" => Ok(Protocol::Native),
            "openai" | "openai-compatible" | "openai_compatible" => Ok(Protocol::OpenAiCompatible),
            other => Err(format!("unknown inference protocol: {other}")),
        }
    }
}

/// Everything needed to reach one inference endpoint.
#[derive(Clone, PartialEq)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub protocol: Protocol,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl InferenceConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = normalize_base_url(base_url.into());
        Self {
            protocol: Protocol::detect(&base_url),
            base_url,
            model: model.into(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Force a protocol instead of the one inferred from the base URL.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Apply a workspace's stored override on top of these defaults.
    ///
    /// A workspace that supplies its own base URL gets the protocol inferred
    /// from that URL; otherwise the default protocol is kept.
    pub fn resolve(&self, overrides: Option<&WorkspaceSettings>) -> Self {
        let Some(settings) = overrides else {
            return self.clone();
        };

        let mut resolved = self.clone();
        if let Some(url) = non_empty(&settings.base_url) {
            resolved.base_url = normalize_base_url(url.to_string());
            resolved.protocol = Protocol::detect(&resolved.base_url);
        }
        if let Some(model) = non_empty(&settings.model) {
            resolved.model = model.to_string();
        }
        if let Some(key) = non_empty(&settings.api_key) {
            resolved.api_key = Some(key.to_string());
        }
        resolved
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("protocol", &self.protocol)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
