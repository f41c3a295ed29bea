use std::fmt;

use anyhow::{Context, Result};
use coldmail_inference::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use coldmail_inference::{InferenceConfig, Protocol};

/// ColdMail runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// SQLite database path
    pub db_path: String,
    /// Directory for rolling NDJSON logs; console only when unset
    pub log_dir: Option<String>,
    /// Log level
    pub log_level: String,
    /// Inference defaults, overridable per workspace
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub ollama_api_key: Option<String>,
    /// Forces the wire protocol instead of inferring it from the base URL
    pub inference_protocol: Option<Protocol>,
    pub paystack_secret_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            db_path: "coldmail.db".to_string(),
            log_dir: None,
            log_level: "info".to_string(),
            ollama_base_url: DEFAULT_BASE_URL.to_string(),
            ollama_model: DEFAULT_MODEL.to_string(),
            ollama_api_key: None,
            inference_protocol: None,
            paystack_secret_key: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let inference_protocol = get("INFERENCE_PROTOCOL")
            .map(|p| p.parse::<Protocol>())
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("Invalid INFERENCE_PROTOCOL")?;

        Ok(Self {
            bind_address: get("COLDMAIL_BIND").unwrap_or(defaults.bind_address),
            port: get("COLDMAIL_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            db_path: get("COLDMAIL_DB").unwrap_or(defaults.db_path),
            log_dir: get("COLDMAIL_LOG_DIR"),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            ollama_base_url: get("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            ollama_model: get("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            ollama_api_key: get("OLLAMA_API_KEY"),
            inference_protocol,
            paystack_secret_key: get("PAYSTACK_SECRET_KEY"),
        })
    }

    /// Environment-level inference defaults.
    pub fn inference(&self) -> InferenceConfig {
        let config = InferenceConfig::new(&self.ollama_base_url, &self.ollama_model)
            .with_api_key(self.ollama_api_key.clone());
        match self.inference_protocol {
            Some(protocol) => config.with_protocol(protocol),
            None => config,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("db_path", &self.db_path)
            .field("log_dir", &self.log_dir)
            .field("log_level", &self.log_level)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("ollama_model", &self.ollama_model)
            .field("ollama_api_key", &redacted(&self.ollama_api_key))
            .field("inference_protocol", &self.inference_protocol)
            .field("paystack_secret_key", &redacted(&self.paystack_secret_key))
            .finish()
    }
}
