use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use coldmail_core::{
    ColdMailError, GenerateRequest, InferenceProvider, InferenceRequest, InferenceResponse,
    Message, ProviderHealth,
};

use super::{decode_json, transport_error, DISCOVERY_TIMEOUT, HEALTH_TIMEOUT};

const PROVIDER: &str = "ollama";

/// Ollama-native provider (`/api/chat`, `/api/generate`, `/api/tags`).
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[async_trait]
impl InferenceProvider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn available_models(&self) -> Vec<String> {
        let result = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "Ollama model discovery returned an error");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Ollama model discovery failed");
                return Vec::new();
            }
        };

        match response.json::<OllamaTags>().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to parse Ollama model list");
                Vec::new()
            }
        }
    }

    async fn chat(&self, request: &InferenceRequest) -> Result<InferenceResponse, ColdMailError> {
        let start = Instant::now();

        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        debug!(model = %request.model, messages = request.messages.len(), "Sending chat to Ollama");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let chat: OllamaChatResponse = decode_json(PROVIDER, response).await?;

        Ok(InferenceResponse {
            content: chat.message.content,
            provider: PROVIDER.to_string(),
            model: request.model.clone(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<InferenceResponse, ColdMailError> {
        let start = Instant::now();

        let body = OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        debug!(model = %request.model, "Sending generate to Ollama");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let generated: OllamaGenerateResponse = decode_json(PROVIDER, response).await?;

        Ok(InferenceResponse {
            content: generated.response,
            provider: PROVIDER.to_string(),
            model: request.model.clone(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn health(&self) -> ProviderHealth {
        let result = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                let models = if status.is_success() {
                    response
                        .json::<OllamaTags>()
                        .await
                        .map(|t| t.models.into_iter().map(|m| m.name).collect())
                        .unwrap_or_default()
                } else {
                    Vec::new()
                };
                ProviderHealth {
                    ok: status.is_success(),
                    status: Some(status.as_u16()),
                    error: None,
                    models,
                }
            }
            Err(e) => ProviderHealth {
                ok: false,
                status: None,
                error: Some(e.to_string()),
                models: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_chat_wire_format() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let app = Router::new().route(
            "/api/chat",
            post(move |Json(body): Json<Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({"message": {"role": "assistant", "content": "hello there"}}))
                }
            }),
        );
        let base = spawn(app).await;
        let provider = OllamaProvider::new(Client::new(), base);

        let response = provider
            .chat(&InferenceRequest {
                model: "llama3.2".into(),
                messages: vec![Message::system("be brief"), Message::user("hi")],
                max_tokens: 64,
                temperature: 0.2,
            })
            .await
            .unwrap();

        assert_eq!(response.content, "hello there");
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body["options"]["temperature"].is_number());
    }

    #[tokio::test]
    async fn test_generate_reads_response_field() {
        let app = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["prompt"], "write a subject line");
                Json(json!({"response": "Quick question", "done": true}))
            }),
        );
        let provider = OllamaProvider::new(Client::new(), spawn(app).await);

        let response = provider
            .generate(&GenerateRequest {
                model: "llama3.2".into(),
                prompt: "write a subject line".into(),
                max_tokens: 64,
                temperature: 0.7,
            })
            .await
            .unwrap();
        assert_eq!(response.content, "Quick question");
    }

    #[tokio::test]
    async fn test_discovery_lists_model_names() {
        let app = Router::new().route(
            "/api/tags",
            get(|| async {
                Json(json!({"models": [{"name": "llama3.2:latest"}, {"name": "mistral:7b"}]}))
            }),
        );
        let provider = OllamaProvider::new(Client::new(), spawn(app).await);
        assert_eq!(
            provider.available_models().await,
            vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let provider = OllamaProvider::new(Client::new(), closed_port().await);

        assert!(provider.available_models().await.is_empty());
        assert!(!provider.health().await.ok);

        let err = provider
            .chat(&InferenceRequest {
                model: "foo".into(),
                messages: vec![Message::user("hi")],
                max_tokens: 16,
                temperature: 0.7,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ColdMailError::Upstream { ref provider, .. } if provider == "ollama"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async { (axum::http::StatusCode::NOT_FOUND, "model 'foo' not found") }),
        );
        let provider = OllamaProvider::new(Client::new(), spawn(app).await);
        let err = provider
            .chat(&InferenceRequest {
                model: "foo".into(),
                messages: vec![Message::user("hi")],
                max_tokens: 16,
                temperature: 0.7,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
