use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use coldmail_core::{
    ColdMailError, GenerateRequest, InferenceProvider, InferenceRequest, InferenceResponse,
    Message, ProviderHealth,
};

use super::{decode_json, transport_error, DISCOVERY_TIMEOUT, HEALTH_TIMEOUT};

const PROVIDER: &str = "openai-compatible";

/// Provider for any server speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<InferenceResponse, ColdMailError> {
        let start = Instant::now();

        let body = ChatRequest {
            model,
            messages,
            max_tokens,
            temperature,
            stream: false,
        };

        debug!(model = %model, messages = messages.len(), "Sending request to OpenAI-compatible endpoint");

        let response = self
            .authorize(self.client.post(format!("{}/chat/completions", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let chat: ChatResponse = decode_json(PROVIDER, response).await?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ColdMailError::upstream(PROVIDER, "response contained no choices"))?;

        Ok(InferenceResponse {
            content,
            provider: PROVIDER.to_string(),
            model: model.to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait]
impl InferenceProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn available_models(&self) -> Vec<String> {
        let result = self
            .authorize(self.client.get(format!("{}/models", self.base_url)))
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "Model discovery returned an error");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Model discovery failed");
                return Vec::new();
            }
        };

        match response.json::<ModelList>().await {
            Ok(list) => list.data.into_iter().map(|m| m.id).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to parse model list");
                Vec::new()
            }
        }
    }

    async fn chat(&self, request: &InferenceRequest) -> Result<InferenceResponse, ColdMailError> {
        self.complete(
            &request.model,
            &request.messages,
            request.max_tokens,
            request.temperature,
        )
        .await
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<InferenceResponse, ColdMailError> {
        let messages = [Message::user(request.prompt.clone())];
        self.complete(
            &request.model,
            &messages,
            request.max_tokens,
            request.temperature,
        )
        .await
    }

    async fn health(&self) -> ProviderHealth {
        let result = self
            .authorize(self.client.get(format!("{}/models", self.base_url)))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                let models = if status.is_success() {
                    response
                        .json::<ModelList>()
                        .await
                        .map(|l| l.data.into_iter().map(|m| m.id).collect())
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
    use axum::{
        http::HeaderMap,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn test_chat_sends_bearer_and_reads_first_choice() {
        let seen: Arc<Mutex<Option<(Option<String>, Value)>>> = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    *captured.lock().unwrap() = Some((auth, body));
                    Json(json!({
                        "choices": [
                            {"message": {"role": "assistant", "content": "first"}},
                            {"message": {"role": "assistant", "content": "second"}}
                        ]
                    }))
                }
            }),
        );
        let provider =
            OpenAiCompatProvider::new(Client::new(), spawn(app).await, Some("sk-test".into()));

        let response = provider
            .chat(&InferenceRequest {
                model: "gpt-4o-mini".into(),
                messages: vec![Message::user("hi")],
                max_tokens: 256,
                temperature: 0.5,
            })
            .await
            .unwrap();

        assert_eq!(response.content, "first");
        let (auth, body) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_no_auth_header_without_key() {
        let seen: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap| {
                let captured = Arc::clone(&captured);
                async move {
                    *captured.lock().unwrap() = Some(headers.contains_key("authorization"));
                    Json(json!({"choices": [{"message": {"content": "ok"}}]}))
                }
            }),
        );
        let provider = OpenAiCompatProvider::new(Client::new(), spawn(app).await, None);
        provider
            .generate(&GenerateRequest {
                model: "local".into(),
                prompt: "hello".into(),
                max_tokens: 16,
                temperature: 0.7,
            })
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_discovery_reads_data_ids() {
        let app = Router::new().route(
            "/v1/models",
            get(|| async { Json(json!({"object": "list", "data": [{"id": "gpt-4o"}, {"id": "gpt-4o-mini"}]})) }),
        );
        let provider = OpenAiCompatProvider::new(Client::new(), spawn(app).await, None);
        assert_eq!(provider.available_models().await, vec!["gpt-4o", "gpt-4o-mini"]);
        assert!(provider.health().await.ok);
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let provider = OpenAiCompatProvider::new(Client::new(), spawn(app).await, None);
        let err = provider
            .chat(&InferenceRequest {
                model: "x".into(),
                messages: vec![Message::user("hi")],
                max_tokens: 16,
                temperature: 0.7,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ColdMailError::Upstream { .. }));
    }
}
