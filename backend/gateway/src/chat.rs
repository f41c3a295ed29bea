//! Chat and email generation endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use coldmail_agent::{generate_for_workspace, ChatReply, ChatTurn, EmailBrief};
use coldmail_core::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::CurrentWorkspace;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatBody {
    pub session_id: Option<String>,
    pub message: Option<String>,
    /// Older clients post the whole transcript; only the last entry is new.
    pub messages: Vec<Message>,
}

impl ChatBody {
    fn into_turn(self) -> ChatTurn {
        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.messages.into_iter().last().map(|m| m.content))
            .unwrap_or_default();
        ChatTurn {
            session_id: self.session_id.filter(|s| !s.trim().is_empty()),
            message,
        }
    }
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(flatten)]
    pub reply: ChatReply,
}

/// Handler for `POST /api/chat`
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = payload?;
    let turn = body.into_turn();
    if turn.message.trim().is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    let endpoint = state.endpoint_for(workspace.id()).await?;
    let reply = state.agent.run_turn(&endpoint, workspace.id(), turn).await?;

    Ok(Json(ChatResponse {
        success: true,
        reply,
    }))
}

/// Handler for `POST /api/generate-emails`
pub async fn generate_emails(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    payload: Result<Json<EmailBrief>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(brief) = payload?;
    brief.validate()?;

    let endpoint = state.endpoint_for(workspace.id()).await?;
    let emails = generate_for_workspace(&endpoint, &state.store, workspace.id(), &brief).await?;

    Ok(Json(json!({ "success": true, "emails": emails })))
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::{app, app_with};
    use axum::http::StatusCode;
    use coldmail_inference::MockProvider;
    use serde_json::json;

    #[tokio::test]
    async fn test_chat_round_trip() {
        let app = app_with(MockProvider::new().with_chat_reply("Happy to help."), None);
        let (status, body) = app
            .json("POST", "/api/chat", json!({"message": "explain open rates"}))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["reply"], "Happy to help.");
        assert_eq!(body["intent"], "explain");
        assert_eq!(body["confidence"], 1);
        assert!(body["sessionId"].as_str().is_some());
        assert!(body.get("toolResult").is_none());
    }

    #[tokio::test]
    async fn test_legacy_transcript_uses_last_message() {
        let app = app_with(MockProvider::new().with_chat_reply("ok"), None);
        let (status, body) = app
            .json(
                "POST",
                "/api/chat",
                json!({"messages": [
                    {"role": "user", "content": "first"},
                    {"role": "assistant", "content": "reply"},
                    {"role": "user", "content": "second"}
                ]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let session = body["sessionId"].as_str().unwrap();
        let stored = app.state.store.recent_messages(session, 20).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].content, "second");
    }

    #[tokio::test]
    async fn test_blank_message_falls_back_to_transcript() {
        let app = app_with(MockProvider::new().with_chat_reply("ok"), None);
        let (status, body) = app
            .json(
                "POST",
                "/api/chat",
                json!({"message": "  ", "messages": [{"role": "user", "content": "from transcript"}]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let session = body["sessionId"].as_str().unwrap();
        let stored = app.state.store.recent_messages(session, 20).await.unwrap();
        assert_eq!(stored[0].content, "from transcript");
    }

    #[tokio::test]
    async fn test_chat_requires_message() {
        let (status, body) = app().json("POST", "/api/chat", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": false, "error": "message is required"}));
    }

    #[tokio::test]
    async fn test_unreachable_inference_is_bad_gateway() {
        let (status, body) = app().json("POST", "/api/chat", json!({"message": "hi"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("mock"));
    }

    #[tokio::test]
    async fn test_generate_emails_falls_back_to_templates() {
        let app = app();
        let (status, body) = app
            .json(
                "POST",
                "/api/generate-emails",
                json!({"companyUrl": "https://acme.test", "yourOffer": "faster onboarding"}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        let emails = body["emails"].as_array().unwrap();
        assert_eq!(emails.len(), 30);
        assert!(emails.iter().all(|e| e["aiGenerated"] == false));
        assert_eq!(emails[1]["style"], "Warm");
    }

    #[tokio::test]
    async fn test_generate_emails_requires_fields() {
        let (status, body) = app()
            .json("POST", "/api/generate-emails", json!({"companyUrl": "https://acme.test"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }
}
