//! Per-workspace inference override.
//!
//! API keys are write-only: responses say whether one is set, never what it is.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use coldmail_core::WorkspaceSettings;
use coldmail_inference::{InferenceConfig, Protocol};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::CurrentWorkspace;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceSettingsView {
    pub base_url: String,
    pub model: String,
    pub protocol: Protocol,
    pub has_api_key: bool,
    /// Which fields come from the workspace rather than the environment.
    pub overridden: Overrides,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    pub base_url: bool,
    pub model: bool,
    pub api_key: bool,
}

impl InferenceSettingsView {
    fn new(config: &InferenceConfig, stored: Option<&WorkspaceSettings>) -> Self {
        let overridden = stored
            .map(|s| Overrides {
                base_url: s.base_url.is_some(),
                model: s.model.is_some(),
                api_key: s.api_key.is_some(),
            })
            .unwrap_or_default();
        Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            protocol: config.protocol,
            has_api_key: config.api_key.is_some(),
            overridden,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InferenceSettingsBody {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

/// Handler for `GET /api/settings/inference`
pub async fn get_inference(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
) -> Result<Json<Value>, ApiError> {
    let stored = state.store.get_settings(workspace.id()).await?;
    let config = state.inference.resolve(stored.as_ref());
    Ok(Json(json!({
        "success": true,
        "data": InferenceSettingsView::new(&config, stored.as_ref()),
    })))
}

/// Handler for `PUT /api/settings/inference`
///
/// Replaces the whole override; omitted or blank fields revert to the environment.
pub async fn put_inference(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    payload: Result<Json<InferenceSettingsBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let stored = state
        .store
        .put_settings(&WorkspaceSettings {
            workspace_id: workspace.id().to_string(),
            base_url: body.base_url,
            model: body.model,
            api_key: body.api_key,
        })
        .await?;

    let config = state.inference.resolve(Some(&stored));
    info!(workspace_id = %workspace.id(), base_url = %config.base_url, model = %config.model, "Inference settings updated");
    Ok(Json(json!({
        "success": true,
        "data": InferenceSettingsView::new(&config, Some(&stored)),
    })))
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::app;
    use serde_json::json;

    #[tokio::test]
    async fn test_defaults_then_override() {
        let app = app();
        let (_, body) = app.get("/api/settings/inference").await;
        assert_eq!(body["data"]["baseUrl"], "http://localhost:11434");
        assert_eq!(body["data"]["protocol"], "native");
        assert_eq!(body["data"]["overridden"]["model"], false);

        let (_, body) = app
            .json(
                "PUT",
                "/api/settings/inference",
                json!({"baseUrl": "https://api.openai.com/v1/", "model": "gpt-4o-mini", "apiKey": "sk-test"}),
            )
            .await;
        let data = &body["data"];
        assert_eq!(data["baseUrl"], "https://api.openai.com/v1");
        assert_eq!(data["protocol"], "openai-compatible");
        assert_eq!(data["hasApiKey"], true);
        assert!(data.get("apiKey").is_none());
        assert!(!body.to_string().contains("sk-test"));

        let (_, body) = app.json("PUT", "/api/settings/inference", json!({"model": " "})).await;
        assert_eq!(body["data"]["model"], "llama3.2");
        assert_eq!(body["data"]["overridden"]["baseUrl"], false);
    }
}
