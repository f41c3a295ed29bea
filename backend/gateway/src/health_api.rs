//! Liveness and inference health.

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::CurrentWorkspace;
use crate::error::ApiError;
use crate::server::AppState;

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "ok",
        "service": "coldmail",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Handler for `GET /api/dashboard/health`
pub async fn get_inference_health(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
) -> Result<Json<Value>, ApiError> {
    let config = state.inference_for(workspace.id()).await?;
    let health = state.factory.connect(&config).health().await;

    Ok(Json(json!({
        "success": true,
        "data": {
            "timestamp": Utc::now(),
            "services": {
                "inference": {
                    "status": if health.ok { "online" } else { "offline" },
                    "baseUrl": config.base_url,
                    "model": config.model,
                    "protocol": config.protocol,
                    "httpStatus": health.status,
                    "details": health.error,
                    "models": health.models,
                }
            },
            "system": { "healthy": health.ok, "ready": true },
        }
    })))
}
