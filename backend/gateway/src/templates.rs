//! Template CRUD.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use coldmail_store::TemplatePatch;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::CurrentWorkspace;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemplateBody {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
) -> Result<Json<Value>, ApiError> {
    let templates = state.store.list_templates(workspace.id()).await?;
    Ok(Json(json!({ "success": true, "data": templates })))
}

pub async fn create_template(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    payload: Result<Json<TemplateBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) = payload?;
    let (Some(name), Some(subject), Some(body)) =
        (required(&input.name), required(&input.subject), required(&input.body))
    else {
        return Err(ApiError::bad_request("name, subject, and body are required"));
    };

    let template = state
        .store
        .create_template(workspace.id(), name, subject, body)
        .await?;
    Ok(Json(json!({ "success": true, "data": template })))
}

pub async fn get_template(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let template = state
        .store
        .get_template(workspace.id(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found"))?;
    Ok(Json(json!({ "success": true, "data": template })))
}

pub async fn update_template(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    Path(id): Path<String>,
    payload: Result<Json<TemplateBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) = payload?;
    let patch = TemplatePatch {
        name: input.name,
        subject: input.subject,
        body: input.body,
    };
    let template = state
        .store
        .update_template(workspace.id(), &id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found"))?;
    Ok(Json(json!({ "success": true, "data": template })))
}

pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.delete_template(workspace.id(), &id).await? {
        return Err(ApiError::not_found("Not found"));
    }
    Ok(Json(json!({ "success": true })))
}
