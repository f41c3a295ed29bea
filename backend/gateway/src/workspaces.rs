//! Workspace members and invites.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use coldmail_core::MemberRole;
use coldmail_store::invites::{DEFAULT_INVITE_DAYS, MAX_INVITE_DAYS};
use coldmail_store::InviteOutcome;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::CurrentWorkspace;
use crate::error::ApiError;
use crate::server::AppState;

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
) -> Result<Json<Value>, ApiError> {
    let members = state.store.list_members(workspace.id()).await?;
    Ok(Json(json!({ "success": true, "data": members })))
}

pub async fn list_invites(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
) -> Result<Json<Value>, ApiError> {
    let invites = state.store.list_invites(workspace.id()).await?;
    Ok(Json(json!({ "success": true, "data": invites })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateInviteBody {
    pub email: Option<String>,
    pub role: Option<String>,
    pub expires_in_days: Option<i64>,
}

pub async fn create_invite(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    payload: Result<Json<CreateInviteBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let Some(email) = body.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
        return Err(ApiError::bad_request("Email is required"));
    };
    let role = match body.role.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(role) => MemberRole::from_str(role).map_err(ApiError::bad_request)?,
        None => MemberRole::Member,
    };
    let days = body
        .expires_in_days
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_INVITE_DAYS);
    if days > MAX_INVITE_DAYS {
        return Err(ApiError::bad_request(format!(
            "expiresInDays must be at most {MAX_INVITE_DAYS}"
        )));
    }

    let invite = state
        .store
        .create_invite(workspace.id(), email, role, days)
        .await?;
    Ok(Json(json!({ "success": true, "data": invite })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InviteActionBody {
    pub action: String,
    pub token: Option<String>,
    pub email: Option<String>,
}

/// Handler for `PATCH /api/workspaces/invites`
///
/// `revoke` only sees the caller's workspace; `accept` redeems any token.
pub async fn update_invite(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    payload: Result<Json<InviteActionBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let token = body.token.as_deref().map(str::trim).unwrap_or_default();

    match body.action.as_str() {
        "revoke" => {
            let invite = state
                .store
                .revoke_invite(workspace.id(), token)
                .await?
                .ok_or_else(|| ApiError::not_found("Invite not found"))?;
            Ok(Json(json!({ "success": true, "data": invite })))
        }
        "accept" => {
            let Some(email) = body.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
                return Err(ApiError::bad_request("Email required to accept invite"));
            };
            match state.store.accept_invite(token, email).await? {
                InviteOutcome::Accepted(invite) => Ok(Json(json!({ "success": true, "data": invite }))),
                InviteOutcome::NotFound => Err(ApiError::not_found("Invite not found")),
                InviteOutcome::Inactive => Err(ApiError::bad_request("Invite is no longer active")),
                InviteOutcome::Expired => Err(ApiError::bad_request("Invite expired")),
            }
        }
        _ => Err(ApiError::bad_request("Invalid action")),
    }
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::app;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_invite_accept_adds_member() {
        let app = app();
        let (status, created) = app
            .json(
                "POST",
                "/api/workspaces/invites",
                json!({"email": "sam@example.com", "role": "admin"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["data"]["role"], "ADMIN");
        let token = created["data"]["token"].as_str().unwrap().to_string();

        let (status, accepted) = app
            .json(
                "PATCH",
                "/api/workspaces/invites",
                json!({"action": "accept", "token": token, "email": "sam@example.com"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["data"]["status"], "ACCEPTED");

        let (_, members) = app.get("/api/workspaces/members").await;
        let members = members["data"].as_array().unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().any(|m| m["user"]["email"] == "sam@example.com"));

        let (status, again) = app
            .json(
                "PATCH",
                "/api/workspaces/invites",
                json!({"action": "accept", "token": token, "email": "sam@example.com"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(again["error"], "Invite is no longer active");
    }

    #[tokio::test]
    async fn test_invite_errors() {
        let app = app();
        let (status, body) = app.json("POST", "/api/workspaces/invites", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email is required");

        let (status, body) = app
            .json("PATCH", "/api/workspaces/invites", json!({"action": "revoke", "token": "nope"}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Invite not found");

        let (status, body) = app
            .json("PATCH", "/api/workspaces/invites", json!({"action": "accept", "token": "nope"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email required to accept invite");

        let (status, body) = app
            .json("PATCH", "/api/workspaces/invites", json!({"action": "resend"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action");
    }

    #[tokio::test]
    async fn test_invite_expiry_is_bounded() {
        let app = app();
        let (status, body) = app
            .json(
                "POST",
                "/api/workspaces/invites",
                json!({"email": "a@b.test", "expiresInDays": 9_000_000_000_000i64}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "expiresInDays must be at most 365");

        let (status, body) = app
            .json(
                "POST",
                "/api/workspaces/invites",
                json!({"email": "a@b.test", "expiresInDays": 365}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "PENDING");
    }

    #[tokio::test]
    async fn test_revoke_then_list() {
        let app = app();
        let (_, created) = app
            .json("POST", "/api/workspaces/invites", json!({"email": "kim@example.com"}))
            .await;
        let token = created["data"]["token"].as_str().unwrap().to_string();

        let (status, revoked) = app
            .json("PATCH", "/api/workspaces/invites", json!({"action": "revoke", "token": token}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(revoked["data"]["status"], "REVOKED");

        let (_, listed) = app.get("/api/workspaces/invites").await;
        assert_eq!(listed["data"][0]["status"], "REVOKED");
    }
}
