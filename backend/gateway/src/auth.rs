//! Caller identity.
//!
//! Authentication happens upstream; the proxy forwards the signed-in user as
//! `x-user-email` / `x-user-name`. Requests without them run in the default
//! workspace.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use coldmail_store::{Identity, WorkspaceContext};
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// The workspace the request is scoped to.
pub struct CurrentWorkspace(pub WorkspaceContext);

impl CurrentWorkspace {
    pub fn id(&self) -> &str {
        &self.0.workspace.id
    }
}

pub fn identity_from_headers(headers: &HeaderMap) -> Identity {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    match header(USER_EMAIL_HEADER) {
        Some(email) => Identity::signed_in(email, header(USER_NAME_HEADER)),
        None => Identity::anonymous(),
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentWorkspace {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let identity = identity_from_headers(&parts.headers);
        let context = state.store.resolve_workspace(&identity).await?;
        debug!(workspace_id = %context.workspace.id, signed_in = identity.email.is_some(), "Resolved workspace");
        Ok(CurrentWorkspace(context))
    }
}
