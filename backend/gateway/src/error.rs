//! HTTP error mapping.
//!
//! Every failure leaves the API as `{"success": false, "error": "..."}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coldmail_core::ColdMailError;
use coldmail_logging::redact_sensitive_data;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ColdMailError> for ApiError {
    fn from(err: ColdMailError) -> Self {
        match &err {
            ColdMailError::Validation(message) => Self::bad_request(message.clone()),
            ColdMailError::NotFound(_) => Self::not_found(err.to_string()),
            // Providers sometimes echo credentials back in their error bodies.
            ColdMailError::Upstream { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, redact_sensitive_data(&err.to_string()))
            }
            ColdMailError::InvalidSignature => Self::bad_request("Invalid signature"),
            ColdMailError::Config(_) | ColdMailError::Storage(_) | ColdMailError::Other(_) => {
                error!(error = %err, "Request failed");
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %format!("{err:#}"), "Request failed");
        Self::internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ColdMailError::validation("Email is required"), StatusCode::BAD_REQUEST),
            (ColdMailError::NotFound("template".into()), StatusCode::NOT_FOUND),
            (ColdMailError::upstream("ollama", "refused"), StatusCode::BAD_GATEWAY),
            (ColdMailError::InvalidSignature, StatusCode::BAD_REQUEST),
            (ColdMailError::Storage("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_upstream_message_is_redacted() {
        let err = ApiError::from(ColdMailError::upstream(
            "openai-compatible",
            "returned 401: Incorrect API key provided: sk-abcdefghijklmnopqrstuvwx",
        ));
        assert!(!err.message.contains("sk-abcdefghijklmnopqrstuvwx"));
        assert!(err.message.contains("returned 401"));
    }

    #[test]
    fn test_validation_message_is_passed_through() {
        let err = ApiError::from(ColdMailError::validation("Missing required fields"));
        assert_eq!(err.message, "Missing required fields");
    }
}
