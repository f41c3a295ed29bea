//! Billing status and the Paystack webhook.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use coldmail_core::ColdMailError;
use coldmail_store::PaymentUpdate;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha512;
use tracing::{info, warn};

use crate::auth::CurrentWorkspace;
use crate::error::ApiError;
use crate::server::AppState;

pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Handler for `GET /api/billing/status`
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
) -> Result<Json<Value>, ApiError> {
    let billing = state.store.get_billing(workspace.id()).await?;
    let is_premium = billing.as_ref().is_some_and(|b| b.is_premium());
    Ok(Json(json!({
        "success": true,
        "data": { "isPremium": is_premium, "billing": billing },
    })))
}

/// Check the hex HMAC-SHA512 of the raw body against the signature header.
pub fn verify_paystack_signature(headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
    let Some(signature) = headers
        .get(PAYSTACK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha512>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Fields of a Paystack event that touch billing.
#[derive(Debug, Clone, PartialEq)]
pub struct PaystackEvent {
    pub event: Option<String>,
    pub workspace_id: Option<String>,
    pub update: PaymentUpdate,
}

impl PaystackEvent {
    pub fn from_payload(payload: &Value) -> Self {
        let data = &payload["data"];
        let text = |v: &Value| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

        let status = match data["status"].as_str() {
            Some("success") => "active".to_string(),
            Some(other) if !other.is_empty() => other.to_string(),
            _ => "pending".to_string(),
        };
        let current_period_end = data["next_payment_date"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));

        Self {
            event: text(&payload["event"]),
            workspace_id: text(&data["metadata"]["workspaceId"]),
            update: PaymentUpdate {
                status,
                customer_code: text(&data["customer"]["customer_code"]),
                subscription_code: text(&data["subscription_code"]).or_else(|| text(&data["plan_code"])),
                current_period_end,
            },
        }
    }
}

/// Handler for `POST /api/paystack/webhook`
pub async fn paystack_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let Some(secret) = state.paystack_secret.as_deref() else {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Paystack webhook not configured",
        ));
    };

    if !verify_paystack_signature(&headers, &body, secret) {
        warn!("Invalid Paystack signature, rejecting webhook");
        return Err(ColdMailError::InvalidSignature.into());
    }

    let payload: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid payload"))?;
    let event = PaystackEvent::from_payload(&payload);

    if let Some(workspace_id) = &event.workspace_id {
        state
            .store
            .upsert_paystack_billing(workspace_id, &event.update)
            .await?;
    } else if let Some(code) = payload["data"]["subscription_code"].as_str() {
        let touched = state
            .store
            .update_billing_by_subscription(code, &event.update.status, event.update.current_period_end)
            .await?;
        info!(subscription = %code, touched, "Billing updated by subscription");
    }

    Ok(Json(json!({ "success": true, "received": true, "event": event.event })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::app_with;
    use axum::body::Body;
    use axum::http::Request;
    use coldmail_inference::MockProvider;

    const SECRET: &str = "sk_test_paystack";

    fn sign(body: &str) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn webhook(body: &str, signature: Option<String>) -> Request<Body> {
        let mut request = Request::post("/api/paystack/webhook").header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header(PAYSTACK_SIGNATURE_HEADER, signature);
        }
        request.body(Body::from(body.to_string())).unwrap()
    }

    #[test]
    fn test_event_extraction() {
        let event = PaystackEvent::from_payload(&json!({
            "event": "charge.success",
            "data": {
                "status": "success",
                "metadata": {"workspaceId": "w1"},
                "customer": {"customer_code": "CUS_1"},
                "plan_code": "PLN_1",
                "next_payment_date": "2026-11-01T00:00:00.000Z"
            }
        }));
        assert_eq!(event.workspace_id.as_deref(), Some("w1"));
        assert_eq!(event.update.status, "active");
        assert_eq!(event.update.subscription_code.as_deref(), Some("PLN_1"));
        assert!(event.update.current_period_end.is_some());

        let bare = PaystackEvent::from_payload(&json!({"event": "x", "data": {}}));
        assert_eq!(bare.update.status, "pending");
        assert!(bare.workspace_id.is_none());
    }

    #[tokio::test]
    async fn test_signed_webhook_activates_premium() {
        let app = app_with(MockProvider::new(), Some(SECRET));
        let ws = app.workspace_id().await;
        let body = json!({
            "event": "charge.success",
            "data": {
                "status": "success",
                "metadata": {"workspaceId": ws},
                "subscription_code": "SUB_1"
            }
        })
        .to_string();

        let (status, response) = app.send(webhook(&body, Some(sign(&body)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["received"], true);
        assert_eq!(response["event"], "charge.success");

        let (_, billing) = app.get("/api/billing/status").await;
        assert_eq!(billing["data"]["isPremium"], true);
        assert_eq!(billing["data"]["billing"]["planName"], "Premium");

        let cancel = json!({
            "event": "subscription.disable",
            "data": {"status": "cancelled", "subscription_code": "SUB_1"}
        })
        .to_string();
        app.send(webhook(&cancel, Some(sign(&cancel)))).await;
        let (_, billing) = app.get("/api/billing/status").await;
        assert_eq!(billing["data"]["isPremium"], false);
        assert_eq!(billing["data"]["billing"]["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_webhook_rejections() {
        let unconfigured = app_with(MockProvider::new(), None);
        let (status, body) = unconfigured.send(webhook("{}", Some(sign("{}")))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Paystack webhook not configured");

        let app = app_with(MockProvider::new(), Some(SECRET));
        let (status, body) = app.send(webhook("{}", Some(sign("{\"x\":1}")))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid signature");

        let (status, _) = app.send(webhook("{}", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app.send(webhook("not json", Some(sign("not json")))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid payload");
    }
}
