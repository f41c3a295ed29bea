//! Main HTTP server: shared state and routing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use coldmail_agent::ChatAgent;
use coldmail_inference::{Endpoint, InferenceConfig, ProviderFactory};
use coldmail_store::Store;
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::{billing, chat, dashboard, health_api, settings, templates, workspaces};

/// Application state shared across routes.
pub struct AppState {
    pub store: Arc<Store>,
    pub factory: Arc<dyn ProviderFactory>,
    /// Environment defaults; workspaces may override them.
    pub inference: InferenceConfig,
    pub paystack_secret: Option<String>,
    pub agent: ChatAgent,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        factory: Arc<dyn ProviderFactory>,
        inference: InferenceConfig,
        paystack_secret: Option<String>,
    ) -> Self {
        Self {
            agent: ChatAgent::new(Arc::clone(&store)),
            store,
            factory,
            inference,
            paystack_secret: paystack_secret.filter(|s| !s.trim().is_empty()),
            started_at: Instant::now(),
        }
    }

    /// Effective inference configuration for a workspace.
    pub async fn inference_for(&self, workspace_id: &str) -> anyhow::Result<InferenceConfig> {
        let overrides = self.store.get_settings(workspace_id).await?;
        Ok(self.inference.resolve(overrides.as_ref()))
    }

    /// Connect to the workspace's endpoint, discovering its models once.
    pub async fn endpoint_for(&self, workspace_id: &str) -> anyhow::Result<Endpoint> {
        let config = self.inference_for(workspace_id).await?;
        Ok(Endpoint::connect(self.factory.as_ref(), config).await)
    }
}

/// Build the router with every API route.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_api::get_health))
        .route("/api/chat", post(chat::post_chat))
        .route("/api/generate-emails", post(chat::generate_emails))
        .route(
            "/api/settings/inference",
            get(settings::get_inference).put(settings::put_inference),
        )
        .route(
            "/api/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/api/templates/:id",
            get(templates::get_template)
                .patch(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/api/dashboard/campaigns", get(dashboard::list_campaigns))
        .route(
            "/api/dashboard/stats",
            get(dashboard::get_stats).post(dashboard::post_stats_action),
        )
        .route("/api/dashboard/activity", get(dashboard::list_activity))
        .route("/api/dashboard/usage", get(dashboard::get_usage))
        .route("/api/dashboard/health", get(health_api::get_inference_health))
        .route(
            "/api/workspaces/invites",
            get(workspaces::list_invites)
                .post(workspaces::create_invite)
                .patch(workspaces::update_invite),
        )
        .route("/api/workspaces/members", get(workspaces::list_members))
        .route("/api/billing/status", get(billing::get_status))
        .route("/api/paystack/webhook", post(billing::paystack_webhook))
        .with_state(state)
}

/// Starts the HTTP server with the given outer router.
#[instrument(skip(app))]
pub async fn start_server(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "ColdMail HTTP API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use coldmail_inference::{MockProvider, StaticProviderFactory};
    use serde_json::Value;
    use tower::ServiceExt;

    pub struct TestApp {
        pub state: Arc<AppState>,
        pub router: Router,
    }

    pub fn app_with(provider: MockProvider, paystack_secret: Option<&str>) -> TestApp {
        let store = Arc::new(Store::in_memory().unwrap());
        let factory = Arc::new(StaticProviderFactory::new(Arc::new(provider)));
        let state = Arc::new(AppState::new(
            store,
            factory,
            InferenceConfig::default(),
            paystack_secret.map(String::from),
        ));
        TestApp {
            router: build_router(Arc::clone(&state)),
            state,
        }
    }

    pub fn app() -> TestApp {
        app_with(MockProvider::new(), None)
    }

    impl TestApp {
        pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        pub async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.send(request).await
        }

        pub async fn workspace_id(&self) -> String {
            self.state
                .store
                .resolve_workspace(&coldmail_store::Identity::anonymous())
                .await
                .unwrap()
                .workspace
                .id
        }
    }
}
