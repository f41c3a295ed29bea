//! Scripted provider for exercising pipelines without a live endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coldmail_core::{
    ColdMailError, GenerateRequest, InferenceProvider, InferenceRequest, InferenceResponse,
    ProviderHealth,
};

use super::ProviderFactory;
use crate::config::InferenceConfig;

type Reply = Result<String, String>;

/// Returns queued replies in order and records every request it sees.
///
/// An exhausted chat queue fails like an unreachable endpoint. Single-shot
/// calls fall back to `generate_default` when their queue is empty.
#[derive(Default)]
pub struct MockProvider {
    models: Vec<String>,
    chat_replies: Mutex<VecDeque<Reply>>,
    generate_replies: Mutex<VecDeque<Reply>>,
    generate_default: Option<String>,
    generate_delay: Option<Duration>,
    chat_log: Mutex<Vec<InferenceRequest>>,
    generate_log: Mutex<Vec<GenerateRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicUsize,
    /// Completed single-shot calls observed as each new one started.
    completed_at_start: Mutex<Vec<usize>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_chat_reply(self, reply: impl Into<String>) -> Self {
        self.push_chat(Ok(reply.into()));
        self
    }

    pub fn with_chat_failure(self, message: impl Into<String>) -> Self {
        self.push_chat(Err(message.into()));
        self
    }

    pub fn with_generate_reply(self, reply: impl Into<String>) -> Self {
        if let Ok(mut queue) = self.generate_replies.lock() {
            queue.push_back(Ok(reply.into()));
        }
        self
    }

    pub fn with_generate_failure(self, message: impl Into<String>) -> Self {
        if let Ok(mut queue) = self.generate_replies.lock() {
            queue.push_back(Err(message.into()));
        }
        self
    }

    pub fn with_generate_default(mut self, reply: impl Into<String>) -> Self {
        self.generate_default = Some(reply.into());
        self
    }

    /// Hold every single-shot call open for `delay` before answering.
    pub fn with_generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = Some(delay);
        self
    }

    fn push_chat(&self, reply: Reply) {
        if let Ok(mut queue) = self.chat_replies.lock() {
            queue.push_back(reply);
        }
    }

    /// Every chat request received so far, oldest first.
    pub fn chat_requests(&self) -> Vec<InferenceRequest> {
        self.chat_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Every single-shot request received so far, oldest first.
    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.generate_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Most single-shot calls that were ever in flight at once.
    pub fn peak_generate_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// For each single-shot call in start order, how many had already finished.
    pub fn completed_before_each_generate(&self) -> Vec<usize> {
        self.completed_at_start
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn respond(reply: Option<Reply>, model: &str) -> Result<InferenceResponse, ColdMailError> {
        match reply {
            Some(Ok(content)) => Ok(InferenceResponse {
                content,
                provider: "mock".to_string(),
                model: model.to_string(),
                latency_ms: 0,
            }),
            Some(Err(message)) => Err(ColdMailError::upstream("mock", message)),
            None => Err(ColdMailError::upstream("mock", "no scripted reply")),
        }
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn available_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn chat(&self, request: &InferenceRequest) -> Result<InferenceResponse, ColdMailError> {
        if let Ok(mut log) = self.chat_log.lock() {
            log.push(request.clone());
        }
        let reply = self.chat_replies.lock().ok().and_then(|mut q| q.pop_front());
        Self::respond(reply, &request.model)
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<InferenceResponse, ColdMailError> {
        if let Ok(mut log) = self.generate_log.lock() {
            log.push(request.clone());
        }
        if let Ok(mut starts) = self.completed_at_start.lock() {
            starts.push(self.completed.load(Ordering::SeqCst));
        }
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.generate_delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        let reply = self
            .generate_replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .or_else(|| self.generate_default.clone().map(Ok));
        Self::respond(reply, &request.model)
    }

    async fn health(&self) -> ProviderHealth {
        ProviderHealth {
            ok: !self.models.is_empty(),
            status: None,
            error: None,
            models: self.models.clone(),
        }
    }
}

/// Factory that hands out the same provider regardless of configuration.
pub struct StaticProviderFactory {
    provider: Arc<dyn InferenceProvider>,
}

impl StaticProviderFactory {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self { provider }
    }
}

impl ProviderFactory for StaticProviderFactory {
    fn connect(&self, _config: &InferenceConfig) -> Arc<dyn InferenceProvider> {
        Arc::clone(&self.provider)
    }
}
