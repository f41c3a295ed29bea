//! One chat turn, end to end.
//!
//! classify → assemble prompt → infer → dispatch tool call → rewrite result →
//! persist reply → refresh memory. Every network call in a turn is sequential.

use std::sync::Arc;

use coldmail_core::{ClassificationResult, ColdMailError, Message, Role, ToolResult};
use coldmail_inference::Endpoint;
use coldmail_store::Store;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::classifier::classify;
use crate::context_window::{ContextWindow, CONTEXT_MESSAGES};
use crate::memory::{refresh_memory, MemoryRefresh, SUMMARY_WINDOW};
use crate::system_prompt::{PromptBuilder, WorkspaceSnapshot};
use crate::tool_dispatcher::ToolDispatcher;

const REWRITE_PROMPT: &str = "You turn tool results into a short, friendly reply for the user. \
Say what was done in one or two sentences. Never show raw JSON.";

/// A user message arriving at the chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub session_id: Option<String>,
    pub message: String,
}

/// What the caller gets back from a turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String,
    #[serde(flatten)]
    pub classification: ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    pub model: String,
}

pub struct ChatAgent {
    store: Arc<Store>,
    dispatcher: ToolDispatcher,
}

impl ChatAgent {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            dispatcher: ToolDispatcher::new(Arc::clone(&store)),
            store,
        }
    }

    /// Run a single turn for `workspace_id` against an already-connected endpoint.
    ///
    /// The user message is persisted before inference, so it survives an
    /// inference failure. The assistant reply is persisted only on success.
    #[instrument(skip_all, fields(workspace_id = %workspace_id))]
    pub async fn run_turn(
        &self,
        endpoint: &Endpoint,
        workspace_id: &str,
        turn: ChatTurn,
    ) -> Result<ChatReply, ColdMailError> {
        let message = turn.message.trim();
        if message.is_empty() {
            return Err(ColdMailError::validation("message is required"));
        }

        let classification = classify(message);
        debug!(intent = %classification.intent, confidence = classification.confidence, "Classified message");

        let session = self
            .store
            .get_or_create_session(workspace_id, turn.session_id.as_deref())
            .await?;
        self.store
            .append_message(&session.id, Role::User, message)
            .await?;

        let history = self.store.recent_messages(&session.id, SUMMARY_WINDOW).await?;
        let snapshot =
            WorkspaceSnapshot::load(&self.store, workspace_id, session.memory.clone()).await?;
        let system_prompt = PromptBuilder::build(&classification, &snapshot);
        let window = ContextWindow::build(system_prompt, &history, CONTEXT_MESSAGES);

        let first = endpoint.chat(window.into_messages()).await?;
        let mut reply = first.content;

        let tool_result = self.dispatcher.process(workspace_id, &reply).await;
        if let Some(result) = &tool_result {
            match self.rewrite(endpoint, message, result).await {
                Ok(rewritten) => reply = rewritten,
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "Tool result rewrite failed, keeping original reply");
                }
            }
        }

        self.store
            .append_message(&session.id, Role::Assistant, &reply)
            .await?;

        // Best effort: the reply is already persisted, so a failed summary is
        // dropped and the previous memory stays in place.
        match refresh_memory(endpoint, &self.store, &session.id).await {
            Ok(MemoryRefresh::Updated(_)) => debug!(session_id = %session.id, "Memory updated"),
            Ok(_) => {}
            Err(e) => debug!(session_id = %session.id, error = %e, "Memory refresh discarded"),
        }

        info!(
            session_id = %session.id,
            intent = %classification.intent,
            tool = tool_result.is_some(),
            "Chat turn complete"
        );

        Ok(ChatReply {
            session_id: session.id,
            reply,
            classification,
            tool_result,
            model: endpoint.model().to_string(),
        })
    }

    /// Ask the model to phrase a tool result as a short reply.
    async fn rewrite(
        &self,
        endpoint: &Endpoint,
        user_message: &str,
        result: &ToolResult,
    ) -> Result<String, ColdMailError> {
        let response = endpoint
            .chat(vec![
                Message::system(REWRITE_PROMPT),
                Message::user(format!(
                    "User asked: {user_message}\nTool result: {}",
                    result.to_json()
                )),
            ])
            .await?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(ColdMailError::upstream(
                endpoint.provider_name(),
                "empty rewrite",
            ));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldmail_inference::{InferenceConfig, MockProvider, StaticProviderFactory};
    use coldmail_store::Identity;

    struct Harness {
        store: Arc<Store>,
        agent: ChatAgent,
        workspace_id: String,
    }

    async fn harness() -> Harness {
        let store = Arc::new(Store::in_memory().unwrap());
        let workspace_id = store
            .resolve_workspace(&Identity::anonymous())
            .await
            .unwrap()
            .workspace
            .id;
        Harness {
            agent: ChatAgent::new(Arc::clone(&store)),
            store,
            workspace_id,
        }
    }

    async fn endpoint(provider: Arc<MockProvider>) -> Endpoint {
        Endpoint::connect(&StaticProviderFactory::new(provider), InferenceConfig::default()).await
    }

    fn turn(session_id: Option<&str>, message: &str) -> ChatTurn {
        ChatTurn {
            session_id: session_id.map(String::from),
            message: message.to_string(),
        }
    }

    async fn seed(h: &Harness, n: usize) -> String {
        let session = h
            .store
            .get_or_create_session(&h.workspace_id, None)
            .await
            .unwrap();
        for i in 0..n {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            h.store
                .append_message(&session.id, role, &format!("seed {i}"))
                .await
                .unwrap();
        }
        session.id
    }

    #[tokio::test]
    async fn test_plain_reply_is_persisted() {
        let h = harness().await;
        let provider = Arc::new(MockProvider::new().with_chat_reply("Hello! How can I help?"));
        let ep = endpoint(provider.clone()).await;

        let reply = h
            .agent
            .run_turn(&ep, &h.workspace_id, turn(None, "hi"))
            .await
            .unwrap();
        assert_eq!(reply.reply, "Hello! How can I help?");
        assert!(reply.tool_result.is_none());
        assert_eq!(reply.classification, ClassificationResult::default());

        let stored = h.store.recent_messages(&reply.session_id, 20).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, Role::User);
        assert_eq!(stored[1].content, "Hello! How can I help?");
        assert_eq!(provider.chat_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_context_is_last_eight_plus_system() {
        let h = harness().await;
        let session = seed(&h, 19).await;
        let provider = Arc::new(
            MockProvider::new()
                .with_chat_reply("answer")
                .with_chat_reply("summary"),
        );
        let ep = endpoint(provider.clone()).await;

        h.agent
            .run_turn(&ep, &h.workspace_id, turn(Some(&session), "latest question"))
            .await
            .unwrap();

        let first = &provider.chat_requests()[0];
        assert_eq!(first.messages.len(), CONTEXT_MESSAGES + 1);
        assert_eq!(first.messages[0].role, Role::System);
        assert_eq!(first.messages[1].content, "seed 12");
        assert_eq!(first.messages[8].content, "latest question");
    }

    #[tokio::test]
    async fn test_summary_triggers_at_tenth_message() {
        let h = harness().await;
        let session = seed(&h, 8).await;
        let provider = Arc::new(
            MockProvider::new()
                .with_chat_reply("answer")
                .with_chat_reply("User is planning outreach."),
        );
        let ep = endpoint(provider.clone()).await;

        h.agent
            .run_turn(&ep, &h.workspace_id, turn(Some(&session), "next"))
            .await
            .unwrap();

        assert_eq!(provider.chat_requests().len(), 2);
        assert_eq!(
            h.store.get_memory(&session).await.unwrap(),
            "User is planning outreach."
        );
    }

    #[tokio::test]
    async fn test_no_summary_at_ninth_message() {
        let h = harness().await;
        let session = seed(&h, 7).await;
        let provider = Arc::new(MockProvider::new().with_chat_reply("answer"));
        let ep = endpoint(provider.clone()).await;

        h.agent
            .run_turn(&ep, &h.workspace_id, turn(Some(&session), "next"))
            .await
            .unwrap();

        assert_eq!(h.store.recent_messages(&session, 20).await.unwrap().len(), 9);
        assert_eq!(provider.chat_requests().len(), 1);
        assert_eq!(h.store.get_memory(&session).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_failed_summary_does_not_fail_turn() {
        let h = harness().await;
        let session = seed(&h, 10).await;
        // second call (the summary) fails because the queue is exhausted
        let provider = Arc::new(MockProvider::new().with_chat_reply("answer"));
        let ep = endpoint(provider.clone()).await;

        let reply = h
            .agent
            .run_turn(&ep, &h.workspace_id, turn(Some(&session), "next"))
            .await
            .unwrap();
        assert_eq!(reply.reply, "answer");
        assert_eq!(provider.chat_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_call_is_dispatched_and_rewritten() {
        let h = harness().await;
        let provider = Arc::new(
            MockProvider::new()
                .with_chat_reply(r#"TOOL_CALL: {"name":"create_campaign","args":{"name":"Q3 Fintech","leads":50}}"#)
                .with_chat_reply("Done! I created the Q3 Fintech campaign with 50 leads."),
        );
        let ep = endpoint(provider.clone()).await;

        let reply = h
            .agent
            .run_turn(&ep, &h.workspace_id, turn(None, "create a campaign Q3 Fintech with 50 leads"))
            .await
            .unwrap();

        assert_eq!(reply.reply, "Done! I created the Q3 Fintech campaign with 50 leads.");
        let result = reply.tool_result.unwrap();
        assert!(result.ok);
        assert_eq!(result.payload["campaign"]["leads"], 50);
        assert_eq!(h.store.count_campaigns(&h.workspace_id).await.unwrap(), 1);

        let rewrite = &provider.chat_requests()[1];
        assert!(rewrite.messages[1].content.contains("\"ok\":true"));
    }

    #[tokio::test]
    async fn test_failed_rewrite_keeps_original_reply() {
        let h = harness().await;
        let directive = r#"TOOL_CALL: {"name":"get_stats","args":{}}"#;
        let provider = Arc::new(
            MockProvider::new()
                .with_chat_reply(directive)
                .with_chat_failure("timeout"),
        );
        let ep = endpoint(provider).await;

        let reply = h
            .agent
            .run_turn(&ep, &h.workspace_id, turn(None, "stats please"))
            .await
            .unwrap();
        assert_eq!(reply.reply, directive);
        assert_eq!(reply.tool_result.unwrap().to_json()["campaigns"], 0);
    }

    #[tokio::test]
    async fn test_inference_failure_surfaces_and_keeps_user_message() {
        let h = harness().await;
        let session = seed(&h, 0).await;
        let ep = endpoint(Arc::new(MockProvider::new().with_chat_failure("connection refused"))).await;

        let err = h
            .agent
            .run_turn(&ep, &h.workspace_id, turn(Some(&session), "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ColdMailError::Upstream { .. }));

        let stored = h.store.recent_messages(&session, 20).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let h = harness().await;
        let ep = endpoint(Arc::new(MockProvider::new())).await;
        let err = h
            .agent
            .run_turn(&ep, &h.workspace_id, turn(None, "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ColdMailError::Validation(_)));
    }
}
