//! Detects tool-call directives in model replies and runs them against the store.
//!
//! A directive is a line starting with `TOOL_CALL:` followed by one JSON
//! object. Replies without the marker pass through untouched.

use std::sync::Arc;

use coldmail_core::{CampaignStatus, ToolCall, ToolCallError, ToolResult};
use coldmail_store::Store;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, warn};

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*TOOL_CALL:[ \t]*").unwrap());

/// Find and parse the first tool-call directive in `reply`.
///
/// `None` means there is no marker at the start of any line. Text after the
/// JSON object is ignored.
pub fn parse_tool_call(reply: &str) -> Option<Result<ToolCall, ToolCallError>> {
    let found = MARKER.find(reply)?;
    let rest = &reply[found.end()..];

    if !rest.starts_with('{') {
        return Some(Err(ToolCallError::Malformed(
            "expected a JSON object after the marker".to_string(),
        )));
    }

    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    let parsed = match stream.next() {
        Some(Ok(value)) => ToolCall::from_value(value),
        Some(Err(e)) => Err(ToolCallError::Malformed(e.to_string())),
        None => Err(ToolCallError::Malformed("empty tool call".to_string())),
    };
    Some(parsed)
}

pub struct ToolDispatcher {
    store: Arc<Store>,
}

impl ToolDispatcher {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Parse `reply` and run the directive it carries, if any.
    pub async fn process(&self, workspace_id: &str, reply: &str) -> Option<ToolResult> {
        let result = match parse_tool_call(reply)? {
            Ok(call) => self.execute(workspace_id, &call).await,
            Err(err) => {
                warn!(workspace_id = %workspace_id, error = %err, "Rejected tool call");
                ToolResult::from(err)
            }
        };
        Some(result)
    }

    /// Run one validated call. Each call performs exactly one store operation.
    pub async fn execute(&self, workspace_id: &str, call: &ToolCall) -> ToolResult {
        info!(workspace_id = %workspace_id, tool = call.name(), "Dispatching tool call");

        let outcome = match call {
            ToolCall::CreateCampaign(args) => self
                .store
                .create_campaign(workspace_id, &args.name, args.leads, CampaignStatus::Draft)
                .await
                .map(|campaign| ToolResult::success("campaign", to_value(&campaign))),
            ToolCall::UpdateCampaignStatus(args) => self
                .store
                .update_campaign_status(workspace_id, &args.id, args.status)
                .await
                .map(|updated| match updated {
                    Some(campaign) => ToolResult::success("campaign", to_value(&campaign)),
                    None => ToolResult::failure("Campaign not found"),
                }),
            ToolCall::ListCampaigns(args) => self
                .store
                .recent_campaigns(workspace_id, args.limit)
                .await
                .map(|campaigns| ToolResult::success("campaigns", to_value(&campaigns))),
            ToolCall::CreateTemplate(args) => self
                .store
                .create_template(workspace_id, &args.name, &args.subject, &args.body)
                .await
                .map(|template| ToolResult::success("template", to_value(&template))),
            ToolCall::GetStats => self
                .store
                .count_campaigns(workspace_id)
                .await
                .map(|count| ToolResult::success("campaigns", json!(count))),
            ToolCall::CreateInvite(args) => self
                .store
                .issue_invite(workspace_id, &args.email, args.role)
                .await
                .map(|invite| ToolResult::success("invite", to_value(&invite))),
        };

        outcome.unwrap_or_else(|e| {
            warn!(workspace_id = %workspace_id, tool = call.name(), error = %e, "Tool call failed");
            ToolResult::failure(e.to_string())
        })
    }
}

fn to_value<T: serde::Serialize>(record: &T) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldmail_core::MemberRole;
    use coldmail_store::Identity;

    async fn setup() -> (Arc<Store>, String, ToolDispatcher) {
        let store = Arc::new(Store::in_memory().unwrap());
        let ws = store
            .resolve_workspace(&Identity::anonymous())
            .await
            .unwrap()
            .workspace
            .id;
        let dispatcher = ToolDispatcher::new(Arc::clone(&store));
        (store, ws, dispatcher)
    }

    #[test]
    fn test_marker_must_start_a_line() {
        assert!(parse_tool_call("Sure, here are your stats.").is_none());
        assert!(parse_tool_call(r#"I could emit TOOL_CALL: {"name":"get_stats"} later"#).is_none());
        assert!(parse_tool_call("Okay.\n  TOOL_CALL: {\"name\":\"get_stats\",\"args\":{}}").is_some());
    }

    #[test]
    fn test_trailing_text_after_json_is_ignored() {
        let reply = "TOOL_CALL: {\"name\":\"list_campaigns\",\"args\":{\"limit\":3}}\nLet me fetch those.";
        let call = parse_tool_call(reply).unwrap().unwrap();
        assert_eq!(call.name(), "list_campaigns");
    }

    #[test]
    fn test_bad_json_is_malformed() {
        let err = parse_tool_call("TOOL_CALL: {\"name\": ").unwrap().unwrap_err();
        assert!(matches!(err, ToolCallError::Malformed(_)));
        let err = parse_tool_call("TOOL_CALL: get_stats").unwrap().unwrap_err();
        assert!(matches!(err, ToolCallError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_get_stats_counts_campaigns() {
        let (store, ws, dispatcher) = setup().await;
        store
            .create_campaign(&ws, "Q1", 10, CampaignStatus::Draft)
            .await
            .unwrap();

        let result = dispatcher
            .process(&ws, r#"TOOL_CALL: {"name":"get_stats","args":{}}"#)
            .await
            .unwrap();
        assert_eq!(result.to_json(), json!({"ok": true, "campaigns": 1}));
    }

    #[tokio::test]
    async fn test_plain_reply_has_no_side_effects() {
        let (store, ws, dispatcher) = setup().await;
        assert!(dispatcher
            .process(&ws, "Create a campaign called Q1 with 10 leads?")
            .await
            .is_none());
        assert_eq!(store.count_campaigns(&ws).await.unwrap(), 0);
        assert_eq!(store.list_activity(&ws, 1, 10).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_calls_report_inline() {
        let (_store, ws, dispatcher) = setup().await;

        let unknown = dispatcher
            .process(&ws, r#"TOOL_CALL: {"name":"send_all_emails","args":{}}"#)
            .await
            .unwrap();
        assert_eq!(unknown.to_json(), json!({"ok": false, "error": "Unknown tool"}));

        let missing = dispatcher
            .process(&ws, r#"TOOL_CALL: {"name":"create_campaign","args":{"leads":5}}"#)
            .await
            .unwrap();
        assert_eq!(missing.error.as_deref(), Some("name is required"));

        let absent = dispatcher
            .process(
                &ws,
                r#"TOOL_CALL: {"name":"update_campaign_status","args":{"id":"nope","status":"Active"}}"#,
            )
            .await
            .unwrap();
        assert_eq!(absent.error.as_deref(), Some("Campaign not found"));
    }

    #[tokio::test]
    async fn test_create_and_update_campaign() {
        let (store, ws, dispatcher) = setup().await;
        let created = dispatcher
            .process(&ws, r#"TOOL_CALL: {"name":"create_campaign","args":{"name":"Fintech CFOs","leads":40}}"#)
            .await
            .unwrap();
        assert!(created.ok);
        let id = created.payload["campaign"]["id"].as_str().unwrap().to_string();
        assert_eq!(created.payload["campaign"]["status"], "Draft");

        let updated = dispatcher
            .execute(
                &ws,
                &ToolCall::from_parts("update_campaign_status", json!({"id": id, "status": "active"}))
                    .unwrap(),
            )
            .await;
        assert_eq!(updated.payload["campaign"]["status"], "Active");
        assert_eq!(store.count_campaigns(&ws).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_template_and_invite() {
        let (store, ws, dispatcher) = setup().await;
        for i in 0..4 {
            store
                .create_campaign(&ws, &format!("c{i}"), 1, CampaignStatus::Draft)
                .await
                .unwrap();
        }

        let listed = dispatcher
            .process(&ws, r#"TOOL_CALL: {"name":"list_campaigns","args":{"limit":2}}"#)
            .await
            .unwrap();
        assert_eq!(listed.payload["campaigns"].as_array().unwrap().len(), 2);

        let template = dispatcher
            .process(
                &ws,
                r#"TOOL_CALL: {"name":"create_template","args":{"name":"Intro","subject":"Hi","body":"Hello there"}}"#,
            )
            .await
            .unwrap();
        assert_eq!(template.payload["template"]["name"], "Intro");

        let invite = dispatcher
            .process(&ws, r#"TOOL_CALL: {"name":"create_invite","args":{"email":"sam@example.com"}}"#)
            .await
            .unwrap();
        assert_eq!(invite.payload["invite"]["role"], MemberRole::Member.as_str());
        assert_eq!(invite.payload["invite"]["status"], "PENDING");
        assert_eq!(store.list_invites(&ws).await.unwrap().len(), 1);
        assert_eq!(store.list_activity(&ws, 1, 10).await.unwrap().total, 0);
    }
}
