//! System prompt assembly.
//!
//! The prompt is a concatenation of fixed blocks chosen by intent, followed by
//! a plain-text snapshot of the workspace. Building it never touches storage;
//! the snapshot is fetched beforehand.

use std::fmt::Write as _;

use anyhow::Result;
use coldmail_core::tools::TOOL_NAMES;
use coldmail_core::{Campaign, ClassificationResult, Intent, Template};
use coldmail_store::Store;

/// Campaigns and templates listed in the context block.
pub const SNAPSHOT_RECORDS: u32 = 5;

/// Marker that introduces a tool-call directive in a model reply.
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";

const BASE_BLOCK: &str = "You are ColdMail's outreach assistant.
Think step by step before answering.
Be clear, practical, and structured.";

const CLARIFY_BLOCK: &str = "If the question is unclear, ask ONE clarifying question before answering.";

const DEBUG_BLOCK: &str = "You are a senior software engineer.
Debug logically:
1. Identify the problem
2. Ask for missing info
3. Suggest fixes";

const REACT_BLOCK: &str = "You are a React mentor.
Use simple explanations and small code examples.";

const CODE_BLOCK: &str = "Only return correct, minimal code.
No long explanations.";

const DESIGN_BLOCK: &str = "Explain architecture using steps or diagrams (text-based).";

const GENERAL_BLOCK: &str = "If unsure what the user means, ask a clarifying question first.";

/// Workspace records the assistant can see, already fetched.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceSnapshot {
    pub campaigns: Vec<Campaign>,
    pub templates: Vec<Template>,
    pub campaign_count: u64,
    pub template_count: u64,
    pub memory: String,
}

impl WorkspaceSnapshot {
    pub async fn load(store: &Store, workspace_id: &str, memory: String) -> Result<Self> {
        Ok(Self {
            campaigns: store.recent_campaigns(workspace_id, SNAPSHOT_RECORDS).await?,
            templates: store.recent_templates(workspace_id, SNAPSHOT_RECORDS).await?,
            campaign_count: store.count_campaigns(workspace_id).await?,
            template_count: store.count_templates(workspace_id).await?,
            memory,
        })
    }
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Assemble the system prompt for one chat turn.
    pub fn build(classification: &ClassificationResult, snapshot: &WorkspaceSnapshot) -> String {
        let mut blocks = vec![BASE_BLOCK.to_string()];

        if classification.confidence < 1 {
            blocks.push(CLARIFY_BLOCK.to_string());
        }
        if let Some(block) = Self::intent_block(classification.intent) {
            blocks.push(block.to_string());
        }
        blocks.push(Self::tool_block());
        blocks.push(Self::context_block(snapshot));

        blocks.join("\n\n")
    }

    /// `explain` shapes nothing beyond the base block.
    fn intent_block(intent: Intent) -> Option<&'static str> {
        match intent {
            Intent::Debug => Some(DEBUG_BLOCK),
            Intent::React => Some(REACT_BLOCK),
            Intent::Code => Some(CODE_BLOCK),
            Intent::Design => Some(DESIGN_BLOCK),
            Intent::General => Some(GENERAL_BLOCK),
            Intent::Explain => None,
        }
    }

    fn tool_block() -> String {
        format!(
            "You can act on the user's workspace. To do so, reply with a single line:
{TOOL_CALL_MARKER} {{\"name\": \"<tool>\", \"args\": {{...}}}}
Available tools: {tools}.
- create_campaign {{name, leads?}}
- update_campaign_status {{id, status: Draft|Active|Paused|Completed}}
- list_campaigns {{limit?}}
- create_template {{name, subject, body}}
- get_stats {{}}
- create_invite {{email, role?: OWNER|ADMIN|MEMBER}}
Only emit a tool call when the user asks for one of these actions.",
            tools = TOOL_NAMES.join(", ")
        )
    }

    fn context_block(snapshot: &WorkspaceSnapshot) -> String {
        let mut out = String::from("Workspace context:\n");

        let _ = writeln!(
            out,
            "Totals: {} campaigns, {} templates.",
            snapshot.campaign_count, snapshot.template_count
        );

        if snapshot.campaigns.is_empty() {
            out.push_str("Recent campaigns: none\n");
        } else {
            out.push_str("Recent campaigns:\n");
            for c in &snapshot.campaigns {
                let _ = writeln!(out, "- {} (id {}, {}, {} leads)", c.name, c.id, c.status, c.leads);
            }
        }

        if snapshot.templates.is_empty() {
            out.push_str("Recent templates: none\n");
        } else {
            out.push_str("Recent templates:\n");
            for t in &snapshot.templates {
                let _ = writeln!(out, "- {} (subject: {})", t.name, t.subject);
            }
        }

        let memory = snapshot.memory.trim();
        if memory.is_empty() {
            out.push_str("Conversation memory: none");
        } else {
            let _ = write!(out, "Conversation memory: {memory}");
        }

        out
    }
}
