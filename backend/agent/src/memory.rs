//! Rolling conversation memory.
//!
//! Once a session has enough history, its recent window is summarised by the
//! model and the summary replaces the session's memory field.

use coldmail_core::{ChatMessage, ColdMailError, Message};
use coldmail_inference::Endpoint;
use coldmail_store::Store;
use tracing::debug;

/// Messages read back when deciding whether to summarise.
pub const SUMMARY_WINDOW: u32 = 20;
/// Minimum messages in the window before a summary is written.
pub const SUMMARY_THRESHOLD: usize = 10;

const SUMMARY_PROMPT: &str = "Summarize this conversation in at most five short sentences. \
Keep facts about the user's business, offer, audience, campaigns, and preferences. \
Reply with the summary only.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryRefresh {
    /// Fewer than [`SUMMARY_THRESHOLD`] messages; no call was made.
    BelowThreshold(usize),
    Updated(String),
    /// The model answered with nothing usable; memory left as it was.
    EmptySummary,
}

/// Summarise the session's recent window and overwrite its memory.
pub async fn refresh_memory(
    endpoint: &Endpoint,
    store: &Store,
    session_id: &str,
) -> Result<MemoryRefresh, ColdMailError> {
    let window = store.recent_messages(session_id, SUMMARY_WINDOW).await?;
    if window.len() < SUMMARY_THRESHOLD {
        return Ok(MemoryRefresh::BelowThreshold(window.len()));
    }

    let response = endpoint
        .chat(vec![
            Message::system(SUMMARY_PROMPT),
            Message::user(transcript(&window)),
        ])
        .await?;

    let summary = response.content.trim();
    if summary.is_empty() {
        return Ok(MemoryRefresh::EmptySummary);
    }

    store.set_memory(session_id, summary).await?;
    debug!(session_id = %session_id, chars = summary.len(), "Session memory refreshed");
    Ok(MemoryRefresh::Updated(summary.to_string()))
}

fn transcript(window: &[ChatMessage]) -> String {
    window
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
