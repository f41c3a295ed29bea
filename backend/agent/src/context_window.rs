//! Conversation window sent to the inference endpoint.

use coldmail_core::{ChatMessage, Message, Role};

/// Most recent messages forwarded as conversation context.
pub const CONTEXT_MESSAGES: usize = 8;

pub struct ContextWindow {
    pub messages: Vec<Message>,
}

impl ContextWindow {
    /// System prompt followed by the last `max_messages` of `history`.
    ///
    /// `history` is oldest first. Stored system turns are not replayed, since
    /// the fresh system prompt replaces them.
    pub fn build(system_prompt: String, history: &[ChatMessage], max_messages: usize) -> Self {
        let turns: Vec<&ChatMessage> = history.iter().filter(|m| m.role != Role::System).collect();
        let start = turns.len().saturating_sub(max_messages);

        let mut messages = Vec::with_capacity(max_messages + 1);
        messages.push(Message::system(system_prompt));
        messages.extend(
            turns[start..]
                .iter()
                .map(|m| Message::new(m.role, m.content.clone())),
        );

        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn history(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| ChatMessage {
                id: i as i64,
                session_id: "s".into(),
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("m{i}"),
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_keeps_last_eight_plus_system() {
        let window = ContextWindow::build("sys".into(), &history(20), CONTEXT_MESSAGES);
        assert_eq!(window.len(), CONTEXT_MESSAGES + 1);
        assert_eq!(window.messages[0], Message::system("sys"));
        assert_eq!(window.messages[1].content, "m12");
        assert_eq!(window.messages[8].content, "m19");
    }

    #[test]
    fn test_short_history_is_kept_whole() {
        let window = ContextWindow::build("sys".into(), &history(3), CONTEXT_MESSAGES);
        assert_eq!(window.len(), 4);
        assert_eq!(window.into_messages()[1].content, "m0");
    }
}
