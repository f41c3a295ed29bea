use anyhow::{Context, Result};
use coldmail_core::{ChatMessage, ChatSession, Role};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::{conversion, now, parse_ts, Store};

impl Store {
    /// Reuse `session_id` when it exists in this workspace, otherwise start a new session.
    ///
    /// An unknown or foreign id never fails; the caller simply gets a fresh session.
    pub async fn get_or_create_session(
        &self,
        workspace_id: &str,
        session_id: Option<&str>,
    ) -> Result<ChatSession> {
        let conn = self.conn.lock().await;

        if let Some(id) = session_id.filter(|id| !id.is_empty()) {
            if let Some(existing) = find_session(&conn, workspace_id, id)? {
                return Ok(existing);
            }
        }

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO chat_sessions (id, workspace_id, memory, created_at) VALUES (?1, ?2, '', ?3)",
            params![id, workspace_id, now()],
        )
        .context("Failed to create chat session")?;
        debug!(workspace_id = %workspace_id, session_id = %id, "Chat session created");

        find_session(&conn, workspace_id, &id)?.context("Chat session vanished after insert")
    }

    pub async fn append_message(&self, session_id: &str, role: Role, content: &str) -> Result<ChatMessage> {
        let conn = self.conn.lock().await;
        let created_at = now();
        conn.execute(
            "INSERT INTO chat_messages (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, role.as_str(), content, created_at],
        )
        .context("Failed to append chat message")?;

        Ok(ChatMessage {
            id: conn.last_insert_rowid(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: parse_ts(0, &created_at)?,
        })
    }

    /// The `limit` newest messages, returned oldest first.
    pub async fn recent_messages(&self, session_id: &str, limit: u32) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, role, content, created_at FROM chat_messages
             WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut messages = stmt
            .query_map(params![session_id, limit], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load chat messages")?;
        messages.reverse();
        Ok(messages)
    }

    /// The session's rolling summary; empty when none has been written.
    pub async fn get_memory(&self, session_id: &str) -> Result<String> {
        let conn = self.conn.lock().await;
        let memory: Option<String> = conn
            .query_row(
                "SELECT memory FROM chat_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(memory.unwrap_or_default())
    }

    /// Overwrite the session summary.
    pub async fn set_memory(&self, session_id: &str, memory: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE chat_sessions SET memory = ?1 WHERE id = ?2",
            params![memory, session_id],
        )
        .context("Failed to update session memory")?;
        Ok(())
    }
}

fn find_session(conn: &Connection, workspace_id: &str, id: &str) -> Result<Option<ChatSession>> {
    conn.query_row(
        "SELECT id, workspace_id, memory, created_at FROM chat_sessions WHERE id = ?1 AND workspace_id = ?2",
        params![id, workspace_id],
        |row| {
            let created_at: String = row.get(3)?;
            Ok(ChatSession {
                id: row.get(0)?,
                workspace_id: row.get(1)?,
                memory: row.get(2)?,
                created_at: parse_ts(3, &created_at)?,
            })
        },
    )
    .optional()
    .context("Failed to load chat session")
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role: String = row.get(2)?;
    let created_at: String = row.get(4)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: role.parse().map_err(|e: String| conversion(2, e))?,
        content: row.get(3)?,
        created_at: parse_ts(4, &created_at)?,
    })
}
