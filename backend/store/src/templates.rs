use anyhow::{Context, Result};
use coldmail_core::Template;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::{now, parse_ts, Store};

const TEMPLATE_COLUMNS: &str = "id, workspace_id, name, subject, body, created_at, updated_at";

/// Partial update; `None` and blank fields leave the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl Store {
    pub async fn create_template(
        &self,
        workspace_id: &str,
        name: &str,
        subject: &str,
        body: &str,
    ) -> Result<Template> {
        let conn = self.conn.lock().await;
        let id = Uuid::new_v4().to_string();
        let stamp = now();
        conn.execute(
            "INSERT INTO templates (id, workspace_id, name, subject, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, workspace_id, name, subject, body, stamp],
        )
        .context("Failed to create template")?;
        find_template(&conn, workspace_id, &id)?.context("Template vanished after insert")
    }

    pub async fn list_templates(&self, workspace_id: &str) -> Result<Vec<Template>> {
        self.query_templates(workspace_id, None).await
    }

    pub async fn recent_templates(&self, workspace_id: &str, limit: u32) -> Result<Vec<Template>> {
        self.query_templates(workspace_id, Some(limit)).await
    }

    async fn query_templates(&self, workspace_id: &str, limit: Option<u32>) -> Result<Vec<Template>> {
        let conn = self.conn.lock().await;
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = conn.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE workspace_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let templates = stmt
            .query_map(params![workspace_id, limit], row_to_template)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list templates")?;
        Ok(templates)
    }

    pub async fn get_template(&self, workspace_id: &str, id: &str) -> Result<Option<Template>> {
        let conn = self.conn.lock().await;
        find_template(&conn, workspace_id, id)
    }

    /// Apply a partial update. `None` when the template is not in this workspace.
    pub async fn update_template(
        &self,
        workspace_id: &str,
        id: &str,
        patch: &TemplatePatch,
    ) -> Result<Option<Template>> {
        let conn = self.conn.lock().await;
        let keep = |v: &Option<String>| v.as_deref().filter(|s| !s.trim().is_empty()).map(str::to_string);
        let updated = conn.execute(
            "UPDATE templates SET
                name = COALESCE(?1, name),
                subject = COALESCE(?2, subject),
                body = COALESCE(?3, body),
                updated_at = ?4
             WHERE id = ?5 AND workspace_id = ?6",
            params![
                keep(&patch.name),
                keep(&patch.subject),
                keep(&patch.body),
                now(),
                id,
                workspace_id
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        find_template(&conn, workspace_id, id)
    }

    pub async fn delete_template(&self, workspace_id: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM templates WHERE id = ?1 AND workspace_id = ?2",
            params![id, workspace_id],
        )?;
        Ok(deleted > 0)
    }

    pub async fn count_templates(&self, workspace_id: &str) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM templates WHERE workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

fn find_template(conn: &Connection, workspace_id: &str, id: &str) -> Result<Option<Template>> {
    conn.query_row(
        &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1 AND workspace_id = ?2"),
        params![id, workspace_id],
        row_to_template,
    )
    .optional()
    .context("Failed to load template")
}

fn row_to_template(row: &Row<'_>) -> rusqlite::Result<Template> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Template {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
        updated_at: parse_ts(6, &updated_at)?,
    })
}
