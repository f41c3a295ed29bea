use anyhow::{Context, Result};
use coldmail_core::ActivityEntry;
use rusqlite::{params, Connection, Row};
use serde_json::Value;

use crate::{now, paging, parse_ts, Page, Store};

pub const ACTIVITY_PAGE_MIN: u32 = 10;
pub const ACTIVITY_PAGE_MAX: u32 = 50;
pub const ACTIVITY_PAGE_DEFAULT: u32 = 20;

impl Store {
    /// Append an audit entry for the workspace.
    pub async fn log_activity(&self, workspace_id: &str, action: &str, metadata: Value) -> Result<()> {
        let conn = self.conn.lock().await;
        insert_activity(&conn, workspace_id, action, &metadata)
    }

    /// Newest-first page of the activity log.
    pub async fn list_activity(
        &self,
        workspace_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<ActivityEntry>> {
        let (page, page_size, offset) =
            paging(page, page_size, ACTIVITY_PAGE_MIN, ACTIVITY_PAGE_MAX);
        let conn = self.conn.lock().await;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM activity_log WHERE workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, action, metadata, created_at FROM activity_log
             WHERE workspace_id = ?1
             ORDER BY id DESC LIMIT ?2 OFFSET ?3",
        )?;
        let items = stmt
            .query_map(params![workspace_id, page_size, offset], row_to_activity)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list activity")?;

        Ok(Page::new(items, page, page_size, total.max(0) as u64))
    }
}

pub(crate) fn insert_activity(
    conn: &Connection,
    workspace_id: &str,
    action: &str,
    metadata: &Value,
) -> Result<()> {
    conn.execute(
        "INSERT INTO activity_log (workspace_id, action, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![workspace_id, action, metadata.to_string(), now()],
    )
    .with_context(|| format!("Failed to log activity {action}"))?;
    Ok(())
}

fn row_to_activity(row: &Row<'_>) -> rusqlite::Result<ActivityEntry> {
    let metadata: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(ActivityEntry {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        action: row.get(2)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
        created_at: parse_ts(4, &created_at)?,
    })
}
