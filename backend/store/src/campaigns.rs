use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use coldmail_core::{Campaign, CampaignStatus};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::{conversion, now, paging, parse_ts, ts, Page, Store};

pub const CAMPAIGN_PAGE_MIN: u32 = 5;
pub const CAMPAIGN_PAGE_MAX: u32 = 50;
pub const CAMPAIGN_PAGE_DEFAULT: u32 = 10;

const CAMPAIGN_COLUMNS: &str = "id, workspace_id, name, status, leads, created_at";

/// Dashboard listing filters. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    /// Case-insensitive substring of the campaign name.
    pub query: Option<String>,
    pub status: Option<CampaignStatus>,
    pub created_after: Option<DateTime<Utc>>,
}

impl CampaignFilter {
    fn where_clause(&self, workspace_id: &str) -> (String, Vec<SqlValue>) {
        let mut clause = String::from("workspace_id = ?");
        let mut args = vec![SqlValue::Text(workspace_id.to_string())];

        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            clause.push_str(" AND instr(lower(name), lower(?)) > 0");
            args.push(SqlValue::Text(query.to_string()));
        }
        if let Some(status) = self.status {
            clause.push_str(" AND status = ?");
            args.push(SqlValue::Text(status.as_str().to_string()));
        }
        if let Some(after) = self.created_after {
            clause.push_str(" AND created_at >= ?");
            args.push(SqlValue::Text(ts(&after)));
        }

        (clause, args)
    }
}

impl Store {
    pub async fn create_campaign(
        &self,
        workspace_id: &str,
        name: &str,
        leads: u32,
        status: CampaignStatus,
    ) -> Result<Campaign> {
        let conn = self.conn.lock().await;
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO campaigns (id, workspace_id, name, status, leads, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, workspace_id, name, status.as_str(), leads, now()],
        )
        .context("Failed to create campaign")?;

        debug!(workspace_id = %workspace_id, campaign_id = %id, "Campaign created");
        find_campaign(&conn, workspace_id, &id)?.context("Campaign vanished after insert")
    }

    /// Change a campaign's status. `None` when the id is not in this workspace.
    pub async fn update_campaign_status(
        &self,
        workspace_id: &str,
        id: &str,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE campaigns SET status = ?1 WHERE id = ?2 AND workspace_id = ?3",
            params![status.as_str(), id, workspace_id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        find_campaign(&conn, workspace_id, id)
    }

    pub async fn delete_campaign(&self, workspace_id: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM campaigns WHERE id = ?1 AND workspace_id = ?2",
            params![id, workspace_id],
        )?;
        Ok(deleted > 0)
    }

    /// Filtered, newest-first page of campaigns.
    pub async fn list_campaigns(
        &self,
        workspace_id: &str,
        filter: &CampaignFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Campaign>> {
        let (page, page_size, offset) =
            paging(page, page_size, CAMPAIGN_PAGE_MIN, CAMPAIGN_PAGE_MAX);
        let (clause, args) = filter.where_clause(workspace_id);
        let conn = self.conn.lock().await;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM campaigns WHERE {clause}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE {clause}
             ORDER BY created_at DESC, rowid DESC LIMIT {page_size} OFFSET {offset}"
        ))?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), row_to_campaign)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list campaigns")?;

        Ok(Page::new(items, page, page_size, total.max(0) as u64))
    }

    /// The `limit` most recently created campaigns.
    pub async fn recent_campaigns(&self, workspace_id: &str, limit: u32) -> Result<Vec<Campaign>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE workspace_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let items = stmt
            .query_map(params![workspace_id, limit], row_to_campaign)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load recent campaigns")?;
        Ok(items)
    }

    /// Every campaign in the workspace, for aggregate stats.
    pub async fn all_campaigns(&self, workspace_id: &str) -> Result<Vec<Campaign>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE workspace_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let items = stmt
            .query_map(params![workspace_id], row_to_campaign)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load campaigns")?;
        Ok(items)
    }

    pub async fn count_campaigns(&self, workspace_id: &str) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM campaigns WHERE workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

fn find_campaign(conn: &Connection, workspace_id: &str, id: &str) -> Result<Option<Campaign>> {
    conn.query_row(
        &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1 AND workspace_id = ?2"),
        params![id, workspace_id],
        row_to_campaign,
    )
    .optional()
    .context("Failed to load campaign")
}

fn row_to_campaign(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(5)?;
    Ok(Campaign {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        status: status.parse().map_err(|e: String| conversion(3, e))?,
        leads: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}
