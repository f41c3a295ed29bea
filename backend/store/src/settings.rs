use anyhow::{Context, Result};
use coldmail_core::WorkspaceSettings;
use rusqlite::{params, OptionalExtension};

use crate::Store;

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Store {
    /// Stored inference override for the workspace, if any.
    pub async fn get_settings(&self, workspace_id: &str) -> Result<Option<WorkspaceSettings>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT workspace_id, base_url, model, api_key FROM workspace_settings WHERE workspace_id = ?1",
            params![workspace_id],
            |row| {
                Ok(WorkspaceSettings {
                    workspace_id: row.get(0)?,
                    base_url: row.get(1)?,
                    model: row.get(2)?,
                    api_key: row.get(3)?,
                })
            },
        )
        .optional()
        .context("Failed to load workspace settings")
    }

    /// Replace the override. Blank fields are stored as unset.
    pub async fn put_settings(&self, settings: &WorkspaceSettings) -> Result<WorkspaceSettings> {
        let stored = WorkspaceSettings {
            workspace_id: settings.workspace_id.clone(),
            base_url: blank_to_none(&settings.base_url).map(|u| u.trim_end_matches('/').to_string()),
            model: blank_to_none(&settings.model).map(str::to_string),
            api_key: blank_to_none(&settings.api_key).map(str::to_string),
        };

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO workspace_settings (workspace_id, base_url, model, api_key)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(workspace_id) DO UPDATE SET
                base_url = excluded.base_url,
                model = excluded.model,
                api_key = excluded.api_key",
            params![stored.workspace_id, stored.base_url, stored.model, stored.api_key],
        )
        .context("Failed to save workspace settings")?;
        Ok(stored)
    }
}
