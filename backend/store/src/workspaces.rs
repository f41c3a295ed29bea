use anyhow::{Context, Result};
use coldmail_core::{Member, MemberRole, User, Workspace};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::{conversion, now, parse_ts, Store};

pub const DEFAULT_WORKSPACE_ID: &str = "default-workspace";
pub const DEFAULT_USER_ID: &str = "default-user";

const DEFAULT_WORKSPACE_NAME: &str = "Default Workspace";
const DEFAULT_USER_NAME: &str = "Owner";
const DEFAULT_USER_EMAIL: &str = "owner@local.dev";

/// Who is calling, as asserted by the upstream auth proxy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: Some(email.into()),
            name,
        }
    }
}

/// The workspace every request is scoped to, plus the resolved user.
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    pub workspace: Workspace,
    pub user: Option<User>,
}

impl Store {
    /// Map an identity onto a workspace, creating whatever is missing.
    ///
    /// Anonymous callers share the default workspace. A signed-in user is
    /// upserted by email and lands in their first membership, or in a fresh
    /// private workspace they own.
    pub async fn resolve_workspace(&self, identity: &Identity) -> Result<WorkspaceContext> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        let email = identity
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());

        let context = match email {
            None => ensure_default_workspace(&tx)?,
            Some(email) => {
                let name = identity
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty());
                let user = upsert_user(&tx, email, name)?;

                let workspace = match first_workspace_for(&tx, &user.id)? {
                    Some(workspace) => workspace,
                    None => {
                        let label = name.unwrap_or(email);
                        let workspace = insert_workspace(
                            &tx,
                            &Uuid::new_v4().to_string(),
                            &format!("{label}'s Workspace"),
                        )?;
                        insert_member(&tx, &workspace.id, &user.id, MemberRole::Owner)?;
                        info!(workspace_id = %workspace.id, user_id = %user.id, "Created workspace for new user");
                        workspace
                    }
                };

                WorkspaceContext {
                    workspace,
                    user: Some(user),
                }
            }
        };

        tx.commit().context("Failed to commit workspace resolution")?;
        Ok(context)
    }

    pub async fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, name, is_private, created_at FROM workspaces WHERE id = ?1",
            params![workspace_id],
            row_to_workspace,
        )
        .optional()
        .context("Failed to load workspace")
    }

    /// Members of a workspace with their user records, newest membership first.
    pub async fn list_members(&self, workspace_id: &str) -> Result<Vec<Member>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT m.workspace_id, m.user_id, m.role, m.created_at, u.email, u.name
             FROM workspace_members m JOIN users u ON u.id = m.user_id
             WHERE m.workspace_id = ?1
             ORDER BY m.created_at DESC",
        )?;

        let members = stmt
            .query_map(params![workspace_id], |row| {
                let role: String = row.get(2)?;
                let created_at: String = row.get(3)?;
                let user_id: String = row.get(1)?;
                Ok(Member {
                    workspace_id: row.get(0)?,
                    role: role.parse().map_err(|e: String| conversion(2, e))?,
                    created_at: parse_ts(3, &created_at)?,
                    user: Some(User {
                        id: user_id.clone(),
                        email: row.get(4)?,
                        name: row.get(5)?,
                    }),
                    user_id,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list members")?;

        Ok(members)
    }
}

fn ensure_default_workspace(tx: &Transaction<'_>) -> Result<WorkspaceContext> {
    tx.execute(
        "INSERT OR IGNORE INTO workspaces (id, name, is_private, created_at) VALUES (?1, ?2, 1, ?3)",
        params![DEFAULT_WORKSPACE_ID, DEFAULT_WORKSPACE_NAME, now()],
    )?;
    tx.execute(
        "INSERT OR IGNORE INTO users (id, email, name) VALUES (?1, ?2, ?3)",
        params![DEFAULT_USER_ID, DEFAULT_USER_EMAIL, DEFAULT_USER_NAME],
    )?;
    tx.execute(
        "INSERT OR IGNORE INTO workspace_members (workspace_id, user_id, role, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![DEFAULT_WORKSPACE_ID, DEFAULT_USER_ID, MemberRole::Owner.as_str(), now()],
    )?;

    let workspace = tx
        .query_row(
            "SELECT id, name, is_private, created_at FROM workspaces WHERE id = ?1",
            params![DEFAULT_WORKSPACE_ID],
            row_to_workspace,
        )
        .context("Failed to load default workspace")?;
    let user = tx
        .query_row(
            "SELECT id, email, name FROM users WHERE id = ?1",
            params![DEFAULT_USER_ID],
            row_to_user,
        )
        .optional()?;

    Ok(WorkspaceContext { workspace, user })
}

pub(crate) fn upsert_user(tx: &Transaction<'_>, email: &str, name: Option<&str>) -> Result<User> {
    let fallback = email.split('@').next().unwrap_or(email);
    tx.execute(
        "INSERT INTO users (id, email, name) VALUES (?1, ?2, ?3)
         ON CONFLICT(email) DO UPDATE SET name = COALESCE(?4, users.name)",
        params![Uuid::new_v4().to_string(), email, name.unwrap_or(fallback), name],
    )
    .context("Failed to upsert user")?;

    tx.query_row(
        "SELECT id, email, name FROM users WHERE email = ?1",
        params![email],
        row_to_user,
    )
    .context("Failed to load user")
}

fn first_workspace_for(tx: &Transaction<'_>, user_id: &str) -> Result<Option<Workspace>> {
    tx.query_row(
        "SELECT w.id, w.name, w.is_private, w.created_at
         FROM workspace_members m JOIN workspaces w ON w.id = m.workspace_id
         WHERE m.user_id = ?1
         ORDER BY m.created_at ASC LIMIT 1",
        params![user_id],
        row_to_workspace,
    )
    .optional()
    .context("Failed to look up membership")
}

fn insert_workspace(tx: &Transaction<'_>, id: &str, name: &str) -> Result<Workspace> {
    tx.execute(
        "INSERT INTO workspaces (id, name, is_private, created_at) VALUES (?1, ?2, 1, ?3)",
        params![id, name, now()],
    )
    .context("Failed to create workspace")?;
    tx.query_row(
        "SELECT id, name, is_private, created_at FROM workspaces WHERE id = ?1",
        params![id],
        row_to_workspace,
    )
    .context("Failed to load created workspace")
}

pub(crate) fn insert_member(
    tx: &Transaction<'_>,
    workspace_id: &str,
    user_id: &str,
    role: MemberRole,
) -> Result<()> {
    tx.execute(
        "INSERT INTO workspace_members (workspace_id, user_id, role, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(workspace_id, user_id) DO UPDATE SET role = excluded.role",
        params![workspace_id, user_id, role.as_str(), now()],
    )
    .context("Failed to insert member")?;
    Ok(())
}

fn row_to_workspace(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    let created_at: String = row.get(3)?;
    Ok(Workspace {
        id: row.get(0)?,
        name: row.get(1)?,
        is_private: row.get(2)?,
        created_at: parse_ts(3, &created_at)?,
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
    })
}
