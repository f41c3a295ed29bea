use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use coldmail_core::{Invite, InviteStatus, MemberRole};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::activity::insert_activity;
use crate::workspaces::{insert_member, upsert_user};
use crate::{conversion, now, parse_opt_ts, parse_ts, ts, Store};

pub const DEFAULT_INVITE_DAYS: i64 = 7;
pub const MAX_INVITE_DAYS: i64 = 365;

const INVITE_COLUMNS: &str = "id, workspace_id, email, role, token, status, expires_at, created_at";

/// Result of redeeming an invite token.
#[derive(Debug, Clone, PartialEq)]
pub enum InviteOutcome {
    Accepted(Invite),
    NotFound,
    /// The invite was already accepted, revoked, or expired.
    Inactive,
    /// Past its expiry; the invite is marked `EXPIRED` as a side effect.
    Expired,
}

impl Store {
    /// Issue a pending invite and record it in the activity log.
    pub async fn create_invite(
        &self,
        workspace_id: &str,
        email: &str,
        role: MemberRole,
        expires_in_days: i64,
    ) -> Result<Invite> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let invite = insert_invite(&tx, workspace_id, email, role, expires_in_days)?;
        insert_activity(
            &tx,
            workspace_id,
            "workspace.invite_created",
            &json!({ "email": email, "role": role.as_str() }),
        )?;
        tx.commit()?;

        info!(workspace_id = %workspace_id, invite_id = %invite.id, "Invite created");
        Ok(invite)
    }

    /// Issue a pending invite with the default expiry. Writes only the invite row.
    pub async fn issue_invite(
        &self,
        workspace_id: &str,
        email: &str,
        role: MemberRole,
    ) -> Result<Invite> {
        let conn = self.conn.lock().await;
        let invite = insert_invite(&conn, workspace_id, email, role, DEFAULT_INVITE_DAYS)?;
        info!(workspace_id = %workspace_id, invite_id = %invite.id, "Invite issued");
        Ok(invite)
    }

    pub async fn list_invites(&self, workspace_id: &str) -> Result<Vec<Invite>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INVITE_COLUMNS} FROM workspace_invites WHERE workspace_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let invites = stmt
            .query_map(params![workspace_id], row_to_invite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list invites")?;
        Ok(invites)
    }

    /// Revoke an invite belonging to the workspace. `None` when no such token exists there.
    pub async fn revoke_invite(&self, workspace_id: &str, token: &str) -> Result<Option<Invite>> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE workspace_invites SET status = ?1 WHERE workspace_id = ?2 AND token = ?3",
            params![InviteStatus::Revoked.as_str(), workspace_id, token],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        find_by_token(&conn, token)
    }

    /// Redeem an invite token for `email`, adding them to the invite's workspace.
    ///
    /// Tokens are global, so acceptance is not scoped to the caller's workspace.
    pub async fn accept_invite(&self, token: &str, email: &str) -> Result<InviteOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let Some(invite) = find_by_token(&tx, token)? else {
            return Ok(InviteOutcome::NotFound);
        };
        if invite.status != InviteStatus::Pending {
            return Ok(InviteOutcome::Inactive);
        }
        if invite.expires_at.is_some_and(|at| at < Utc::now()) {
            tx.execute(
                "UPDATE workspace_invites SET status = ?1 WHERE id = ?2",
                params![InviteStatus::Expired.as_str(), invite.id],
            )?;
            tx.commit()?;
            return Ok(InviteOutcome::Expired);
        }

        let user = upsert_user(&tx, email, None)?;
        insert_member(&tx, &invite.workspace_id, &user.id, invite.role)?;
        tx.execute(
            "UPDATE workspace_invites SET status = ?1 WHERE id = ?2",
            params![InviteStatus::Accepted.as_str(), invite.id],
        )?;
        insert_activity(
            &tx,
            &invite.workspace_id,
            "workspace.invite_accepted",
            &json!({ "email": email }),
        )?;

        let accepted = find_by_id(&tx, &invite.id)?.context("Invite vanished after accept")?;
        tx.commit()?;

        info!(workspace_id = %accepted.workspace_id, user_id = %user.id, "Invite accepted");
        Ok(InviteOutcome::Accepted(accepted))
    }
}

/// Expiry `days` from now, or `None` when it cannot be represented.
pub fn invite_expiry(days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|span| Utc::now().checked_add_signed(span))
}

fn insert_invite(
    conn: &Connection,
    workspace_id: &str,
    email: &str,
    role: MemberRole,
    expires_in_days: i64,
) -> Result<Invite> {
    let expires_at = invite_expiry(expires_in_days)
        .with_context(|| format!("Invite expiry of {expires_in_days} days is out of range"))?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO workspace_invites (id, workspace_id, email, role, token, status, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            workspace_id,
            email,
            role.as_str(),
            Uuid::new_v4().to_string(),
            InviteStatus::Pending.as_str(),
            ts(&expires_at),
            now(),
        ],
    )
    .context("Failed to create invite")?;

    find_by_id(conn, &id)?.context("Invite vanished after insert")
}

fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Invite>> {
    conn.query_row(
        &format!("SELECT {INVITE_COLUMNS} FROM workspace_invites WHERE id = ?1"),
        params![id],
        row_to_invite,
    )
    .optional()
    .context("Failed to load invite")
}

fn find_by_token(conn: &Connection, token: &str) -> Result<Option<Invite>> {
    conn.query_row(
        &format!("SELECT {INVITE_COLUMNS} FROM workspace_invites WHERE token = ?1"),
        params![token],
        row_to_invite,
    )
    .optional()
    .context("Failed to load invite")
}

fn row_to_invite(row: &Row<'_>) -> rusqlite::Result<Invite> {
    let role: String = row.get(3)?;
    let status: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    Ok(Invite {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        email: row.get(2)?,
        role: role.parse().map_err(|e: String| conversion(3, e))?,
        token: row.get(4)?,
        status: status.parse().map_err(|e: String| conversion(5, e))?,
        expires_at: parse_opt_ts(6, row.get(6)?)?,
        created_at: parse_ts(7, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identity;

    async fn setup() -> (Store, String) {
        let store = Store::in_memory().unwrap();
        let ctx = store.resolve_workspace(&Identity::anonymous()).await.unwrap();
        (store, ctx.workspace.id)
    }

    #[tokio::test]
    async fn test_create_logs_activity() {
        let (store, ws) = setup().await;
        let invite = store
            .create_invite(&ws, "eve@example.com", MemberRole::Member, DEFAULT_INVITE_DAYS)
            .await
            .unwrap();

        assert_eq!(invite.status, InviteStatus::Pending);
        assert!(invite.expires_at.unwrap() > Utc::now() + Duration::days(6));

        let activity = store.list_activity(&ws, 1, 10).await.unwrap();
        assert_eq!(activity.items[0].action, "workspace.invite_created");
        assert_eq!(activity.items[0].metadata["role"], "MEMBER");
        assert_eq!(store.list_invites(&ws).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_issue_writes_only_the_invite() {
        let (store, ws) = setup().await;
        let invite = store
            .issue_invite(&ws, "sam@example.com", MemberRole::Admin)
            .await
            .unwrap();

        assert_eq!(invite.role, MemberRole::Admin);
        assert!(invite.expires_at.unwrap() > Utc::now() + Duration::days(6));
        assert_eq!(store.list_activity(&ws, 1, 10).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_is_an_error() {
        let (store, ws) = setup().await;
        assert!(invite_expiry(9_000_000_000_000).is_none());
        assert!(invite_expiry(i64::MAX).is_none());

        let err = store
            .create_invite(&ws, "eve@example.com", MemberRole::Member, 9_000_000_000_000)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(store.list_invites(&ws).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accept_adds_member_once() {
        let (store, ws) = setup().await;
        let invite = store
            .create_invite(&ws, "eve@example.com", MemberRole::Admin, DEFAULT_INVITE_DAYS)
            .await
            .unwrap();

        let outcome = store.accept_invite(&invite.token, "eve@example.com").await.unwrap();
        let InviteOutcome::Accepted(accepted) = outcome else {
            panic!("expected acceptance, got {outcome:?}");
        };
        assert_eq!(accepted.status, InviteStatus::Accepted);

        let members = store.list_members(&ws).await.unwrap();
        assert!(members
            .iter()
            .any(|m| m.role == MemberRole::Admin && m.user.as_ref().unwrap().email == "eve@example.com"));

        let again = store.accept_invite(&invite.token, "eve@example.com").await.unwrap();
        assert_eq!(again, InviteOutcome::Inactive);
    }

    #[tokio::test]
    async fn test_expired_invite_is_marked() {
        let (store, ws) = setup().await;
        let invite = store
            .create_invite(&ws, "late@example.com", MemberRole::Member, -1)
            .await
            .unwrap();

        let outcome = store.accept_invite(&invite.token, "late@example.com").await.unwrap();
        assert_eq!(outcome, InviteOutcome::Expired);
        let invites = store.list_invites(&ws).await.unwrap();
        assert_eq!(invites[0].status, InviteStatus::Expired);
    }

    #[tokio::test]
    async fn test_revoke_and_unknown_token() {
        let (store, ws) = setup().await;
        let invite = store
            .create_invite(&ws, "x@example.com", MemberRole::Member, DEFAULT_INVITE_DAYS)
            .await
            .unwrap();

        let revoked = store.revoke_invite(&ws, &invite.token).await.unwrap().unwrap();
        assert_eq!(revoked.status, InviteStatus::Revoked);
        assert!(store.revoke_invite(&ws, "nope").await.unwrap().is_none());
        assert_eq!(
            store.accept_invite("nope", "x@example.com").await.unwrap(),
            InviteOutcome::NotFound
        );
    }
}
