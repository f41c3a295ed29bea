//! SQLite-backed persistence for ColdMail.
//!
//! One `Store` owns a single connection behind an async mutex. Every record is
//! scoped to a workspace; chat messages are an append-only log ordered by
//! their autoincrement id.

pub mod activity;
pub mod billing;
pub mod campaigns;
pub mod chat;
pub mod invites;
pub mod schema;
pub mod settings;
pub mod templates;
pub mod workspaces;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

pub use billing::{month_period, PaymentUpdate, MONTHLY_EMAIL_LIMIT};
pub use campaigns::CampaignFilter;
pub use invites::InviteOutcome;
pub use templates::TemplatePatch;
pub use workspaces::{Identity, WorkspaceContext, DEFAULT_USER_ID, DEFAULT_WORKSPACE_ID};

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to configure SQLite connection")?;
        let store = Self::from_connection(conn)?;
        info!(path = ?path.as_ref(), "Store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(schema::SCHEMA)
            .context("Failed to initialize schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// One page of a listing plus the totals needed to render pagination.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, page: u32, page_size: u32, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(u64::from(page_size))
        };
        Self {
            items,
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    ts(&Utc::now())
}

pub(crate) fn parse_ts(col: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_ts(col: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|r| parse_ts(col, &r)).transpose()
}

pub(crate) fn conversion(col: usize, message: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, message.into().into())
}

/// Clamp `page`/`page_size` the way list endpoints expect and compute the offset.
///
/// The offset is widened to `i64` (SQLite's integer) so any `u32` page is representable.
pub(crate) fn paging(page: u32, page_size: u32, min: u32, max: u32) -> (u32, u32, i64) {
    let page = page.max(1);
    let page_size = page_size.clamp(min, max);
    (page, page_size, i64::from(page - 1) * i64::from(page_size))
}
