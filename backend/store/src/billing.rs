use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use coldmail_core::{Billing, Usage};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::{parse_opt_ts, parse_ts, ts, Store};

pub const MONTHLY_EMAIL_LIMIT: u32 = 500;
pub const PAYSTACK_PROVIDER: &str = "PAYSTACK";
pub const PREMIUM_PLAN: &str = "Premium";

/// Billing fields carried by a verified payment notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentUpdate {
    pub status: String,
    pub customer_code: Option<String>,
    pub subscription_code: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Store {
    pub async fn get_billing(&self, workspace_id: &str) -> Result<Option<Billing>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT workspace_id, provider, plan_name, status, customer_code, subscription_code, current_period_end
             FROM billing WHERE workspace_id = ?1",
            params![workspace_id],
            row_to_billing,
        )
        .optional()
        .context("Failed to load billing")
    }

    /// Record a premium payment for a workspace, creating the billing row if needed.
    pub async fn upsert_paystack_billing(&self, workspace_id: &str, update: &PaymentUpdate) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO billing (workspace_id, provider, plan_name, status, customer_code, subscription_code, current_period_end)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(workspace_id) DO UPDATE SET
                provider = excluded.provider,
                plan_name = excluded.plan_name,
                status = excluded.status,
                customer_code = excluded.customer_code,
                subscription_code = excluded.subscription_code,
                current_period_end = excluded.current_period_end",
            params![
                workspace_id,
                PAYSTACK_PROVIDER,
                PREMIUM_PLAN,
                update.status,
                update.customer_code,
                update.subscription_code,
                update.current_period_end.as_ref().map(ts),
            ],
        )
        .context("Failed to upsert billing")?;
        info!(workspace_id = %workspace_id, status = %update.status, "Billing updated");
        Ok(())
    }

    /// Update status and period on every row carrying the subscription code.
    /// Returns the number of rows touched.
    pub async fn update_billing_by_subscription(
        &self,
        subscription_code: &str,
        status: &str,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let conn = self.conn.lock().await;
        let updated = conn
            .execute(
                "UPDATE billing SET status = ?1, current_period_end = ?2 WHERE subscription_code = ?3",
                params![status, current_period_end.as_ref().map(ts), subscription_code],
            )
            .context("Failed to update billing by subscription")?;
        Ok(updated)
    }

    /// The current month's usage row, created (or rolled over) on demand.
    pub async fn current_usage(&self, workspace_id: &str) -> Result<Usage> {
        let conn = self.conn.lock().await;
        ensure_usage(&conn, workspace_id, Utc::now())
    }

    /// Add `count` generated emails to the current month's counter.
    pub async fn record_generated(&self, workspace_id: &str, count: u32) -> Result<Usage> {
        let conn = self.conn.lock().await;
        ensure_usage(&conn, workspace_id, Utc::now())?;
        conn.execute(
            "UPDATE usage SET emails_generated = emails_generated + ?1 WHERE workspace_id = ?2",
            params![count, workspace_id],
        )
        .context("Failed to record usage")?;
        load_usage(&conn, workspace_id)?.context("Usage row vanished after update")
    }
}

/// First instant of the month containing `at`, and the last second of that month.
pub fn month_period(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at);
    let (next_year, next_month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    let next = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(at);
    (start, next - Duration::seconds(1))
}

fn ensure_usage(conn: &Connection, workspace_id: &str, at: DateTime<Utc>) -> Result<Usage> {
    let (start, end) = month_period(at);

    match load_usage(conn, workspace_id)? {
        Some(usage) if usage.period_end >= at => Ok(usage),
        Some(_) => {
            conn.execute(
                "UPDATE usage SET period_start = ?1, period_end = ?2, emails_generated = 0 WHERE workspace_id = ?3",
                params![ts(&start), ts(&end), workspace_id],
            )?;
            load_usage(conn, workspace_id)?.context("Usage row vanished after rollover")
        }
        None => {
            conn.execute(
                "INSERT INTO usage (workspace_id, period_start, period_end, emails_generated, usage_limit)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![workspace_id, ts(&start), ts(&end), MONTHLY_EMAIL_LIMIT],
            )
            .context("Failed to create usage row")?;
            load_usage(conn, workspace_id)?.context("Usage row vanished after insert")
        }
    }
}

fn load_usage(conn: &Connection, workspace_id: &str) -> Result<Option<Usage>> {
    conn.query_row(
        "SELECT workspace_id, period_start, period_end, emails_generated, usage_limit FROM usage WHERE workspace_id = ?1",
        params![workspace_id],
        |row| {
            let start: String = row.get(1)?;
            let end: String = row.get(2)?;
            Ok(Usage {
                workspace_id: row.get(0)?,
                period_start: parse_ts(1, &start)?,
                period_end: parse_ts(2, &end)?,
                emails_generated: row.get(3)?,
                limit: row.get(4)?,
            })
        },
    )
    .optional()
    .context("Failed to load usage")
}

fn row_to_billing(row: &Row<'_>) -> rusqlite::Result<Billing> {
    Ok(Billing {
        workspace_id: row.get(0)?,
        provider: row.get(1)?,
        plan_name: row.get(2)?,
        status: row.get(3)?,
        customer_code: row.get(4)?,
        subscription_code: row.get(5)?,
        current_period_end: parse_opt_ts(6, row.get(6)?)?,
    })
}
