//! Dashboard: campaign listing, derived stats, activity, and usage.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use coldmail_core::{Campaign, CampaignStatus};
use coldmail_store::activity::ACTIVITY_PAGE_DEFAULT;
use coldmail_store::campaigns::CAMPAIGN_PAGE_DEFAULT;
use coldmail_store::CampaignFilter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::CurrentWorkspace;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub range: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl CampaignQuery {
    fn filter(&self) -> Result<CampaignFilter, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => {
                Some(CampaignStatus::from_str(s).map_err(ApiError::bad_request)?)
            }
            _ => None,
        };
        let created_after = range_days(self.range.as_deref()).map(|d| Utc::now() - Duration::days(d));

        Ok(CampaignFilter {
            query: self.q.clone().filter(|q| !q.trim().is_empty()),
            status,
            created_after,
        })
    }
}

/// `7d`, `30d`, and `90d` restrict by creation date; anything else does not.
fn range_days(range: Option<&str>) -> Option<i64> {
    match range? {
        "7d" => Some(7),
        "30d" => Some(30),
        "90d" => Some(90),
        _ => None,
    }
}

/// Handler for `GET /api/dashboard/campaigns`
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    query: Result<Query<CampaignQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let filter = query.filter()?;
    let page = state
        .store
        .list_campaigns(
            workspace.id(),
            &filter,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(CAMPAIGN_PAGE_DEFAULT),
        )
        .await?;
    Ok(Json(json!({ "success": true, "data": page })))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_generated: u32,
    pub total_leads: u64,
    pub active_campaigns: u64,
    pub avg_open_rate: u64,
    pub ctr: u64,
}

impl DashboardStats {
    /// Derive headline numbers from the workspace's campaigns.
    ///
    /// Open rate and CTR are estimates, capped at 80 and 30.
    pub fn derive(campaigns: &[Campaign], total_generated: u32) -> Self {
        let total_leads: u64 = campaigns.iter().map(|c| u64::from(c.leads)).sum();
        let active = campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .count() as u64;

        let leads = total_leads as f64;
        let active_f = active as f64;
        let avg_open_rate = (15.0 + 3.0 * active_f + leads / 150.0).round().min(80.0) as u64;
        let ctr = (2.0 + active_f + leads / 400.0).round().min(30.0) as u64;

        Self {
            total_generated,
            total_leads,
            active_campaigns: active,
            avg_open_rate,
            ctr,
        }
    }
}

/// Handler for `GET /api/dashboard/stats`
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
) -> Result<Json<Value>, ApiError> {
    let campaigns = state.store.all_campaigns(workspace.id()).await?;
    let usage = state.store.current_usage(workspace.id()).await?;
    let stats = DashboardStats::derive(&campaigns, usage.emails_generated);

    let config = state.inference_for(workspace.id()).await?;
    let health = state.factory.connect(&config).health().await;

    Ok(Json(json!({
        "success": true,
        "data": {
            "stats": stats,
            "campaigns": campaigns,
            "system": {
                "inference": {
                    "status": if health.ok { "online" } else { "offline" },
                    "baseUrl": config.base_url,
                }
            },
            "lastUpdated": Utc::now(),
        }
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatsAction {
    pub action: String,
    pub campaign: CampaignInput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CampaignInput {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Accepted as a number or a numeric string.
    pub leads: Option<Value>,
    pub status: Option<String>,
}

impl CampaignInput {
    fn leads(&self) -> u32 {
        match &self.leads {
            Some(Value::Number(n)) => n.as_u64().map(|v| v.min(u64::from(u32::MAX)) as u32).unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Handler for `POST /api/dashboard/stats`
pub async fn post_stats_action(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    payload: Result<Json<StatsAction>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let input = &body.campaign;

    match body.action.as_str() {
        "addCampaign" => {
            let name = input.name.as_deref().map(str::trim).unwrap_or_default();
            let leads = input.leads();
            if name.is_empty() || leads == 0 {
                return Err(ApiError::bad_request("Campaign name and leads are required"));
            }
            let campaign = state
                .store
                .create_campaign(workspace.id(), name, leads, CampaignStatus::Draft)
                .await?;
            info!(workspace_id = %workspace.id(), campaign_id = %campaign.id, "Campaign added");
            Ok(Json(json!({ "success": true, "campaign": campaign })))
        }
        "updateStatus" => {
            let (Some(id), Some(status)) = (input.id(), input.status.as_deref()) else {
                return Err(ApiError::bad_request("Campaign ID and status are required"));
            };
            let status = CampaignStatus::from_str(status).map_err(ApiError::bad_request)?;
            match state
                .store
                .update_campaign_status(workspace.id(), id, status)
                .await?
            {
                Some(campaign) => Ok(Json(json!({ "success": true, "campaign": campaign }))),
                None => Err(ApiError::not_found("Campaign not found")),
            }
        }
        "deleteCampaign" => {
            let Some(id) = input.id() else {
                return Err(ApiError::bad_request("Campaign ID is required"));
            };
            let deleted = state.store.delete_campaign(workspace.id(), id).await?;
            Ok(Json(json!({ "success": true, "deleted": deleted })))
        }
        _ => Err(ApiError::bad_request("Invalid action")),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Handler for `GET /api/dashboard/activity`
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let page = state
        .store
        .list_activity(
            workspace.id(),
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(ACTIVITY_PAGE_DEFAULT),
        )
        .await?;
    Ok(Json(json!({ "success": true, "data": page })))
}

/// Handler for `GET /api/dashboard/usage`
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    workspace: CurrentWorkspace,
) -> Result<Json<Value>, ApiError> {
    let usage = state.store.current_usage(workspace.id()).await?;
    Ok(Json(json!({ "success": true, "data": usage })))
}
