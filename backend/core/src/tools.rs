//! Tool-call directives the model may embed in its replies, and their results.
//!
//! The wire form is an untyped `{"name": ..., "args": {...}}` blob; it is
//! resolved here into a closed sum type so every operation carries its own
//! validated arguments and unknown names are rejected explicitly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{CampaignStatus, MemberRole};

/// Names accepted after the tool-call marker, in the order they are advertised.
pub const TOOL_NAMES: [&str; 6] = [
    "create_campaign",
    "update_campaign_status",
    "list_campaigns",
    "create_template",
    "get_stats",
    "create_invite",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCampaignArgs {
    pub name: String,
    pub leads: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCampaignStatusArgs {
    pub id: String,
    pub status: CampaignStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCampaignsArgs {
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTemplateArgs {
    pub name: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInviteArgs {
    pub email: String,
    pub role: MemberRole,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    CreateCampaign(CreateCampaignArgs),
    UpdateCampaignStatus(UpdateCampaignStatusArgs),
    ListCampaigns(ListCampaignsArgs),
    CreateTemplate(CreateTemplateArgs),
    GetStats,
    CreateInvite(CreateInviteArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallError {
    #[error("Invalid tool call: {0}")]
    Malformed(String),

    #[error("Unknown tool")]
    UnknownTool(String),

    #[error("{0} is required")]
    MissingArgument(&'static str),

    #[error("Invalid argument {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

#[derive(Deserialize)]
struct RawToolCall {
    name: String,
    #[serde(default)]
    args: Value,
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::CreateCampaign(_) => "create_campaign",
            ToolCall::UpdateCampaignStatus(_) => "update_campaign_status",
            ToolCall::ListCampaigns(_) => "list_campaigns",
            ToolCall::CreateTemplate(_) => "create_template",
            ToolCall::GetStats => "get_stats",
            ToolCall::CreateInvite(_) => "create_invite",
        }
    }

    /// Parse the JSON object that follows the marker.
    pub fn from_json(json: &str) -> Result<Self, ToolCallError> {
        let raw: RawToolCall =
            serde_json::from_str(json).map_err(|e| ToolCallError::Malformed(e.to_string()))?;
        Self::from_parts(&raw.name, raw.args)
    }

    /// Same as [`ToolCall::from_json`] for an already-decoded value.
    pub fn from_value(value: Value) -> Result<Self, ToolCallError> {
        let raw: RawToolCall =
            serde_json::from_value(value).map_err(|e| ToolCallError::Malformed(e.to_string()))?;
        Self::from_parts(&raw.name, raw.args)
    }

    /// Resolve a tool name plus untyped arguments into a validated call.
    pub fn from_parts(name: &str, args: Value) -> Result<Self, ToolCallError> {
        let args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ToolCallError::Malformed(format!(
                    "args must be an object, got {other}"
                )))
            }
        };

        match name {
            "create_campaign" => Ok(ToolCall::CreateCampaign(CreateCampaignArgs {
                name: required_str(&args, "name")?,
                leads: optional_u32(&args, "leads")?.unwrap_or(0),
            })),
            "update_campaign_status" => {
                let id = required_str(&args, "id")?;
                let status = required_str(&args, "status")?;
                let status = status.parse::<CampaignStatus>().map_err(|reason| {
                    ToolCallError::InvalidArgument {
                        field: "status",
                        reason,
                    }
                })?;
                Ok(ToolCall::UpdateCampaignStatus(UpdateCampaignStatusArgs {
                    id,
                    status,
                }))
            }
            "list_campaigns" => Ok(ToolCall::ListCampaigns(ListCampaignsArgs {
                limit: optional_u32(&args, "limit")?.unwrap_or(5).clamp(1, 50),
            })),
            "create_template" => Ok(ToolCall::CreateTemplate(CreateTemplateArgs {
                name: required_str(&args, "name")?,
                subject: required_str(&args, "subject")?,
                body: required_str(&args, "body")?,
            })),
            "get_stats" => Ok(ToolCall::GetStats),
            "create_invite" => {
                let email = required_str(&args, "email")?;
                let role = match args.get("role").and_then(Value::as_str) {
                    Some(role) if !role.trim().is_empty() => {
                        role.parse::<MemberRole>().map_err(|reason| {
                            ToolCallError::InvalidArgument {
                                field: "role",
                                reason,
                            }
                        })?
                    }
                    _ => MemberRole::Member,
                };
                Ok(ToolCall::CreateInvite(CreateInviteArgs { email, role }))
            }
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }
}

fn required_str(args: &Map<String, Value>, field: &'static str) -> Result<String, ToolCallError> {
    match args.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ToolCallError::MissingArgument(field)),
    }
}

/// Accepts a JSON number or a numeric string, as models emit either.
fn optional_u32(args: &Map<String, Value>, field: &'static str) -> Result<Option<u32>, ToolCallError> {
    let invalid = |reason: String| ToolCallError::InvalidArgument { field, reason };
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid(format!("{n} is not a non-negative integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| invalid(e.to_string())),
        Some(other) => Err(invalid(format!("unexpected value {other}"))),
    }
}

/// Outcome of a dispatched tool call, serialised flat:
/// `{"ok": true, "campaign": {...}}` or `{"ok": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ToolResult {
    pub fn success(key: &str, value: Value) -> Self {
        let mut payload = Map::new();
        payload.insert(key.to_string(), value);
        Self {
            ok: true,
            error: None,
            payload,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            payload: Map::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "ok": false, "error": e.to_string() })
        })
    }
}

impl From<ToolCallError> for ToolResult {
    fn from(err: ToolCallError) -> Self {
        ToolResult::failure(err.to_string())
    }
}
