pub mod error;
pub mod message;
pub mod tools;
pub mod traits;
pub mod types;

pub use error::ColdMailError;
pub use message::{ClassificationResult, Intent, Message, Role};
pub use tools::{ToolCall, ToolCallError, ToolResult};
pub use traits::{
    GenerateRequest, InferenceProvider, InferenceRequest, InferenceResponse, ProviderHealth,
};
pub use types::{
    ActivityEntry, Billing, Campaign, CampaignStatus, ChatMessage, ChatSession, Invite,
    InviteStatus, Member, MemberRole, Template, Usage, User, Workspace, WorkspaceSettings,
};
