//! ColdMail chat orchestration
//!
//! Turns a user message into a model reply: intent classification, system
//! prompt assembly, context windowing, tool-call dispatch, and rolling
//! session memory. Also hosts the batch cold-email generator.

pub mod agent_loop;
pub mod classifier;
pub mod context_window;
pub mod memory;
pub mod outreach;
pub mod system_prompt;
pub mod tool_dispatcher;

pub use agent_loop::{ChatAgent, ChatReply, ChatTurn};
pub use classifier::classify;
pub use context_window::{ContextWindow, CONTEXT_MESSAGES};
pub use memory::{refresh_memory, MemoryRefresh};
pub use outreach::{generate_emails, generate_for_workspace, EmailBrief, GeneratedEmail};
pub use system_prompt::{PromptBuilder, WorkspaceSnapshot};
pub use tool_dispatcher::{parse_tool_call, ToolDispatcher};
