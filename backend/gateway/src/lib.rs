//! ColdMail Gateway HTTP API Server
//!
//! Every route resolves the caller's workspace first and answers with a
//! `success` flag plus either data or an `error` message.

pub mod auth;
pub mod billing;
pub mod chat;
pub mod dashboard;
pub mod error;
pub mod health_api;
pub mod server;
pub mod settings;
pub mod templates;
pub mod workspaces;

pub use error::ApiError;
pub use server::{build_router, start_server, AppState};
