//! Telemetry and structured logging components for ColdMail.
//!
//! Handles log redaction, JSON output generation, and file rotation.

pub mod logger;
pub mod redact;

pub use logger::init_logger;
pub use redact::redact_sensitive_data;
