use thiserror::Error;

/// Top-level error type for the ColdMail runtime.
#[derive(Debug, Error)]
pub enum ColdMailError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("inference provider error ({provider}): {message}")]
    Upstream { provider: String, message: String },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ColdMailError {
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_names_provider() {
        let err = ColdMailError::upstream("ollama", "connection refused");
        assert_eq!(
            err.to_string(),
            "inference provider error (ollama): connection refused"
        );
    }

    #[test]
    fn not_found_formats_subject() {
        assert_eq!(
            ColdMailError::NotFound("template".into()).to_string(),
            "template not found"
        );
    }
}
