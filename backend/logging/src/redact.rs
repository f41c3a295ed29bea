//! Log Redaction
//!
//! Scrubs API keys, payment secrets, and bearer tokens from strings prior to logging.

use once_cell::sync::Lazy;
use regex::Regex;

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(sk-[A-Za-z0-9_\-]{16,})|(sk_(?:live|test)_[A-Za-z0-9]{8,})|(Bearer\s+[A-Za-z0-9\-\._~+/]+=*)").unwrap()
});
static KEY_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)((?:api[_-]?key|secret)["']?\s*[:=]\s*["']?)[^"'\s,&}]+"#).unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = KEY_FIELD_RE.replace_all(input, "${1}[REDACTED]");
    API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let raw = "calling https://api.openai.com/v1 with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
        assert!(clean.contains("https://api.openai.com/v1"));
    }

    #[test]
    fn test_key_fields_and_secrets() {
        let clean = redact_sensitive_data(r#"{"apiKey":"abc123","model":"llama3.2"}"#);
        assert_eq!(clean, r#"{"apiKey":"[REDACTED]","model":"llama3.2"}"#);

        let clean = redact_sensitive_data("PAYSTACK_SECRET_KEY=sk_live_abcdef123456 OLLAMA_API_KEY=xyz");
        assert!(!clean.contains("sk_live_abcdef123456"));
        assert!(!clean.contains("xyz"));

        assert_eq!(redact_sensitive_data("nothing to hide"), "nothing to hide");
    }
}
