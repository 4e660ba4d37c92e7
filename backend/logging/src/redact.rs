//! Log Redaction
//!
//! Scrubs bearer tokens, API keys and phone numbers from free text before it
//! reaches a log sink.

use regex::Regex;
use std::sync::LazyLock;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("phone pattern is valid")
});
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9]{20,})|(Bearer\s+[a-zA-Z0-9\-._~+/]+=*)").expect("token pattern is valid")
});
static KEY_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(password|token|secret|api_?key)(["']?\s*[:=]\s*["']?)[^\s"',}]+"#)
        .expect("key/value pattern is valid")
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = TOKEN_RE.replace_all(input, "[REDACTED_TOKEN]");
    let redacted = KEY_VALUE_RE.replace_all(&redacted, "${1}${2}[REDACTED]");
    PHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrubs_tokens_and_phones() {
        let raw = "Login for +1-555-123-4567 failed with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("555-123-4567"));
        assert!(!clean.contains("eyJhbGci"));
        assert!(clean.contains("[REDACTED_PHONE]"));
        assert!(clean.contains("[REDACTED_TOKEN]"));
    }

    #[test]
    fn test_scrubs_key_value_pairs() {
        let clean = redact_sensitive_data(r#"proxy rejected {"password": "hunter2", "user": "kim"}"#);
        assert!(!clean.contains("hunter2"));
        assert!(clean.contains(r#""password": "[REDACTED]"#));
        assert!(clean.contains("kim"));

        assert_eq!(redact_sensitive_data("api_key=abc123 ok"), "api_key=[REDACTED] ok");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(redact_sensitive_data("plugin 'metrics' enabled"), "plugin 'metrics' enabled");
    }
}
