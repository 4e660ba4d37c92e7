//! Masking of sensitive config values before they are logged or displayed.
//!
//! Values under credential-like keys become `"***"`. Phone numbers (account
//! identifiers in chat clients) keep their first four characters.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

pub const MASK: &str = "***";

/// Keys whose values are always masked, compared case-insensitively.
static SENSITIVE_KEYS: &[&str] = &[
    "password",
    "proxyPassword",
    "proxy_password",
    "passphrase",
    "token",
    "accessToken",
    "access_token",
    "refreshToken",
    "refresh_token",
    "apiKey",
    "api_key",
    "secret",
    "clientSecret",
    "client_secret",
    "privateKey",
    "private_key",
    "encryptionKey",
    "encryption_key",
    "cookie",
    "cookies",
    "session",
];

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("phone pattern is valid"));

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn mask_phone(s: &str) -> String {
    format!("{}{MASK}", s.chars().take(4).collect::<String>())
}

/// Copy of `value` with every sensitive value masked.
pub fn redact(value: &Value) -> Value {
    redact_under(value, false)
}

/// `masked` is set once any ancestor key is sensitive; the whole subtree is hidden.
fn redact_under(value: &Value, masked: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), redact_under(v, masked || is_sensitive_key(k)));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_under(v, masked)).collect()),
        Value::Null => Value::Null,
        _ if masked => Value::String(MASK.to_string()),
        Value::String(s) if PHONE_PATTERN.is_match(s) => Value::String(mask_phone(s)),
        other => other.clone(),
    }
}

/// Dot paths of every value `redact` would mask.
pub fn collect_redacted_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect(value, "", false, &mut paths);
    paths
}

fn collect(value: &Value, path: &str, masked: bool, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                collect(v, &child, masked || is_sensitive_key(k), out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                collect(v, &format!("{path}[{i}]"), masked, out);
            }
        }
        Value::Null => {}
        Value::String(s) if masked || PHONE_PATTERN.is_match(s) => out.push(path.to_string()),
        _ if masked => out.push(path.to_string()),
        _ => {}
    }
}
