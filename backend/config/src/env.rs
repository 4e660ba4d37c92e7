//! `${VAR_NAME}` substitution in config string values.
//!
//! Only uppercase `[A-Z_][A-Z0-9_]*` names are recognised. `$${VAR}` is an
//! escape and yields the literal text `${VAR}`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A reference, optionally preceded by the escaping `$`.
static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var reference pattern is valid")
});

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute references from the process environment.
///
/// Unset and empty variables are both errors.
pub fn resolve_env_vars(value: &Value) -> Result<Value, MissingEnvVarError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    resolve_env_vars_with(value, &env)
}

/// Substitute references from `env` instead of the process environment.
pub fn resolve_env_vars_with(
    value: &Value,
    env: &HashMap<String, String>,
) -> Result<Value, MissingEnvVarError> {
    substitute(value, env, "")
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn substitute(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value, MissingEnvVarError> {
    Ok(match value {
        Value::String(s) => Value::String(substitute_str(s, env, path)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| substitute(v, env, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), substitute(v, env, &child_path(path, k))?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

fn substitute_str(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String, MissingEnvVarError> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let replaced = REFERENCE.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    match missing {
        Some(err) => Err(err),
        None => Ok(replaced.into_owned()),
    }
}

/// Every variable name referenced anywhere in the tree, sorted and deduplicated.
/// Escaped references are not counted.
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(
            REFERENCE
                .captures_iter(s)
                .filter(|caps| caps[1].is_empty())
                .map(|caps| caps[2].to_string()),
        ),
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_substitutes_nested_and_inline_references() {
        let v = json!({ "proxy": { "url": "http://${PROXY_HOST}:${PROXY_PORT}/" }, "list": ["${PROXY_HOST}"] });
        let result = resolve_env_vars_with(&v, &env(&[("PROXY_HOST", "10.0.0.1"), ("PROXY_PORT", "8080")])).unwrap();
        assert_eq!(result["proxy"]["url"], "http://10.0.0.1:8080/");
        assert_eq!(result["list"][0], "10.0.0.1");
    }

    #[test]
    fn test_missing_var_names_variable_and_path() {
        let v = json!({ "accounts": [{ "token": "${CHAT_TOKEN}" }] });
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err();
        assert_eq!(err.var_name, "CHAT_TOKEN");
        assert_eq!(err.config_path, "accounts[0].token");
    }

    #[test]
    fn test_empty_var_counts_as_missing() {
        let v = json!({ "key": "${EMPTY}" });
        assert!(resolve_env_vars_with(&v, &env(&[("EMPTY", "")])).is_err());
    }

    #[test]
    fn test_escaped_reference_is_kept_literally() {
        let v = json!({ "template": "$${HOME} and ${USER_NAME}" });
        let result = resolve_env_vars_with(&v, &env(&[("USER_NAME", "kim")])).unwrap();
        assert_eq!(result["template"], "${HOME} and kim");
    }

    #[test]
    fn test_lowercase_and_non_string_values_pass_through() {
        let v = json!({ "a": "${lower}", "n": 5, "b": true });
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result, v);
    }

    #[test]
    fn test_collects_unescaped_references_once() {
        let v = json!({ "a": "${FOO}", "b": { "c": "${BAR} ${FOO}" }, "d": "$${SKIP}" });
        assert_eq!(collect_referenced_vars(&v), vec!["BAR", "FOO"]);
    }
}
