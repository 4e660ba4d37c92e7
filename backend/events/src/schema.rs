//! Payload schemas checked before any subscriber is touched.

use serde::Serialize;
use serde_json::Value;

/// Outcome of a schema check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl SchemaResult {
    pub fn ok() -> Self {
        Self { valid: true, errors: Vec::new() }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self { valid: false, errors }
    }
}

pub trait EventSchema: Send + Sync {
    fn validate(&self, payload: &Value) -> SchemaResult;
}

impl<F> EventSchema for F
where
    F: Fn(&Value) -> SchemaResult + Send + Sync,
{
    fn validate(&self, payload: &Value) -> SchemaResult {
        self(payload)
    }
}

/// Requires the payload to be an object carrying every listed key.
#[derive(Debug, Clone)]
pub struct RequiredFieldsSchema {
    fields: Vec<String>,
}

impl RequiredFieldsSchema {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { fields: fields.into_iter().map(Into::into).collect() }
    }
}

impl EventSchema for RequiredFieldsSchema {
    fn validate(&self, payload: &Value) -> SchemaResult {
        let Some(object) = payload.as_object() else {
            return SchemaResult::invalid(vec!["payload must be an object".to_string()]);
        };
        let errors: Vec<String> = self
            .fields
            .iter()
            .filter(|field| !object.contains_key(field.as_str()))
            .map(|field| format!("missing required field '{field}'"))
            .collect();
        if errors.is_empty() {
            SchemaResult::ok()
        } else {
            SchemaResult::invalid(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_fields_reports_each_missing_key() {
        let schema = RequiredFieldsSchema::new(["accountId", "status"]);
        let result = schema.validate(&json!({"other": 1}));
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("accountId"));
        assert!(result.errors[1].contains("status"));
    }

    #[test]
    fn test_required_fields_rejects_non_object() {
        let schema = RequiredFieldsSchema::new(["a"]);
        assert!(!schema.validate(&json!([1, 2])).valid);
    }

    #[test]
    fn test_closure_schema() {
        let schema = |p: &Value| {
            if p.is_string() {
                SchemaResult::ok()
            } else {
                SchemaResult::invalid(vec!["expected string".into()])
            }
        };
        assert!(schema.validate(&json!("x")).valid);
        assert!(!schema.validate(&json!(1)).valid);
    }
}
