use tessera_core::{describe_violations, Violation};
use thiserror::Error;

use crate::registration::Lifetime;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Service '{0}' is already registered; remove it before registering again")]
    AlreadyRegistered(String),

    #[error("Service '{name}' is {lifetime} and requires a factory, not an instance")]
    InvalidProvider { name: String, lifetime: Lifetime },

    #[error("{}", describe_not_found(.name, .suggestions, .available))]
    NotFound {
        name: String,
        suggestions: Vec<String>,
        available: Vec<String>,
    },

    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    Circular { chain: Vec<String> },

    #[error("Service '{0}' is scoped; create a scope with create_scope() and resolve through it")]
    ScopeRequired(String),

    #[error("Cannot resolve scoped service '{0}' from a disposed scope")]
    ScopeDisposed(String),

    #[error("Service '{name}' is not of the requested type {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("Service '{service}' does not satisfy interface '{interface}': {}", describe_violations(.violations))]
    InterfaceViolation {
        service: String,
        interface: String,
        violations: Vec<Violation>,
    },

    #[error("Factory for service '{name}' failed: {source:#}")]
    Factory {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ContainerError {
    /// Turn a factory's error into a container error. Cycles found deeper in
    /// the chain surface unchanged so the full path stays visible.
    pub(crate) fn from_factory(name: &str, err: anyhow::Error) -> Self {
        match err.downcast::<ContainerError>() {
            Ok(circular @ ContainerError::Circular { .. }) => circular,
            Ok(other) => ContainerError::Factory { name: name.to_string(), source: other.into() },
            Err(err) => ContainerError::Factory { name: name.to_string(), source: err },
        }
    }
}

fn describe_not_found(name: &str, suggestions: &[String], available: &[String]) -> String {
    let mut message = format!("Service '{name}' not found.");
    if !suggestions.is_empty() {
        message.push_str(&format!(" Did you mean: {}?", suggestions.join(", ")));
    }
    if available.is_empty() {
        message.push_str(" No services are registered.");
    } else {
        message.push_str(&format!(" Available services: {}", available.join(", ")));
    }
    message
}
