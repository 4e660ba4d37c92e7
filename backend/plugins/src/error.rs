use serde::Serialize;
use std::fmt;
use tessera_core::{describe_violations, Violation};
use thiserror::Error;

use crate::plugin::PluginState;

/// Which lifecycle hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    Initialize,
    Destroy,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Initialize => write!(f, "initialize"),
            LifecyclePhase::Destroy => write!(f, "destroy"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin '{plugin}' is missing required members: {}", describe_violations(.missing_members))]
    InvalidInterface {
        plugin: String,
        missing_members: Vec<Violation>,
    },

    #[error("Plugin '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Plugin '{0}' is not registered")]
    NotFound(String),

    #[error("Cannot {operation} plugin '{plugin}' while it is {state}")]
    InvalidState {
        plugin: String,
        state: PluginState,
        operation: &'static str,
    },

    #[error("Plugin '{plugin}' failed to {phase}: {source:#}")]
    Lifecycle {
        plugin: String,
        phase: LifecyclePhase,
        #[source]
        source: anyhow::Error,
    },

    #[error("Plugin '{plugin}' depends on '{dependency}', which is not active")]
    UnsatisfiedDependency { plugin: String, dependency: String },

    #[error("{0}")]
    DependencyCycle(String),
}
