use std::path::PathBuf;
use thiserror::Error;

use crate::env::MissingEnvVarError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to {action} config file {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize config to YAML: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVarError),

    #[error("Config value at '{key}' has the wrong type: {source}")]
    Type {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config root must be a mapping")]
    NotAMapping,

    #[error("Config has no file path; load it from a file or use save_to")]
    NoPath,
}
