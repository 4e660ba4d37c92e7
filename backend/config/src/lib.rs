//! `tessera-config`: runtime configuration.
//!
//! Provides:
//! - A thread-safe JSON tree addressed by dot paths (`logging.level`)
//! - YAML read/write with atomic backup rotation
//! - `${ENV_VAR}` substitution at load time
//! - Redaction of sensitive values for safe logging
//! - Typed runtime settings with defaults and validation

pub mod env;
pub mod error;
pub mod io;
pub mod redact;
pub mod settings;
pub mod store;
pub mod validation;

pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use error::ConfigError;
pub use io::{config_dir, config_file_path, read_yaml, write_yaml};
pub use redact::{collect_redacted_paths, redact};
pub use settings::{EventBusSettings, LoggingSettings, RuntimeSettings, SETTINGS_KEY};
pub use store::Config;
pub use validation::{validate_settings, SettingsIssue, ValidationReport};
