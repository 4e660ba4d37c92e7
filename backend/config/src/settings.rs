//! Typed view of the `runtime` section.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Config key holding [`RuntimeSettings`].
pub const SETTINGS_KEY: &str = "runtime";

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 100;
pub const DEFAULT_HISTORY_RETENTION_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    pub level: String,
    /// Directory for the rolling log file; console only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), dir: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventBusSettings {
    pub max_history_size: usize,
    pub history_retention_secs: u64,
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            history_retention_secs: DEFAULT_HISTORY_RETENTION_SECS,
        }
    }
}

impl EventBusSettings {
    pub fn history_retention(&self) -> Duration {
        Duration::from_secs(self.history_retention_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeSettings {
    pub logging: LoggingSettings,
    pub event_bus: EventBusSettings,
}
