//! Range checks for [`RuntimeSettings`].

use serde::Serialize;
use thiserror::Error;

use crate::settings::{RuntimeSettings, SETTINGS_KEY};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Upper bound on retained history; beyond this a warning is raised.
const MAX_SENSIBLE_HISTORY: usize = 10_000;

#[derive(Debug, Clone, Error, Serialize)]
#[error("Config issue at '{path}': {message}")]
pub struct SettingsIssue {
    pub path: String,
    pub message: String,
}

/// Every error and warning found in one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<SettingsIssue>,
    pub warnings: Vec<SettingsIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(SettingsIssue { path: format!("{SETTINGS_KEY}.{path}"), message: message.into() });
    }

    fn warn(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(SettingsIssue { path: format!("{SETTINGS_KEY}.{path}"), message: message.into() });
    }
}

pub fn validate_settings(settings: &RuntimeSettings) -> ValidationReport {
    let mut report = ValidationReport::default();

    let level = settings.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        report.error(
            "logging.level",
            format!("Unknown log level '{}'. Use one of: {}", settings.logging.level, LOG_LEVELS.join(", ")),
        );
    }

    let bus = &settings.event_bus;
    if bus.max_history_size == 0 {
        report.warn("eventBus.maxHistorySize", "History is disabled; get_history will always be empty");
    } else if bus.max_history_size > MAX_SENSIBLE_HISTORY {
        report.warn(
            "eventBus.maxHistorySize",
            format!("{} entries is unusually large; payloads are kept in memory", bus.max_history_size),
        );
    }
    if bus.history_retention_secs == 0 {
        report.error("eventBus.historyRetentionSecs", "historyRetentionSecs must be > 0");
    }

    report
}
