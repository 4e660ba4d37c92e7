//! Structured Logger
//!
//! Wraps `tracing` to provide console output, an optional daily-rotated NDJSON
//! file, and `RUST_LOG`-based level control.

use std::path::Path;
use tessera_core::Logger;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::redact::redact_sensitive_data;

/// Prefix of the rolling log files (`tessera.log.YYYY-MM-DD`).
pub const LOG_FILE_NAME: &str = "tessera.log";

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `level`. With `log_dir`, events are also written as
/// NDJSON to a daily-rotated file there. Only the first call takes effect;
/// returns whether this call installed the subscriber.
pub fn init_logger(log_dir: Option<&Path>, level: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = log_dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let console_layer = fmt::layer().with_writer(std::io::stdout).with_target(false).with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
}

/// A failure sink that scrubs tokens and phone numbers before emitting
/// `tracing::error!`.
pub fn scrubbing_logger() -> Logger {
    Logger::new(|message, detail| {
        tracing::error!(
            detail = %redact_sensitive_data(detail),
            "{}",
            redact_sensitive_data(message)
        );
    })
}
