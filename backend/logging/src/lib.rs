//! Structured logging for the tessera runtime.
//!
//! Installs the global `tracing` subscriber and provides the scrubbing
//! failure sink handed to the event bus, plugin manager and unit of work.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, scrubbing_logger, LOG_FILE_NAME};
pub use redact::redact_sensitive_data;
