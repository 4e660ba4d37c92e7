//! Failure sink for isolated errors.
//!
//! Components that swallow a failure to protect their siblings (a subscriber
//! erroring during publish, a plugin failing during `initialize_all`) hand it
//! to a `Logger` instead of dropping it. The default sink forwards to
//! `tracing`.

use std::fmt;
use std::sync::Arc;

type LogFn = dyn Fn(&str, &str) + Send + Sync;

/// A `(message, detail)` sink. Never awaited; must not panic.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<LogFn>,
}

impl Logger {
    pub fn new(sink: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        Self { sink: Arc::new(sink) }
    }

    /// A logger that discards everything.
    pub fn silent() -> Self {
        Self::new(|_, _| {})
    }

    pub fn log(&self, message: &str, detail: &str) {
        (self.sink)(message, detail);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(|message, detail| tracing::error!(detail = %detail, "{}", message))
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}
