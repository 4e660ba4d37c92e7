use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid event name {0:?}: event names must be non-empty")]
    InvalidEventName(String),

    #[error("payload for event '{event}' failed schema validation: {}", .errors.join("; "))]
    SchemaValidation { event: String, errors: Vec<String> },
}
