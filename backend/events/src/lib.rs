//! Event Bus
//!
//! Publish-subscribe router used for all cross-module coordination inside the
//! runtime. Handlers for one publish run concurrently; a failing handler is
//! logged and never disturbs its siblings.

pub mod bus;
pub mod error;
pub mod handler;
pub mod history;
pub mod schema;

pub use bus::{EventBus, EventBusConfig, EventBusStatus, Subscription};
pub use error::EventError;
pub use handler::{EventHandler, FnHandler};
pub use history::EventRecord;
pub use schema::{EventSchema, RequiredFieldsSchema, SchemaResult};
