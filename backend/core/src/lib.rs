//! `tessera-core`: contracts shared by every tessera runtime component.
//!
//! Provides:
//! - Capability manifests and structural interface checks
//! - The violation record used by plugin and service validation
//! - The `Logger` sink consumed by the event bus and plugin manager
//! - Panic payload formatting for isolated callbacks
//! - Dot-path and merge-patch helpers over `serde_json::Value`

pub mod error;
pub mod interface;
pub mod json;
pub mod logger;
pub mod panic;

pub use error::{describe_violations, Violation, ViolationKind};
pub use interface::{InterfaceSpec, Introspect, Manifest, MemberKind, MemberSpec};
pub use logger::Logger;
pub use panic::panic_message;
