//! Plugin lifecycle management.
//!
//! Plugins declare their dependencies by name; the manager initializes them in
//! dependency order, isolates failures so one broken plugin never blocks its
//! siblings, and tears everything down in reverse initialization order.

pub mod error;
pub mod manager;
pub mod order;
pub mod plugin;

pub use error::{LifecyclePhase, PluginError};
pub use manager::{
    InterfaceReport, LifecycleReport, PluginFailure, PluginManager, PluginManagerStatus, PluginStatus,
};
pub use order::DependencyOrder;
pub use plugin::{plugin_interface, Plugin, PluginState};
