//! `tessera-runtime`: the composition root.
//!
//! [`Runtime::boot`] builds one [`Context`] (event bus, dependency container,
//! configuration) and hands it to every plugin. There are no process-wide
//! singletons; tests get isolation from [`Runtime::reset`] or a fresh runtime.

pub mod context;
pub mod error;
pub mod runtime;

pub use context::{Context, CONFIG_SERVICE, EVENTS_SERVICE};
pub use error::RuntimeError;
pub use runtime::{Runtime, RUNTIME_STARTED, RUNTIME_STOPPING};

pub use tessera_config::Config;
pub use tessera_container::{DependencyContainer, Lifetime, Scope, Source};
pub use tessera_events::EventBus;
pub use tessera_persistence::{DynRepository, Entity, InMemoryRepository, Repository, UnitOfWork};
pub use tessera_plugins::{LifecycleReport, Plugin, PluginManager, PluginState};
