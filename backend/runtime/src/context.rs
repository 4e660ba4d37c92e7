use std::sync::Arc;
use tessera_config::Config;
use tessera_container::{ContainerError, DependencyContainer};
use tessera_events::EventBus;

/// Container name of the shared [`Config`].
pub const CONFIG_SERVICE: &str = "config";

/// Container name of the shared [`EventBus`].
pub const EVENTS_SERVICE: &str = "events";

/// Everything a plugin gets at `initialize`.
#[derive(Clone)]
pub struct Context {
    pub events: Arc<EventBus>,
    pub container: Arc<DependencyContainer>,
    pub config: Arc<Config>,
}

impl Context {
    /// Shorthand for resolving an unscoped service from the container.
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        self.container.resolve::<T>(name, None)
    }

    /// Register the config and event bus under their well-known names.
    pub(crate) fn register_builtins(&self) -> Result<(), ContainerError> {
        self.container.register_shared(CONFIG_SERVICE, self.config.clone())?;
        self.container.register_shared(EVENTS_SERVICE, self.events.clone())?;
        Ok(())
    }
}
