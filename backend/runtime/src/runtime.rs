use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tessera_config::{validate_settings, Config, RuntimeSettings};
use tessera_container::DependencyContainer;
use tessera_core::Logger;
use tessera_events::{EventBus, EventBusConfig};
use tessera_logging::{init_logger, scrubbing_logger};
use tessera_persistence::{DynRepository, UnitOfWork};
use tessera_plugins::{LifecycleReport, Plugin, PluginManager};
use tracing::{info, warn};

use crate::context::Context;
use crate::error::RuntimeError;

/// Published once `start` has run every plugin's `initialize`.
pub const RUNTIME_STARTED: &str = "runtime:started";

/// Published before `shutdown` tears plugins down.
pub const RUNTIME_STOPPING: &str = "runtime:stopping";

pub struct Runtime {
    context: Context,
    plugins: PluginManager<Context>,
    logger: Logger,
}

impl Runtime {
    /// Wire the event bus, container and plugin manager around `config`.
    ///
    /// Settings problems are logged and defaults are used where a value is
    /// unusable; boot itself only fails if the built-ins cannot be registered.
    pub fn boot(config: Config) -> Result<Self, RuntimeError> {
        let settings = config.settings();
        report_settings(&settings);

        let logger = scrubbing_logger();
        let events = EventBus::with_logger(
            EventBusConfig {
                max_history_size: settings.event_bus.max_history_size,
                history_retention: settings.event_bus.history_retention(),
            },
            logger.clone(),
        );

        let context = Context {
            events: Arc::new(events),
            container: Arc::new(DependencyContainer::new()),
            config: Arc::new(config),
        };
        context.register_builtins()?;

        let plugins = PluginManager::new(Arc::new(context.clone())).with_logger(logger.clone());
        info!(
            max_history = settings.event_bus.max_history_size,
            config = ?context.config.path(),
            "Runtime booted"
        );
        Ok(Self { context, plugins, logger })
    }

    /// Load the YAML file at `path`, install the global subscriber from its
    /// logging settings and boot.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let config = Config::load(path).await?;
        let logging = config.settings().logging;
        init_logger(logging.dir.as_deref(), &logging.level);
        Self::boot(config)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.context.events
    }

    pub fn container(&self) -> &Arc<DependencyContainer> {
        &self.context.container
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.context.config
    }

    pub fn plugins(&self) -> &PluginManager<Context> {
        &self.plugins
    }

    pub fn register_plugin(&self, plugin: Arc<dyn Plugin<Context>>) -> Result<(), RuntimeError> {
        self.plugins.register(plugin)?;
        Ok(())
    }

    /// Initialize all plugins, then announce the outcome on the bus.
    pub async fn start(&self) -> Result<LifecycleReport, RuntimeError> {
        let report = self.plugins.initialize_all().await?;
        self.context
            .events
            .publish(
                RUNTIME_STARTED,
                json!({
                    "successful": report.successful,
                    "failed": report.failed_names(),
                }),
            )
            .await?;
        if !report.failed.is_empty() {
            warn!(failed = ?report.failed_names(), "Runtime started with failed plugins");
        }
        Ok(report)
    }

    /// Announce shutdown, then destroy active plugins in reverse order.
    pub async fn shutdown(&self) -> Result<LifecycleReport, RuntimeError> {
        let active: Vec<String> = self.plugins.get_active_plugins().iter().map(|p| p.name().to_string()).collect();
        self.context.events.publish(RUNTIME_STOPPING, json!({ "active": active })).await?;
        let report = self.plugins.destroy_all().await;
        for failure in &report.failed {
            self.logger.log(&format!("Plugin '{}' failed during shutdown", failure.name), &failure.error);
        }
        info!(destroyed = report.successful.len(), "Runtime stopped");
        Ok(report)
    }

    /// Return to the just-booted state: plugins shut down and unregistered,
    /// container holding only the built-ins, bus emptied.
    pub async fn reset(&self) -> Result<(), RuntimeError> {
        self.shutdown().await?;
        for name in self.plugins.plugin_names() {
            self.plugins.unregister(&name)?;
        }
        self.context.container.clear();
        self.context.register_builtins()?;
        self.context.events.clear();
        info!("Runtime reset");
        Ok(())
    }

    /// Expose a repository to plugins and units of work under `name`.
    pub fn register_repository(&self, name: &str, repository: Arc<dyn DynRepository>) -> Result<(), RuntimeError> {
        self.context.container.register_instance(name, repository)?;
        Ok(())
    }

    /// A fresh unit of work over the named repositories, pulled from the container.
    pub fn unit_of_work(&self, repositories: &[&str]) -> Result<UnitOfWork, RuntimeError> {
        let mut uow = UnitOfWork::new().with_logger(self.logger.clone());
        for name in repositories {
            let repository = self.context.service::<Arc<dyn DynRepository>>(name)?;
            uow.register_repository(name, Arc::clone(&*repository))?;
        }
        Ok(uow)
    }
}

fn report_settings(settings: &RuntimeSettings) {
    let report = validate_settings(settings);
    for issue in &report.errors {
        warn!(path = %issue.path, "Invalid setting: {}", issue.message);
    }
    for issue in &report.warnings {
        warn!(path = %issue.path, "{}", issue.message);
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("services", &self.context.container.get_registered_services())
            .field("plugins", &self.plugins.plugin_names())
            .finish()
    }
}
