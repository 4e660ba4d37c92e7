use tessera_config::ConfigError;
use tessera_container::ContainerError;
use tessera_events::EventError;
use tessera_persistence::UnitOfWorkError;
use tessera_plugins::PluginError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Events(#[from] EventError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
