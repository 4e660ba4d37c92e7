use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_core::{InterfaceSpec, Manifest};

/// Current state of a plugin.
///
/// `Registered -> Initializing -> Active -> Disabling -> Disabled`; a failed
/// hook moves the plugin to `Error` from whichever state it was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Registered,
    Initializing,
    Active,
    Disabling,
    Disabled,
    Error,
}

impl PluginState {
    /// States from which `enable` may (re)run `initialize`.
    pub fn can_enable(self) -> bool {
        matches!(self, PluginState::Registered | PluginState::Disabled)
    }

    /// Whether a lifecycle hook is currently running.
    pub fn is_transitioning(self) -> bool {
        matches!(self, PluginState::Initializing | PluginState::Disabling)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginState::Registered => "registered",
            PluginState::Initializing => "initializing",
            PluginState::Active => "active",
            PluginState::Disabling => "disabling",
            PluginState::Disabled => "disabled",
            PluginState::Error => "error",
        };
        f.write_str(s)
    }
}

/// A unit of optional functionality managed by [`PluginManager`](crate::PluginManager).
///
/// `C` is the context handed to `initialize`; the manager never looks inside it.
#[async_trait]
pub trait Plugin<C: Send + Sync + 'static>: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Names of plugins that must be active before this one initializes.
    /// Names that are not registered are ignored.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Members this plugin declares. Checked against [`plugin_interface`] on
    /// registration; override to describe a plugin assembled at runtime.
    fn manifest(&self) -> Manifest {
        Manifest::new()
            .property("name")
            .property("version")
            .function("initialize")
            .function("destroy")
    }

    async fn initialize(&self, ctx: &C) -> Result<()>;

    async fn destroy(&self) -> Result<()>;
}

/// The members every plugin must provide.
pub fn plugin_interface() -> InterfaceSpec {
    InterfaceSpec::new("Plugin")
        .requires("name")
        .requires("version")
        .requires_fn("initialize")
        .requires_fn("destroy")
}
