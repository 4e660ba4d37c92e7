use anyhow::anyhow;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tessera_core::{panic_message, Logger, Violation};
use tracing::{debug, info, warn};

use crate::error::{LifecyclePhase, PluginError};
use crate::order::{dependency_order, DependencyOrder};
use crate::plugin::{plugin_interface, Plugin, PluginState};

/// Result of checking a plugin against the required plugin members.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceReport {
    pub valid: bool,
    pub missing_members: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of `initialize_all` / `destroy_all`. Every plugin the run
/// considered appears in exactly one of the two lists.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LifecycleReport {
    pub successful: Vec<String>,
    pub failed: Vec<PluginFailure>,
}

impl LifecycleReport {
    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginStatus {
    pub name: String,
    pub version: String,
    pub state: PluginState,
    pub error: Option<String>,
    pub dependencies: Vec<String>,
    /// Position in the most recent activation sequence, if ever activated.
    pub initialization_order: Option<usize>,
    pub registered_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginManagerStatus {
    pub total: usize,
    pub active: usize,
    pub failed: usize,
    pub initialization_order: Vec<String>,
    pub plugins: Vec<PluginStatus>,
}

struct Registration<C: Send + Sync + 'static> {
    plugin: Arc<dyn Plugin<C>>,
    state: PluginState,
    error: Option<String>,
    registered_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    disabled_at: Option<DateTime<Utc>>,
}

struct Registry<C: Send + Sync + 'static> {
    plugins: HashMap<String, Registration<C>>,
    registration_order: Vec<String>,
    initialization_order: Vec<String>,
}

impl<C: Send + Sync + 'static> Registry<C> {
    fn entry(&mut self, name: &str) -> Result<&mut Registration<C>, PluginError> {
        self.plugins.get_mut(name).ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// Registered plugins in registration order.
    fn ordered(&self) -> impl Iterator<Item = (&String, &Registration<C>)> {
        self.registration_order
            .iter()
            .filter_map(move |name| self.plugins.get(name).map(|r| (name, r)))
    }
}

/// Owns every plugin and drives its lifecycle.
///
/// Lifecycle hooks run strictly one at a time within `initialize_all` and
/// `destroy_all`. No lock is held while a hook runs.
pub struct PluginManager<C: Send + Sync + 'static> {
    context: Arc<C>,
    registry: Mutex<Registry<C>>,
    logger: Logger,
}

impl<C: Send + Sync + 'static> PluginManager<C> {
    pub fn new(context: Arc<C>) -> Self {
        Self {
            context,
            registry: Mutex::new(Registry {
                plugins: HashMap::new(),
                registration_order: Vec::new(),
                initialization_order: Vec::new(),
            }),
            logger: Logger::default(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Check `plugin` against the plugin interface, reporting every violation.
    /// An empty name or version counts as missing.
    pub fn validate_plugin_interface(&self, plugin: &dyn Plugin<C>) -> InterfaceReport {
        let mut manifest = plugin.manifest();
        if plugin.name().trim().is_empty() {
            manifest = manifest.without("name");
        }
        if plugin.version().trim().is_empty() {
            manifest = manifest.without("version");
        }
        match plugin_interface().check(&manifest) {
            Ok(()) => InterfaceReport { valid: true, missing_members: Vec::new() },
            Err(missing_members) => InterfaceReport { valid: false, missing_members },
        }
    }

    pub fn register(&self, plugin: Arc<dyn Plugin<C>>) -> Result<(), PluginError> {
        let report = self.validate_plugin_interface(plugin.as_ref());
        let name = plugin.name().to_string();
        if !report.valid {
            let plugin = if name.trim().is_empty() { "<unnamed>".to_string() } else { name };
            warn!(plugin = %plugin, missing = report.missing_members.len(), "Plugin rejected");
            return Err(PluginError::InvalidInterface { plugin, missing_members: report.missing_members });
        }

        let version = plugin.version().to_string();
        let mut registry = self.registry.lock();
        if registry.plugins.contains_key(&name) {
            return Err(PluginError::AlreadyRegistered(name));
        }
        registry.plugins.insert(
            name.clone(),
            Registration {
                plugin,
                state: PluginState::Registered,
                error: None,
                registered_at: Utc::now(),
                activated_at: None,
                disabled_at: None,
            },
        );
        registry.registration_order.push(name.clone());
        info!(plugin = %name, version = %version, "Plugin registered");
        Ok(())
    }

    /// Remove a plugin that is not active and has no hook running.
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Plugin<C>>, PluginError> {
        let mut registry = self.registry.lock();
        let state = registry.entry(name)?.state;
        if state == PluginState::Active || state.is_transitioning() {
            return Err(PluginError::InvalidState { plugin: name.to_string(), state, operation: "unregister" });
        }
        registry.registration_order.retain(|n| n != name);
        registry.initialization_order.retain(|n| n != name);
        let removed = registry.plugins.remove(name).ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        info!(plugin = %name, "Plugin unregistered");
        Ok(removed.plugin)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Run `initialize`. No-op when already active; only `Registered` and
    /// `Disabled` plugins may initialize.
    pub async fn enable(&self, name: &str) -> Result<(), PluginError> {
        let plugin = {
            let mut registry = self.registry.lock();
            let entry = registry.entry(name)?;
            if entry.state == PluginState::Active {
                return Ok(());
            }
            if !entry.state.can_enable() {
                return Err(PluginError::InvalidState {
                    plugin: name.to_string(),
                    state: entry.state,
                    operation: "enable",
                });
            }
            entry.state = PluginState::Initializing;
            entry.error = None;
            entry.plugin.clone()
        };

        debug!(plugin = %name, "Initializing plugin");
        let result = guarded(plugin.initialize(self.context.as_ref())).await;

        match result {
            Ok(()) => {
                {
                    let mut registry = self.registry.lock();
                    if let Ok(entry) = registry.entry(name) {
                        entry.state = PluginState::Active;
                        entry.activated_at = Some(Utc::now());
                    }
                    registry.initialization_order.retain(|n| n != name);
                    registry.initialization_order.push(name.to_string());
                }
                info!(plugin = %name, version = %plugin.version(), "Plugin enabled");
                Ok(())
            }
            Err(source) => Err(self.fail(name, LifecyclePhase::Initialize, source)),
        }
    }

    /// Run `destroy`. No-op unless active, so `destroy` runs at most once per
    /// activation.
    pub async fn disable(&self, name: &str) -> Result<(), PluginError> {
        let plugin = {
            let mut registry = self.registry.lock();
            let entry = registry.entry(name)?;
            if entry.state != PluginState::Active {
                debug!(plugin = %name, state = %entry.state, "Plugin not active, nothing to disable");
                return Ok(());
            }
            entry.state = PluginState::Disabling;
            entry.plugin.clone()
        };

        debug!(plugin = %name, "Destroying plugin");
        match guarded(plugin.destroy()).await {
            Ok(()) => {
                if let Ok(entry) = self.registry.lock().entry(name) {
                    entry.state = PluginState::Disabled;
                    entry.disabled_at = Some(Utc::now());
                }
                info!(plugin = %name, "Plugin disabled");
                Ok(())
            }
            Err(source) => Err(self.fail(name, LifecyclePhase::Destroy, source)),
        }
    }

    fn fail(&self, name: &str, phase: LifecyclePhase, source: anyhow::Error) -> PluginError {
        let detail = format!("{source:#}");
        self.mark_error(name, &detail);
        self.logger.log(&format!("Plugin '{name}' failed to {phase}"), &detail);
        PluginError::Lifecycle { plugin: name.to_string(), phase, source }
    }

    fn mark_error(&self, name: &str, detail: &str) {
        if let Ok(entry) = self.registry.lock().entry(name) {
            entry.state = PluginState::Error;
            entry.error = Some(detail.to_string());
        }
    }

    /// Topologically sort registered plugins by their declared dependencies.
    pub fn compute_dependency_order(&self) -> DependencyOrder {
        let plugins: Vec<(String, Arc<dyn Plugin<C>>)> = {
            let registry = self.registry.lock();
            registry.ordered().map(|(name, r)| (name.clone(), r.plugin.clone())).collect()
        };
        let nodes: Vec<(String, Vec<String>)> =
            plugins.into_iter().map(|(name, plugin)| (name, plugin.dependencies())).collect();
        dependency_order(&nodes)
    }

    /// First registered dependency of `plugin` that is not active.
    fn unsatisfied_dependency(&self, plugin: &Arc<dyn Plugin<C>>) -> Option<String> {
        let dependencies = plugin.dependencies();
        let registry = self.registry.lock();
        dependencies.into_iter().find(|dep| {
            registry.plugins.get(dep).is_some_and(|r| r.state != PluginState::Active)
        })
    }

    /// Initialize every plugin in dependency order.
    ///
    /// A cycle aborts before any plugin runs. Otherwise a failing plugin is
    /// recorded and the run continues; plugins whose dependencies did not
    /// become active are marked `Error` and skipped.
    pub async fn initialize_all(&self) -> Result<LifecycleReport, PluginError> {
        let order = self.compute_dependency_order();
        if order.has_cycle {
            let info = order.cycle_info.unwrap_or_else(|| "Circular plugin dependency detected".to_string());
            self.logger.log("Plugin initialization aborted", &info);
            return Err(PluginError::DependencyCycle(info));
        }

        let mut report = LifecycleReport::default();
        for name in order.order {
            let Some(plugin) = self.get_plugin(&name) else {
                report.failed.push(PluginFailure { error: PluginError::NotFound(name.clone()).to_string(), name });
                continue;
            };

            if !self.is_active(&name) {
                if let Some(dependency) = self.unsatisfied_dependency(&plugin) {
                    let err = PluginError::UnsatisfiedDependency { plugin: name.clone(), dependency };
                    let detail = err.to_string();
                    self.mark_error(&name, &detail);
                    warn!(plugin = %name, "Skipping plugin with unsatisfied dependency");
                    self.logger.log(&format!("Plugin '{name}' skipped"), &detail);
                    report.failed.push(PluginFailure { name, error: detail });
                    continue;
                }
            }

            match self.enable(&name).await {
                Ok(()) => report.successful.push(name),
                Err(e) => report.failed.push(PluginFailure { name, error: e.to_string() }),
            }
        }

        info!(
            successful = report.successful.len(),
            failed = report.failed.len(),
            "Plugin initialization complete"
        );
        Ok(report)
    }

    /// Disable every active plugin, last initialized first. Failures are
    /// recorded and do not stop the teardown.
    pub async fn destroy_all(&self) -> LifecycleReport {
        let targets: Vec<String> = {
            let registry = self.registry.lock();
            registry
                .initialization_order
                .iter()
                .rev()
                .filter(|name| registry.plugins.get(*name).is_some_and(|r| r.state == PluginState::Active))
                .cloned()
                .collect()
        };

        let mut report = LifecycleReport::default();
        for name in targets {
            match self.disable(&name).await {
                Ok(()) => report.successful.push(name),
                Err(e) => report.failed.push(PluginFailure { name, error: e.to_string() }),
            }
        }
        info!(
            successful = report.successful.len(),
            failed = report.failed.len(),
            "Plugin teardown complete"
        );
        report
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin<C>>> {
        self.registry.lock().plugins.get(name).map(|r| r.plugin.clone())
    }

    pub fn get_plugin_state(&self, name: &str) -> Option<PluginState> {
        self.registry.lock().plugins.get(name).map(|r| r.state)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.get_plugin_state(name) == Some(PluginState::Active)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.lock().plugins.contains_key(name)
    }

    /// Names in registration order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.registry.lock().registration_order.clone()
    }

    /// Active plugins in registration order.
    pub fn get_active_plugins(&self) -> Vec<Arc<dyn Plugin<C>>> {
        self.registry
            .lock()
            .ordered()
            .filter(|(_, r)| r.state == PluginState::Active)
            .map(|(_, r)| r.plugin.clone())
            .collect()
    }

    pub fn get_status(&self) -> PluginManagerStatus {
        let (snapshot, initialization_order) = {
            let registry = self.registry.lock();
            let snapshot: Vec<_> = registry
                .ordered()
                .map(|(name, r)| {
                    (
                        name.clone(),
                        r.plugin.clone(),
                        r.state,
                        r.error.clone(),
                        r.registered_at,
                        r.activated_at,
                        r.disabled_at,
                    )
                })
                .collect();
            (snapshot, registry.initialization_order.clone())
        };

        let plugins: Vec<PluginStatus> = snapshot
            .into_iter()
            .map(|(name, plugin, state, error, registered_at, activated_at, disabled_at)| PluginStatus {
                version: plugin.version().to_string(),
                dependencies: plugin.dependencies(),
                initialization_order: initialization_order.iter().position(|n| *n == name),
                name,
                state,
                error,
                registered_at,
                activated_at,
                disabled_at,
            })
            .collect();

        PluginManagerStatus {
            total: plugins.len(),
            active: plugins.iter().filter(|p| p.state == PluginState::Active).count(),
            failed: plugins.iter().filter(|p| p.state == PluginState::Error).count(),
            initialization_order,
            plugins,
        }
    }
}

/// Run a lifecycle hook, turning a panic into an ordinary hook error.
async fn guarded(hook: impl Future<Output = anyhow::Result<()>>) -> anyhow::Result<()> {
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(anyhow!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tessera_core::{Manifest, ViolationKind};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Ctx {
        label: &'static str,
    }

    struct TestPlugin {
        name: String,
        version: String,
        deps: Vec<String>,
        fail_init: bool,
        fail_destroy: bool,
        panic_init: bool,
        panic_destroy: bool,
        manifest: Option<Manifest>,
        destroy_calls: AtomicUsize,
        journal: Journal,
    }

    impl TestPlugin {
        fn new(name: &str, journal: &Journal) -> Self {
            Self {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                deps: Vec::new(),
                fail_init: false,
                fail_destroy: false,
                panic_init: false,
                panic_destroy: false,
                manifest: None,
                destroy_calls: AtomicUsize::new(0),
                journal: journal.clone(),
            }
        }

        fn depends_on(mut self, deps: &[&str]) -> Self {
            self.deps = deps.iter().map(|d| d.to_string()).collect();
            self
        }

        fn failing_init(mut self) -> Self {
            self.fail_init = true;
            self
        }

        fn failing_destroy(mut self) -> Self {
            self.fail_destroy = true;
            self
        }

        fn panicking_init(mut self) -> Self {
            self.panic_init = true;
            self
        }

        fn panicking_destroy(mut self) -> Self {
            self.panic_destroy = true;
            self
        }
    }

    #[async_trait]
    impl Plugin<Ctx> for TestPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            &self.version
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }

        fn manifest(&self) -> Manifest {
            self.manifest.clone().unwrap_or_else(|| {
                Manifest::new()
                    .property("name")
                    .property("version")
                    .function("initialize")
                    .function("destroy")
            })
        }

        async fn initialize(&self, ctx: &Ctx) -> Result<()> {
            self.journal.lock().push(format!("init:{}@{}", self.name, ctx.label));
            if self.panic_init {
                panic!("{} lost its config", self.name);
            }
            if self.fail_init {
                bail!("{} exploded", self.name);
            }
            Ok(())
        }

        async fn destroy(&self) -> Result<()> {
            self.destroy_calls.fetch_add(1, Ordering::SeqCst);
            self.journal.lock().push(format!("destroy:{}", self.name));
            if self.panic_destroy {
                panic!("{} hung up", self.name);
            }
            if self.fail_destroy {
                bail!("{} refused to stop", self.name);
            }
            Ok(())
        }
    }

    fn manager() -> PluginManager<Ctx> {
        PluginManager::new(Arc::new(Ctx { label: "test" })).with_logger(Logger::silent())
    }

    fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn inits(journal: &Journal) -> Vec<String> {
        journal
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix("init:"))
            .map(|e| e.trim_end_matches("@test").to_string())
            .collect()
    }

    #[test]
    fn test_register_reports_every_missing_member() {
        let pm = manager();
        let j = journal();
        let mut plugin = TestPlugin::new("broken", &j);
        plugin.version = String::new();
        plugin.manifest = Some(Manifest::new().property("name").property("version").property("initialize"));

        let report = pm.validate_plugin_interface(&plugin);
        assert!(!report.valid);
        let members: Vec<_> = report.missing_members.iter().map(|v| (v.member.as_str(), v.kind)).collect();
        assert_eq!(
            members,
            vec![
                ("version", ViolationKind::Missing),
                ("initialize", ViolationKind::NotCallable),
                ("destroy", ViolationKind::Missing),
            ]
        );

        let err = pm.register(Arc::new(plugin)).unwrap_err();
        let msg = err.to_string();
        for member in ["version", "initialize", "destroy"] {
            assert!(msg.contains(member), "{msg}");
        }
        match err {
            PluginError::InvalidInterface { missing_members, .. } => assert_eq!(missing_members.len(), 3),
            other => panic!("unexpected {other}"),
        }
        assert!(!pm.is_registered("broken"));
        assert!(pm.plugin_names().is_empty());
    }

    #[test]
    fn test_register_rejects_empty_name_and_duplicates() {
        let pm = manager();
        let j = journal();
        let err = pm.register(Arc::new(TestPlugin::new("", &j))).unwrap_err();
        assert!(err.to_string().contains("<unnamed>"));

        pm.register(Arc::new(TestPlugin::new("a", &j))).unwrap();
        let err = pm.register(Arc::new(TestPlugin::new("a", &j))).unwrap_err();
        assert!(matches!(err, PluginError::AlreadyRegistered(ref n) if n == "a"));
        assert_eq!(pm.get_plugin_state("a"), Some(PluginState::Registered));
    }

    #[tokio::test]
    async fn test_enable_passes_context_and_activates() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("a", &j))).unwrap();

        pm.enable("a").await.unwrap();
        pm.enable("a").await.unwrap();

        assert!(pm.is_active("a"));
        assert_eq!(*j.lock(), vec!["init:a@test"]);
    }

    #[tokio::test]
    async fn test_enable_unknown_plugin() {
        let pm = manager();
        assert!(matches!(pm.enable("ghost").await, Err(PluginError::NotFound(_))));
        assert!(matches!(pm.disable("ghost").await, Err(PluginError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_enable_captures_error_and_blocks_retry() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("b", &j).failing_init())).unwrap();

        let err = pm.enable("b").await.unwrap_err();
        assert!(matches!(err, PluginError::Lifecycle { phase: LifecyclePhase::Initialize, .. }));
        assert_eq!(pm.get_plugin_state("b"), Some(PluginState::Error));
        let status = pm.get_status();
        assert_eq!(status.failed, 1);
        assert_eq!(status.plugins[0].error.as_deref(), Some("b exploded"));

        let err = pm.enable("b").await.unwrap_err();
        assert!(matches!(err, PluginError::InvalidState { state: PluginState::Error, .. }));
        assert_eq!(inits(&j), vec!["b"]);
    }

    #[tokio::test]
    async fn test_disable_runs_destroy_at_most_once() {
        let pm = manager();
        let j = journal();
        let plugin = Arc::new(TestPlugin::new("a", &j));
        pm.register(plugin.clone()).unwrap();
        pm.enable("a").await.unwrap();

        pm.disable("a").await.unwrap();
        pm.disable("a").await.unwrap();
        pm.disable("a").await.unwrap();

        assert_eq!(plugin.destroy_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pm.get_plugin_state("a"), Some(PluginState::Disabled));
        assert!(pm.get_status().plugins[0].disabled_at.is_some());
    }

    #[tokio::test]
    async fn test_disabled_plugin_can_be_enabled_again() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("a", &j))).unwrap();
        pm.enable("a").await.unwrap();
        pm.disable("a").await.unwrap();
        pm.enable("a").await.unwrap();

        assert!(pm.is_active("a"));
        assert_eq!(inits(&j), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_failed_destroy_moves_to_error() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("a", &j).failing_destroy())).unwrap();
        pm.enable("a").await.unwrap();

        let err = pm.disable("a").await.unwrap_err();
        assert!(matches!(err, PluginError::Lifecycle { phase: LifecyclePhase::Destroy, .. }));
        assert_eq!(pm.get_plugin_state("a"), Some(PluginState::Error));
    }

    #[tokio::test]
    async fn test_unregister_rejected_while_active() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("a", &j))).unwrap();
        pm.enable("a").await.unwrap();

        let err = pm.unregister("a").err().unwrap();
        assert!(matches!(err, PluginError::InvalidState { state: PluginState::Active, .. }));

        pm.disable("a").await.unwrap();
        let removed = pm.unregister("a").ok().unwrap();
        assert_eq!(removed.name(), "a");
        assert!(!pm.is_registered("a"));
        assert!(pm.get_status().initialization_order.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_all_respects_dependencies() {
        let pm = manager();
        let j = journal();
        let graph: &[(&str, &[&str])] = &[
            ("api", &["db", "auth"]),
            ("auth", &["db", "config"]),
            ("db", &["config"]),
            ("config", &[]),
            ("metrics", &["ghost"]),
        ];
        for (name, deps) in graph {
            pm.register(Arc::new(TestPlugin::new(name, &j).depends_on(deps))).unwrap();
        }

        let report = pm.initialize_all().await.unwrap();
        assert_eq!(report.successful.len(), 5);
        assert!(report.failed.is_empty());

        let order = inits(&j);
        let at = |n: &str| order.iter().position(|x| x == n).unwrap();
        for (name, deps) in graph {
            for dep in deps.iter().filter(|d| **d != "ghost") {
                assert!(at(dep) < at(name), "{dep} must precede {name}");
            }
        }
        assert_eq!(pm.get_status().initialization_order, order);
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_any_initialize() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("solo", &j))).unwrap();
        pm.register(Arc::new(TestPlugin::new("x", &j).depends_on(&["y"]))).unwrap();
        pm.register(Arc::new(TestPlugin::new("y", &j).depends_on(&["x"]))).unwrap();

        let order = pm.compute_dependency_order();
        assert!(order.has_cycle);
        assert!(order.cycle_info.as_deref().unwrap().contains("x, y"));

        let err = pm.initialize_all().await.unwrap_err();
        assert!(matches!(err, PluginError::DependencyCycle(_)));
        assert!(j.lock().is_empty());
        assert_eq!(pm.get_plugin_state("solo"), Some(PluginState::Registered));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let pm = manager();
        let j = journal();
        for name in ["p1", "p2", "p3", "p4", "p5"] {
            let plugin = TestPlugin::new(name, &j);
            let plugin = if name == "p2" || name == "p4" { plugin.failing_init() } else { plugin };
            pm.register(Arc::new(plugin)).unwrap();
        }

        let report = pm.initialize_all().await.unwrap();

        assert_eq!(report.successful, vec!["p1", "p3", "p5"]);
        assert_eq!(report.failed_names(), vec!["p2", "p4"]);
        assert_eq!(inits(&j).len(), 5);
        assert_eq!(pm.get_active_plugins().len(), 3);
    }

    #[tokio::test]
    async fn test_panicking_initialize_is_isolated() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("bad", &j).panicking_init())).unwrap();
        pm.register(Arc::new(TestPlugin::new("good", &j))).unwrap();

        let report = pm.initialize_all().await.unwrap();

        assert_eq!(report.successful, vec!["good"]);
        assert_eq!(report.failed_names(), vec!["bad"]);
        assert!(report.failed[0].error.contains("bad lost its config"));
        assert_eq!(pm.get_plugin_state("bad"), Some(PluginState::Error));
        assert_eq!(pm.get_plugin_state("good"), Some(PluginState::Active));

        let status = pm.get_status();
        assert_eq!(status.plugins[0].error.as_deref(), Some("panicked: bad lost its config"));
        assert!(pm.unregister("bad").is_ok());
    }

    #[tokio::test]
    async fn test_panicking_destroy_moves_to_error() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("a", &j).panicking_destroy())).unwrap();
        pm.register(Arc::new(TestPlugin::new("b", &j))).unwrap();
        pm.initialize_all().await.unwrap();

        let report = pm.destroy_all().await;

        assert_eq!(report.successful, vec!["b"]);
        assert_eq!(report.failed_names(), vec!["a"]);
        assert_eq!(pm.get_plugin_state("a"), Some(PluginState::Error));
        assert_eq!(pm.get_plugin_state("b"), Some(PluginState::Disabled));
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_dependents() {
        let pm = manager();
        let j = journal();
        let a: Arc<dyn Plugin<Ctx>> = Arc::new(TestPlugin::new("A", &j));
        pm.register(a.clone()).unwrap();
        pm.register(Arc::new(TestPlugin::new("B", &j).depends_on(&["A"]).failing_init())).unwrap();
        pm.register(Arc::new(TestPlugin::new("C", &j).depends_on(&["B"]))).unwrap();

        let report = pm.initialize_all().await.unwrap();

        assert_eq!(report.successful, vec!["A"]);
        assert_eq!(report.failed_names(), vec!["B", "C"]);
        assert!(report.failed[1].error.contains("depends on 'B'"));
        assert_eq!(inits(&j), vec!["A", "B"]);
        assert_eq!(pm.get_plugin_state("C"), Some(PluginState::Error));

        let active = pm.get_active_plugins();
        assert_eq!(active.len(), 1);
        assert!(Arc::ptr_eq(&active[0], &a));
    }

    #[tokio::test]
    async fn test_destroy_all_reverses_initialization_order() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("web", &j).depends_on(&["db"]))).unwrap();
        pm.register(Arc::new(TestPlugin::new("db", &j).depends_on(&["config"]))).unwrap();
        pm.register(Arc::new(TestPlugin::new("config", &j).failing_destroy())).unwrap();
        pm.register(Arc::new(TestPlugin::new("idle", &j))).unwrap();
        pm.initialize_all().await.unwrap();
        pm.disable("idle").await.unwrap();
        j.lock().clear();

        let report = pm.destroy_all().await;

        assert_eq!(*j.lock(), vec!["destroy:web", "destroy:db", "destroy:config"]);
        assert_eq!(report.successful, vec!["web", "db"]);
        assert_eq!(report.failed_names(), vec!["config"]);
        assert!(pm.get_active_plugins().is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_failures_reach_logger() {
        let logged = Arc::new(Mutex::new(Vec::new()));
        let sink = logged.clone();
        let pm = PluginManager::new(Arc::new(Ctx { label: "test" }))
            .with_logger(Logger::new(move |msg, detail| sink.lock().push(format!("{msg}: {detail}"))));
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("b", &j).failing_init())).unwrap();

        pm.initialize_all().await.unwrap();

        assert_eq!(*logged.lock(), vec!["Plugin 'b' failed to initialize: b exploded"]);
    }

    #[tokio::test]
    async fn test_status_reports_each_plugin() {
        let pm = manager();
        let j = journal();
        pm.register(Arc::new(TestPlugin::new("a", &j))).unwrap();
        pm.register(Arc::new(TestPlugin::new("b", &j).depends_on(&["a"]))).unwrap();
        pm.enable("a").await.unwrap();

        let status = pm.get_status();
        assert_eq!((status.total, status.active, status.failed), (2, 1, 0));
        assert_eq!(status.plugins[0].initialization_order, Some(0));
        assert!(status.plugins[0].activated_at.is_some());
        assert_eq!(status.plugins[1].state, PluginState::Registered);
        assert_eq!(status.plugins[1].dependencies, vec!["a"]);
        assert_eq!(status.plugins[1].initialization_order, None);
        assert_eq!(pm.plugin_names(), vec!["a", "b"]);
    }
}
