use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;
use tessera_core::{InterfaceSpec, Introspect};
use tracing::{debug, info};

use crate::error::ContainerError;
use crate::registration::{decorator, Instance, InterfaceBinding, Lifetime, Registration, Source};
use crate::resolver::{InFlight, Resolver};
use crate::scope::Scope;

/// Maximum number of "did you mean" suggestions in a not-found error.
const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub lifetime: Lifetime,
    pub lazy: bool,
    pub instantiated: bool,
    pub decorators: usize,
    pub interface: Option<String>,
    pub type_name: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerStatus {
    pub total: usize,
    pub singletons: usize,
    pub transients: usize,
    pub scoped: usize,
    pub instantiated: usize,
    pub services: Vec<ServiceInfo>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationReport {
    pub valid: bool,
    pub checked: usize,
    pub issues: Vec<String>,
}

/// Central service registry.
#[derive(Default)]
pub struct DependencyContainer {
    registrations: RwLock<HashMap<String, Arc<Registration>>>,
    /// Services under construction, per resolving thread.
    pub(crate) resolving: Mutex<HashMap<ThreadId, Vec<String>>>,
}

impl DependencyContainer {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a service from any source under any lifetime.
    ///
    /// Transient and scoped services must come from a factory.
    pub fn register<T: Send + Sync + 'static>(
        &self,
        name: &str,
        source: Source<T>,
        lifetime: Lifetime,
    ) -> Result<(), ContainerError> {
        self.insert::<T>(name, source, lifetime, false, None)
    }

    pub fn register_singleton<T, F>(&self, name: &str, factory: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(name, Source::factory(factory), Lifetime::Singleton)
    }

    /// Register an already-built singleton.
    pub fn register_instance<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: T,
    ) -> Result<(), ContainerError> {
        self.register(name, Source::instance(value), Lifetime::Singleton)
    }

    /// Register a singleton the caller keeps sharing; `resolve` returns this
    /// same `Arc`.
    pub fn register_shared<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: Arc<T>,
    ) -> Result<(), ContainerError> {
        self.register(name, Source::shared(value), Lifetime::Singleton)
    }

    pub fn register_transient<T, F>(&self, name: &str, factory: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(name, Source::factory(factory), Lifetime::Transient)
    }

    pub fn register_scoped<T, F>(&self, name: &str, factory: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register(name, Source::factory(factory), Lifetime::Scoped)
    }

    /// Same as [`register_transient`](Self::register_transient).
    pub fn register_factory<T, F>(&self, name: &str, factory: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.register_transient(name, factory)
    }

    /// Register without building; `warm_up` skips lazy singletons.
    pub fn register_lazy<T, F>(
        &self,
        name: &str,
        factory: F,
        lifetime: Lifetime,
    ) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.insert::<T>(name, Source::factory(factory), lifetime, true, None)
    }

    /// Register a service that must satisfy `interface`.
    ///
    /// A factory is run once immediately to validate what it builds; that
    /// instance is discarded. An instance is validated and registered as a
    /// singleton regardless of `lifetime`.
    pub fn register_with_interface<T>(
        &self,
        name: &str,
        source: Source<T>,
        interface: InterfaceSpec,
        lifetime: Lifetime,
    ) -> Result<(), ContainerError>
    where
        T: Introspect + Send + Sync + 'static,
    {
        let binding = InterfaceBinding::new::<T>(interface);
        let lifetime = match &source {
            Source::Instance(value) => {
                check_manifest(name, &binding, value)?;
                Lifetime::Singleton
            }
            Source::Shared(value) => {
                check_manifest(name, &binding, value.as_ref())?;
                Lifetime::Singleton
            }
            Source::Factory(factory) => {
                let probe = Scope::new();
                let in_flight = InFlight::enter(self, name)?;
                let resolver = Resolver::root(self, Some(&probe));
                let built = factory(&resolver).map_err(|e| ContainerError::from_factory(name, e))?;
                drop(in_flight);
                probe.dispose();
                check_manifest(name, &binding, &built)?;
                lifetime
            }
        };
        debug!(service = %name, interface = %binding.spec.name, "Interface validated");
        self.insert::<T>(name, source, lifetime, false, Some(binding))
    }

    fn insert<T: Send + Sync + 'static>(
        &self,
        name: &str,
        source: Source<T>,
        lifetime: Lifetime,
        lazy: bool,
        interface: Option<InterfaceBinding>,
    ) -> Result<(), ContainerError> {
        if source.is_value() && lifetime != Lifetime::Singleton {
            return Err(ContainerError::InvalidProvider { name: name.to_string(), lifetime });
        }

        let mut registrations = self.registrations.write();
        if registrations.contains_key(name) {
            return Err(ContainerError::AlreadyRegistered(name.to_string()));
        }
        let registration = Registration::new(
            name,
            lifetime,
            source.into_provider(),
            lazy,
            interface,
            std::any::type_name::<T>(),
        );
        registrations.insert(name.to_string(), Arc::new(registration));
        debug!(service = %name, %lifetime, lazy, "Service registered");
        Ok(())
    }

    /// Wrap every resolved instance of `name`. Decorators run in registration
    /// order on every resolve, singletons included.
    pub fn decorate<T, F>(&self, name: &str, f: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<T> + Send + Sync + 'static,
    {
        let registration = self.lookup(name)?;
        registration.decorators.write().push(decorator::<T, F>(name, f));
        debug!(service = %name, "Decorator added");
        Ok(())
    }

    pub fn remove(&self, name: &str) -> bool {
        let removed = self.registrations.write().remove(name).is_some();
        if removed {
            debug!(service = %name, "Service removed");
        }
        removed
    }

    pub fn clear(&self) {
        let count = {
            let mut registrations = self.registrations.write();
            let n = registrations.len();
            registrations.clear();
            n
        };
        info!(count, "Container cleared");
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    pub fn resolve<T: Send + Sync + 'static>(
        &self,
        name: &str,
        scope: Option<&Scope>,
    ) -> Result<Arc<T>, ContainerError> {
        Resolver::root(self, scope).resolve(name)
    }

    pub fn resolve_any(&self, name: &str, scope: Option<&Scope>) -> Result<Instance, ContainerError> {
        Resolver::root(self, scope).resolve_any(name)
    }

    /// Like `resolve`, but any failure yields `None`.
    pub fn try_resolve<T: Send + Sync + 'static>(
        &self,
        name: &str,
        scope: Option<&Scope>,
    ) -> Option<Arc<T>> {
        self.resolve(name, scope).ok()
    }

    pub fn create_scope(&self) -> Scope {
        let scope = Scope::new();
        debug!(scope = %scope.id(), "Scope created");
        scope
    }

    /// Build every non-lazy singleton that is not built yet, in name order.
    pub fn warm_up(&self) -> Result<usize, ContainerError> {
        let mut pending: Vec<Arc<Registration>> = self
            .registrations
            .read()
            .values()
            .filter(|r| {
                r.lifetime == Lifetime::Singleton && !r.lazy && r.has_factory() && r.singleton.get().is_none()
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.name.cmp(&b.name));

        for registration in &pending {
            self.resolve_any(&registration.name, None)?;
        }
        info!(count = pending.len(), "Singletons warmed up");
        Ok(pending.len())
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<Arc<Registration>, ContainerError> {
        let registrations = self.registrations.read();
        if let Some(registration) = registrations.get(name) {
            return Ok(registration.clone());
        }

        let mut available: Vec<String> = registrations.keys().cloned().collect();
        available.sort();
        let needle = name.to_lowercase();
        let suggestions = available
            .iter()
            .filter(|candidate| {
                let candidate = candidate.to_lowercase();
                !needle.is_empty() && (candidate.contains(&needle) || needle.contains(&candidate))
            })
            .take(MAX_SUGGESTIONS)
            .cloned()
            .collect();
        Err(ContainerError::NotFound { name: name.to_string(), suggestions, available })
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn has(&self, name: &str) -> bool {
        self.registrations.read().contains_key(name)
    }

    pub fn get_registered_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registrations.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check already-built singletons against their interfaces. Builds nothing.
    pub fn validate_registrations(&self) -> RegistrationReport {
        let registrations: Vec<Arc<Registration>> =
            self.registrations.read().values().cloned().collect();
        let mut report = RegistrationReport { valid: true, checked: registrations.len(), issues: Vec::new() };

        for registration in registrations {
            if let (Some(binding), Some(instance)) = (&registration.interface, registration.singleton.get()) {
                if let Err(e) = binding.check(&registration.name, instance) {
                    report.issues.push(e.to_string());
                }
            }
            if !registration.has_factory() && registration.lifetime != Lifetime::Singleton {
                report.issues.push(format!(
                    "Service '{}' is {} but has no factory",
                    registration.name, registration.lifetime
                ));
            }
        }
        report.issues.sort();
        report.valid = report.issues.is_empty();
        report
    }

    pub fn get_status(&self) -> ContainerStatus {
        let mut services: Vec<ServiceInfo> = self
            .registrations
            .read()
            .values()
            .map(|r| ServiceInfo {
                name: r.name.clone(),
                lifetime: r.lifetime,
                lazy: r.lazy,
                instantiated: r.singleton.get().is_some(),
                decorators: r.decorators.read().len(),
                interface: r.interface.as_ref().map(|b| b.spec.name.clone()),
                type_name: r.type_name.to_string(),
                registered_at: r.registered_at,
            })
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));

        let count = |lifetime| services.iter().filter(|s| s.lifetime == lifetime).count();
        ContainerStatus {
            total: services.len(),
            singletons: count(Lifetime::Singleton),
            transients: count(Lifetime::Transient),
            scoped: count(Lifetime::Scoped),
            instantiated: services.iter().filter(|s| s.instantiated).count(),
            services,
        }
    }
}

fn check_manifest<T: Introspect>(
    name: &str,
    binding: &InterfaceBinding,
    value: &T,
) -> Result<(), ContainerError> {
    binding.spec.check(&value.manifest()).map_err(|violations| ContainerError::InterfaceViolation {
        service: name.to_string(),
        interface: binding.spec.name.clone(),
        violations,
    })
}
