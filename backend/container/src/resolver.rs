use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::trace;

use crate::container::DependencyContainer;
use crate::error::ContainerError;
use crate::registration::{Instance, Lifetime};
use crate::scope::Scope;

/// Handle passed to factories for resolving their own dependencies.
///
/// Services under construction are tracked by the container per thread, so
/// a cycle is reported whether a factory goes through this handle or back
/// through the container itself. Parallel resolutions on other threads never
/// see each other's chains.
pub struct Resolver<'a> {
    container: &'a DependencyContainer,
    scope: Option<&'a Scope>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn root(container: &'a DependencyContainer, scope: Option<&'a Scope>) -> Self {
        Self { container, scope }
    }

    pub fn resolve<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        let instance = self.resolve_any(name)?;
        instance.downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn try_resolve<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.resolve(name).ok()
    }

    pub fn resolve_any(&self, name: &str) -> Result<Instance, ContainerError> {
        let in_flight = InFlight::enter(self.container, name)?;
        let registration = self.container.lookup(name)?;
        trace!(service = %name, depth = in_flight.depth, "Resolving");

        let raw = match registration.lifetime {
            Lifetime::Singleton => registration
                .singleton
                .get_or_try_init(|| registration.construct(self))?
                .clone(),
            Lifetime::Transient => registration.construct(self)?,
            Lifetime::Scoped => {
                let scope = self
                    .scope
                    .ok_or_else(|| ContainerError::ScopeRequired(name.to_string()))?;
                scope.get_or_create(name, || registration.construct(self))?
            }
        };
        drop(in_flight);
        registration.decorate(raw)
    }

    pub fn scope(&self) -> Option<&'a Scope> {
        self.scope
    }

    /// Names currently under construction on this thread, outermost first.
    pub fn chain(&self) -> Vec<String> {
        self.container.resolving.lock().get(&thread::current().id()).cloned().unwrap_or_default()
    }

    pub fn container(&self) -> &'a DependencyContainer {
        self.container
    }
}

/// Marks `name` as under construction on the current thread until dropped,
/// including when a factory unwinds.
pub(crate) struct InFlight<'a> {
    container: &'a DependencyContainer,
    thread: ThreadId,
    depth: usize,
}

impl<'a> InFlight<'a> {
    pub(crate) fn enter(container: &'a DependencyContainer, name: &str) -> Result<Self, ContainerError> {
        let thread = thread::current().id();
        let mut resolving = container.resolving.lock();
        let chain = resolving.entry(thread).or_default();
        if chain.iter().any(|n| n == name) {
            let mut chain = chain.clone();
            chain.push(name.to_string());
            return Err(ContainerError::Circular { chain });
        }
        chain.push(name.to_string());
        let depth = chain.len();
        Ok(Self { container, thread, depth })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut resolving = self.container.resolving.lock();
        if let Some(chain) = resolving.get_mut(&self.thread) {
            chain.truncate(self.depth - 1);
            if chain.is_empty() {
                resolving.remove(&self.thread);
            }
        }
    }
}
