use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tessera_core::{InterfaceSpec, Introspect, Manifest};

use crate::error::ContainerError;
use crate::resolver::Resolver;

/// A resolved service, type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type Factory = Arc<dyn Fn(&Resolver<'_>) -> anyhow::Result<Instance> + Send + Sync>;
pub(crate) type Decorator = Arc<dyn Fn(Instance) -> Result<Instance, ContainerError> + Send + Sync>;
type ManifestFn = Arc<dyn Fn(&Instance) -> Option<Manifest> + Send + Sync>;
type TypedFactory<T> = Box<dyn Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    Singleton,
    Transient,
    Scoped,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "singleton"),
            Lifetime::Transient => write!(f, "transient"),
            Lifetime::Scoped => write!(f, "scoped"),
        }
    }
}

/// Where a service comes from: a ready value, an already-shared value, or a factory.
pub enum Source<T> {
    Instance(T),
    Shared(Arc<T>),
    Factory(TypedFactory<T>),
}

impl<T: Send + Sync + 'static> Source<T> {
    pub fn instance(value: T) -> Self {
        Source::Instance(value)
    }

    pub fn shared(value: Arc<T>) -> Self {
        Source::Shared(value)
    }

    pub(crate) fn is_value(&self) -> bool {
        !matches!(self, Source::Factory(_))
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Source::Factory(Box::new(f))
    }

    pub(crate) fn into_provider(self) -> Provider {
        match self {
            Source::Instance(value) => Provider::Instance(Arc::new(value)),
            Source::Shared(value) => Provider::Instance(value),
            Source::Factory(f) => {
                Provider::Factory(Arc::new(move |r: &Resolver<'_>| f(r).map(|v| Arc::new(v) as Instance)))
            }
        }
    }
}

pub(crate) enum Provider {
    Instance(Instance),
    Factory(Factory),
}

/// Binds a registration to an interface it must keep satisfying.
pub(crate) struct InterfaceBinding {
    pub(crate) spec: InterfaceSpec,
    manifest: ManifestFn,
}

impl InterfaceBinding {
    pub(crate) fn new<T: Introspect + Send + Sync + 'static>(spec: InterfaceSpec) -> Self {
        Self {
            spec,
            manifest: Arc::new(|instance: &Instance| {
                instance.downcast_ref::<T>().map(Introspect::manifest)
            }),
        }
    }

    pub(crate) fn check(&self, service: &str, instance: &Instance) -> Result<(), ContainerError> {
        let manifest = (self.manifest)(instance).unwrap_or_default();
        self.spec.check(&manifest).map_err(|violations| ContainerError::InterfaceViolation {
            service: service.to_string(),
            interface: self.spec.name.clone(),
            violations,
        })
    }
}

pub(crate) struct Registration {
    pub(crate) name: String,
    pub(crate) lifetime: Lifetime,
    pub(crate) provider: Provider,
    pub(crate) lazy: bool,
    pub(crate) interface: Option<InterfaceBinding>,
    pub(crate) singleton: OnceCell<Instance>,
    pub(crate) decorators: RwLock<Vec<Decorator>>,
    pub(crate) type_name: &'static str,
    pub(crate) registered_at: DateTime<Utc>,
}

impl Registration {
    pub(crate) fn new(
        name: &str,
        lifetime: Lifetime,
        provider: Provider,
        lazy: bool,
        interface: Option<InterfaceBinding>,
        type_name: &'static str,
    ) -> Self {
        let singleton = match (&provider, lifetime) {
            (Provider::Instance(instance), Lifetime::Singleton) => OnceCell::with_value(instance.clone()),
            _ => OnceCell::new(),
        };
        Self {
            name: name.to_string(),
            lifetime,
            provider,
            lazy,
            interface,
            singleton,
            decorators: RwLock::new(Vec::new()),
            type_name,
            registered_at: Utc::now(),
        }
    }

    /// Build a fresh instance. Never consults caches.
    pub(crate) fn construct(&self, resolver: &Resolver<'_>) -> Result<Instance, ContainerError> {
        let instance = match &self.provider {
            Provider::Instance(instance) => instance.clone(),
            Provider::Factory(factory) => {
                factory(resolver).map_err(|e| ContainerError::from_factory(&self.name, e))?
            }
        };
        if let Some(binding) = &self.interface {
            binding.check(&self.name, &instance)?;
        }
        Ok(instance)
    }

    /// Run every decorator, in registration order, over a resolved instance.
    pub(crate) fn decorate(&self, instance: Instance) -> Result<Instance, ContainerError> {
        let decorators = self.decorators.read().clone();
        decorators.iter().try_fold(instance, |current, decorator| decorator(current))
    }

    pub(crate) fn has_factory(&self) -> bool {
        matches!(self.provider, Provider::Factory(_))
    }
}

pub(crate) fn decorator<T, F>(name: &str, f: F) -> Decorator
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> Arc<T> + Send + Sync + 'static,
{
    let name = name.to_string();
    Arc::new(move |instance: Instance| {
        let typed = instance.downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
            name: name.clone(),
            expected: std::any::type_name::<T>(),
        })?;
        let decorated: Instance = f(typed);
        Ok(decorated)
    })
}
