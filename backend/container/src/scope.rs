use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

use crate::error::ContainerError;
use crate::registration::Instance;

/// Cache boundary for scoped services, e.g. one per request.
pub struct Scope {
    id: Uuid,
    instances: Mutex<HashMap<String, Instance>>,
    disposed: AtomicBool,
}

impl Scope {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            instances: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drop every cached instance. Later scoped resolves through this scope fail.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        let released = {
            let mut instances = self.instances.lock();
            let n = instances.len();
            instances.clear();
            n
        };
        debug!(scope = %self.id, released, "Scope disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_or_create(
        &self,
        name: &str,
        create: impl FnOnce() -> Result<Instance, ContainerError>,
    ) -> Result<Instance, ContainerError> {
        if self.is_disposed() {
            return Err(ContainerError::ScopeDisposed(name.to_string()));
        }
        if let Some(existing) = self.instances.lock().get(name) {
            return Ok(existing.clone());
        }

        // The factory may resolve other scoped services, so the lock is not held.
        let created = create()?;
        if self.is_disposed() {
            return Err(ContainerError::ScopeDisposed(name.to_string()));
        }
        Ok(self
            .instances
            .lock()
            .entry(name.to_string())
            .or_insert(created)
            .clone())
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("instances", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
