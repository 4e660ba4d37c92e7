use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tessera_core::json::merge_patch;
use tracing::debug;

use crate::entity::Entity;
use crate::error::RepositoryError;
use crate::repository::Repository;

/// Ordered in-memory repository.
///
/// `save` and `update` reject entities that fail `validate()`, leaving the
/// stored state untouched.
pub struct InMemoryRepository<E> {
    entities: RwLock<Vec<E>>,
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self { entities: RwLock::new(Vec::new()) }
    }

    /// Seed without validation.
    pub fn with_entities(entities: Vec<E>) -> Self {
        Self { entities: RwLock::new(entities) }
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Copy of the current contents, in insertion order.
    pub fn snapshot(&self) -> Vec<E> {
        self.entities.read().clone()
    }

    fn check(entity: &E) -> Result<(), RepositoryError> {
        entity.validate().map_err(|errors| RepositoryError::Validation { id: entity.id(), errors })
    }

    fn upsert(&self, entity: E) {
        let mut entities = self.entities.write();
        let id = entity.id();
        match entities.iter_mut().find(|e| e.id() == id) {
            Some(existing) => *existing = entity,
            None => entities.push(entity),
        }
    }
}

#[async_trait]
impl<E: Entity> Repository for InMemoryRepository<E> {
    type Entity = E;

    async fn find_all(&self) -> Result<Vec<E>> {
        Ok(self.snapshot())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<E>> {
        Ok(self.entities.read().iter().find(|e| e.id() == id).cloned())
    }

    async fn save(&self, entity: E) -> Result<E> {
        Self::check(&entity)?;
        self.upsert(entity.clone());
        debug!(id = %entity.id(), "Entity saved");
        Ok(entity)
    }

    async fn update(&self, id: &str, patch: Value) -> Result<E> {
        let current = self
            .entities
            .read()
            .iter()
            .find(|e| e.id() == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        let mut value = current.to_json().map_err(RepositoryError::from)?;
        merge_patch(&mut value, &patch);
        let updated = E::from_json(value).map_err(RepositoryError::from)?;
        Self::check(&updated)?;

        {
            let mut entities = self.entities.write();
            if let Some(slot) = entities.iter_mut().find(|e| e.id() == id) {
                *slot = updated.clone();
            }
        }
        debug!(id = %id, "Entity updated");
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut entities = self.entities.write();
        let before = entities.len();
        entities.retain(|e| e.id() != id);
        Ok(entities.len() < before)
    }

    async fn delete_all(&self) -> Result<()> {
        self.entities.write().clear();
        Ok(())
    }
}
