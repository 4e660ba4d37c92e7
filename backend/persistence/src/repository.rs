use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::entity::Entity;

/// Typed storage for one entity type.
#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: Entity;

    async fn find_all(&self) -> Result<Vec<Self::Entity>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>>;

    /// Insert or replace by id.
    async fn save(&self, entity: Self::Entity) -> Result<Self::Entity>;

    /// Apply a JSON merge patch to the entity with `id`.
    async fn update(&self, id: &str, patch: Value) -> Result<Self::Entity>;

    /// Returns whether anything was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn delete_all(&self) -> Result<()>;
}

/// A repository with its entity type erased to JSON.
///
/// This is what a [`UnitOfWork`](crate::UnitOfWork) holds, so one unit can
/// span repositories of different entity types. The erasure knows the
/// concrete entity type and uses it to rebuild entities from snapshots.
#[async_trait]
pub trait DynRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Value>>;

    async fn save(&self, entity: Value) -> Result<Value>;

    async fn update(&self, id: &str, patch: Value) -> Result<Value>;

    async fn delete(&self, id: &str) -> Result<bool>;

    async fn delete_all(&self) -> Result<()>;

    /// Rust type name of the stored entity, for diagnostics.
    fn entity_type(&self) -> &'static str;
}

/// Adapter from [`Repository`] to [`DynRepository`].
pub struct ErasedRepository<R> {
    inner: Arc<R>,
}

impl<R> ErasedRepository<R> {
    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }
}

/// Erase a typed repository so it can join a unit of work.
pub fn erase<R: Repository + 'static>(repository: Arc<R>) -> Arc<dyn DynRepository> {
    Arc::new(ErasedRepository { inner: repository })
}

#[async_trait]
impl<R: Repository + 'static> DynRepository for ErasedRepository<R> {
    async fn find_all(&self) -> Result<Vec<Value>> {
        let entities = self.inner.find_all().await?;
        let values = entities.iter().map(Entity::to_json).collect::<serde_json::Result<Vec<_>>>()?;
        Ok(values)
    }

    async fn save(&self, entity: Value) -> Result<Value> {
        let entity = R::Entity::from_json(entity)?;
        let saved = self.inner.save(entity).await?;
        Ok(saved.to_json()?)
    }

    async fn update(&self, id: &str, patch: Value) -> Result<Value> {
        let updated = self.inner.update(id, patch).await?;
        Ok(updated.to_json()?)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn delete_all(&self) -> Result<()> {
        self.inner.delete_all().await
    }

    fn entity_type(&self) -> &'static str {
        std::any::type_name::<R::Entity>()
    }
}
