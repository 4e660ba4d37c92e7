use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::Logger;
use tracing::{debug, info, warn};

use crate::entity::Entity;
use crate::error::UnitOfWorkError;
use crate::repository::DynRepository;

/// A scheduled change against one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Operation {
    Save { repository: String, entity: Value },
    Update { repository: String, id: String, patch: Value },
    Delete { repository: String, id: String },
}

impl Operation {
    pub fn repository(&self) -> &str {
        match self {
            Operation::Save { repository, .. }
            | Operation::Update { repository, .. }
            | Operation::Delete { repository, .. } => repository,
        }
    }
}

/// One executed operation and what the repository returned for it.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub operation: Operation,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreFailure {
    pub repository: String,
    pub error: String,
}

/// What a rollback managed to put back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackReport {
    pub restored: Vec<String>,
    pub failed: Vec<RestoreFailure>,
}

impl RollbackReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct CommitOutcome {
    pub success: bool,
    /// Results of the operations that completed, in scheduling order.
    pub results: Vec<OperationResult>,
    pub error: Option<anyhow::Error>,
    pub failed_operation_index: Option<usize>,
    /// Present when the commit failed and repositories were restored.
    pub rollback: Option<RollbackReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Committed,
    RolledBack,
}

/// All-or-nothing batch of operations across named repositories.
///
/// Operations run strictly in scheduling order. On the first failure every
/// registered repository is restored from the snapshot taken at the start of
/// `commit`. Restoration is best effort: a repository that fails to restore
/// is logged and reported, and the others are still restored.
pub struct UnitOfWork {
    repositories: BTreeMap<String, Arc<dyn DynRepository>>,
    operations: Vec<Operation>,
    snapshots: Option<BTreeMap<String, Vec<Value>>>,
    status: Status,
    logger: Logger,
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self {
            repositories: BTreeMap::new(),
            operations: Vec::new(),
            snapshots: None,
            status: Status::Pending,
            logger: Logger::default(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    fn ensure_pending(&self) -> Result<(), UnitOfWorkError> {
        match self.status {
            Status::Pending => Ok(()),
            Status::Committed => Err(UnitOfWorkError::AlreadyCommitted),
            Status::RolledBack => Err(UnitOfWorkError::AlreadyRolledBack),
        }
    }

    /// Add a repository under `name`, replacing any previous one.
    pub fn register_repository(
        &mut self,
        name: &str,
        repository: Arc<dyn DynRepository>,
    ) -> Result<&mut Self, UnitOfWorkError> {
        self.ensure_pending()?;
        debug!(repository = %name, entity = repository.entity_type(), "Repository registered");
        self.repositories.insert(name.to_string(), repository);
        Ok(self)
    }

    pub fn schedule_save<E: Entity>(&mut self, repository: &str, entity: &E) -> Result<&mut Self, UnitOfWorkError> {
        self.ensure_pending()?;
        let entity = entity.to_json()?;
        self.operations.push(Operation::Save { repository: repository.to_string(), entity });
        Ok(self)
    }

    pub fn schedule_update(&mut self, repository: &str, id: &str, patch: Value) -> Result<&mut Self, UnitOfWorkError> {
        self.ensure_pending()?;
        self.operations.push(Operation::Update {
            repository: repository.to_string(),
            id: id.to_string(),
            patch,
        });
        Ok(self)
    }

    pub fn schedule_delete(&mut self, repository: &str, id: &str) -> Result<&mut Self, UnitOfWorkError> {
        self.ensure_pending()?;
        self.operations.push(Operation::Delete { repository: repository.to_string(), id: id.to_string() });
        Ok(self)
    }

    /// Copy of the scheduled operations.
    pub fn pending_operations(&self) -> Vec<Operation> {
        self.operations.clone()
    }

    pub fn repository_names(&self) -> Vec<String> {
        self.repositories.keys().cloned().collect()
    }

    pub fn is_committed(&self) -> bool {
        self.status == Status::Committed
    }

    pub fn is_rolled_back(&self) -> bool {
        self.status == Status::RolledBack
    }

    /// Execute every scheduled operation, or none of them.
    ///
    /// Returns `Err` only when the unit was already committed or rolled back.
    /// An operation failure is reported through the outcome after the
    /// repositories have been restored.
    pub async fn commit(&mut self) -> Result<CommitOutcome, UnitOfWorkError> {
        self.ensure_pending()?;

        let mut snapshots = BTreeMap::new();
        for (name, repository) in &self.repositories {
            let snapshot = match repository.find_all().await {
                Ok(entities) => entities,
                Err(e) => {
                    debug!(repository = %name, error = %e, "No snapshot available, treating as empty");
                    Vec::new()
                }
            };
            snapshots.insert(name.clone(), snapshot);
        }
        self.snapshots = Some(snapshots);

        let operations = self.operations.clone();
        let mut results = Vec::with_capacity(operations.len());
        for (index, operation) in operations.into_iter().enumerate() {
            match self.execute(&operation).await {
                Ok(value) => results.push(OperationResult { operation, value }),
                Err(error) => {
                    warn!(
                        index,
                        repository = %operation.repository(),
                        error = %error,
                        "Unit of work operation failed, rolling back"
                    );
                    let report = self.restore().await;
                    self.status = Status::RolledBack;
                    return Ok(CommitOutcome {
                        success: false,
                        results,
                        error: Some(error),
                        failed_operation_index: Some(index),
                        rollback: Some(report),
                    });
                }
            }
        }

        self.status = Status::Committed;
        info!(operations = results.len(), "Unit of work committed");
        Ok(CommitOutcome {
            success: true,
            results,
            error: None,
            failed_operation_index: None,
            rollback: None,
        })
    }

    /// Restore every repository from the last snapshot. Without a snapshot
    /// this only marks the unit rolled back.
    pub async fn rollback(&mut self) -> Result<RollbackReport, UnitOfWorkError> {
        if self.status == Status::RolledBack {
            return Err(UnitOfWorkError::AlreadyRolledBack);
        }
        let report = self.restore().await;
        self.status = Status::RolledBack;
        info!(restored = report.restored.len(), failed = report.failed.len(), "Unit of work rolled back");
        Ok(report)
    }

    async fn execute(&self, operation: &Operation) -> anyhow::Result<Value> {
        let repository = self
            .repositories
            .get(operation.repository())
            .ok_or_else(|| UnitOfWorkError::RepositoryNotFound(operation.repository().to_string()))?;

        match operation {
            Operation::Save { entity, .. } => repository.save(entity.clone()).await,
            Operation::Update { id, patch, .. } => repository.update(id, patch.clone()).await,
            Operation::Delete { id, .. } => repository.delete(id).await.map(Value::Bool),
        }
    }

    async fn restore(&self) -> RollbackReport {
        let mut report = RollbackReport::default();
        let Some(snapshots) = &self.snapshots else {
            return report;
        };

        for (name, snapshot) in snapshots {
            let Some(repository) = self.repositories.get(name) else {
                continue;
            };
            match restore_repository(repository.as_ref(), snapshot).await {
                Ok(()) => report.restored.push(name.clone()),
                Err(e) => {
                    let detail = format!("{e:#}");
                    self.logger.log(&format!("Failed to restore repository '{name}' during rollback"), &detail);
                    report.failed.push(RestoreFailure { repository: name.clone(), error: detail });
                }
            }
        }
        report
    }
}

async fn restore_repository(repository: &dyn DynRepository, snapshot: &[Value]) -> anyhow::Result<()> {
    repository.delete_all().await?;
    for entity in snapshot {
        repository.save(entity.clone()).await?;
    }
    Ok(())
}
