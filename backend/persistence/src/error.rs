use thiserror::Error;

/// Failures raised by the bundled repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity '{id}' failed validation: {}", .errors.join("; "))]
    Validation { id: String, errors: Vec<String> },

    #[error("Entity '{0}' not found")]
    NotFound(String),

    #[error("Entity serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    #[error("Unit of work has already been committed")]
    AlreadyCommitted,

    #[error("Unit of work has already been rolled back")]
    AlreadyRolledBack,

    #[error("Repository '{0}' is not registered with this unit of work")]
    RepositoryNotFound(String),

    #[error("Entity serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
