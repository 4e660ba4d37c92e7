//! Persistence layer.
//!
//! Repositories store entities; a [`UnitOfWork`] batches save/update/delete
//! operations across several repositories and commits them all or restores
//! every repository to its pre-commit state.

pub mod entity;
pub mod error;
pub mod memory;
pub mod repository;
pub mod unit_of_work;

pub use entity::Entity;
pub use error::{RepositoryError, UnitOfWorkError};
pub use memory::InMemoryRepository;
pub use repository::{erase, DynRepository, ErasedRepository, Repository};
pub use unit_of_work::{
    CommitOutcome, Operation, OperationResult, RestoreFailure, RollbackReport, UnitOfWork,
};
