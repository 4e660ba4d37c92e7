//! Dependency Container
//!
//! Named service registry with three lifetimes:
//! - `Singleton`: built once, shared by every resolve
//! - `Transient`: built on every resolve
//! - `Scoped`: built once per [`Scope`]
//!
//! Factories receive a [`Resolver`] and pull their own dependencies through
//! it, which is how resolution chains are tracked and cycles reported.

pub mod container;
pub mod error;
pub mod registration;
pub mod resolver;
pub mod scope;

pub use container::{ContainerStatus, DependencyContainer, RegistrationReport, ServiceInfo};
pub use error::ContainerError;
pub use registration::{Instance, Lifetime, Source};
pub use resolver::Resolver;
pub use scope::Scope;
