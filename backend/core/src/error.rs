use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a member failed an interface check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The member is not declared at all.
    Missing,
    /// The member is declared, but not as a function.
    NotCallable,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => write!(f, "missing"),
            ViolationKind::NotCallable => write!(f, "not a function"),
        }
    }
}

/// A single member that does not satisfy an interface.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{member} ({kind})")]
pub struct Violation {
    pub member: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn missing(member: impl Into<String>) -> Self {
        Self { member: member.into(), kind: ViolationKind::Missing }
    }

    pub fn not_callable(member: impl Into<String>) -> Self {
        Self { member: member.into(), kind: ViolationKind::NotCallable }
    }
}

/// Render a violation list as `a (missing), b (not a function)`.
pub fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
