//! Structural interface checks.
//!
//! Rust traits are nominal, so a trait bound cannot tell a caller *which*
//! members a service lacks. Implementations instead publish a [`Manifest`] of
//! the members they provide, and an [`InterfaceSpec`] is checked against it at
//! registration time, producing one [`Violation`] per missing or mistyped
//! member.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Violation;

/// What kind of member an implementation declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Property,
    Function,
}

/// The members an implementation declares, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    members: BTreeMap<String, MemberKind>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.members.insert(name.into(), MemberKind::Property);
        self
    }

    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.members.insert(name.into(), MemberKind::Function);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.members.remove(name);
        self
    }

    pub fn kind_of(&self, name: &str) -> Option<MemberKind> {
        self.members.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A required member. `kind: None` only requires presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSpec {
    pub name: String,
    #[serde(default)]
    pub kind: Option<MemberKind>,
}

impl MemberSpec {
    pub fn present(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: None }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: Some(MemberKind::Function) }
    }
}

impl From<&str> for MemberSpec {
    fn from(name: &str) -> Self {
        MemberSpec::present(name)
    }
}

/// A named set of required members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub name: String,
    pub members: Vec<MemberSpec>,
}

impl InterfaceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: Vec::new() }
    }

    /// Require a member to exist, whatever its kind.
    pub fn requires(mut self, member: impl Into<String>) -> Self {
        self.members.push(MemberSpec::present(member));
        self
    }

    /// Require a member to exist and be callable.
    pub fn requires_fn(mut self, member: impl Into<String>) -> Self {
        self.members.push(MemberSpec::function(member));
        self
    }

    /// Check a manifest, collecting every violation rather than stopping at the first.
    pub fn check(&self, manifest: &Manifest) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> = self
            .members
            .iter()
            .filter_map(|spec| match (manifest.kind_of(&spec.name), spec.kind) {
                (None, _) => Some(Violation::missing(&spec.name)),
                (Some(MemberKind::Property), Some(MemberKind::Function)) => {
                    Some(Violation::not_callable(&spec.name))
                }
                _ => None,
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Implemented by anything that can describe its own members.
pub trait Introspect {
    fn manifest(&self) -> Manifest;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViolationKind;

    fn messenger() -> InterfaceSpec {
        InterfaceSpec::new("Messenger")
            .requires("account_id")
            .requires_fn("send")
            .requires_fn("receive")
    }

    #[test]
    fn test_conforming_manifest_passes() {
        let manifest = Manifest::new()
            .property("account_id")
            .function("send")
            .function("receive")
            .function("extra");
        assert!(messenger().check(&manifest).is_ok());
    }

    #[test]
    fn test_reports_every_missing_member() {
        let manifest = Manifest::new().property("account_id");
        let violations = messenger().check(&manifest).unwrap_err();
        let names: Vec<_> = violations.iter().map(|v| v.member.as_str()).collect();
        assert_eq!(names, vec!["send", "receive"]);
        assert!(violations.iter().all(|v| v.kind == ViolationKind::Missing));
    }

    #[test]
    fn test_property_where_function_required() {
        let manifest = Manifest::new()
            .property("account_id")
            .property("send")
            .function("receive");
        let violations = messenger().check(&manifest).unwrap_err();
        assert_eq!(violations, vec![Violation::not_callable("send")]);
    }

    #[test]
    fn test_presence_only_accepts_functions() {
        let spec = InterfaceSpec::new("Any").requires("value");
        assert!(spec.check(&Manifest::new().function("value")).is_ok());
    }

    #[test]
    fn test_manifest_without_drops_member() {
        let manifest = Manifest::new().function("send").without("send");
        assert!(manifest.is_empty());
    }
}
