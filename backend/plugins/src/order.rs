//! Kahn's topological sort over plugin dependencies.
//!
//! Nodes are plugin names; an edge `dep -> plugin` exists for every declared
//! dependency that is itself registered. Ties are broken by registration
//! order so the result is deterministic.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyOrder {
    pub order: Vec<String>,
    pub has_cycle: bool,
    pub cycle_info: Option<String>,
}

/// Sort `nodes`, given in registration order as `(name, dependencies)`.
pub(crate) fn dependency_order(nodes: &[(String, Vec<String>)]) -> DependencyOrder {
    let index: HashMap<&str, usize> =
        nodes.iter().enumerate().map(|(i, (name, _))| (name.as_str(), i)).collect();

    // 1. In-degree per node and dependents per dependency, ignoring unknown names
    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, (_, deps)) in nodes.iter().enumerate() {
        let known: BTreeSet<usize> = deps.iter().filter_map(|d| index.get(d.as_str()).copied()).collect();
        in_degree[i] = known.len();
        for dep in known {
            dependents[dep].push(i);
        }
    }

    // 2. Ready set ordered by registration index
    let mut ready: BTreeSet<usize> =
        in_degree.iter().enumerate().filter(|(_, &d)| d == 0).map(|(i, _)| i).collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.pop_first() {
        order.push(nodes[next].0.clone());
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    // 3. Anything left unplaced sits on or behind a cycle
    if order.len() < nodes.len() {
        let remainder: Vec<&str> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > 0)
            .map(|(i, _)| nodes[i].0.as_str())
            .collect();
        return DependencyOrder {
            order,
            has_cycle: true,
            cycle_info: Some(format!(
                "Circular plugin dependency detected among: {}",
                remainder.join(", ")
            )),
        };
    }

    DependencyOrder { order, has_cycle: false, cycle_info: None }
}
