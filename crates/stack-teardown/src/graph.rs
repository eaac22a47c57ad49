//! Deletion-order graph over resource kinds
//!
//! Edges are static and data-driven: adding a resource kind is a table
//! edit, not a new code path. An edge `(before, after)` means every
//! resource of kind `before` must reach a terminal outcome before any
//! resource of kind `after` is attempted.

use stack_teardown_common::ResourceKind;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Built-in deletion-order edges as `(before, after)`
pub const STANDARD_EDGES: &[(ResourceKind, ResourceKind)] = &[
    (ResourceKind::MountTarget, ResourceKind::Filesystem),
    (ResourceKind::AccessPoint, ResourceKind::Filesystem),
    (ResourceKind::Instance, ResourceKind::SecurityGroup),
    (ResourceKind::Instance, ResourceKind::KeyPair),
    (ResourceKind::SpotRequest, ResourceKind::Instance),
    (ResourceKind::TargetGroup, ResourceKind::LoadBalancer),
    (ResourceKind::PolicyAttachment, ResourceKind::Role),
    (ResourceKind::Role, ResourceKind::InstanceProfile),
];

/// The edge table contains a cycle, so no valid deletion order exists
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("dependency cycle among resource kinds: {}", KindList(.kinds))]
pub struct CycleError {
    /// Kinds that could not be ordered (members of, or blocked by, a cycle)
    pub kinds: Vec<ResourceKind>,
}

struct KindList<'a>(&'a [ResourceKind]);

impl fmt::Display for KindList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.0.iter().map(|k| k.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}

/// Static table of deletion-order edges between resource kinds
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    edges: Vec<(ResourceKind, ResourceKind)>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::standard()
    }
}

impl DependencyGraph {
    /// Graph with the built-in edge table
    pub fn standard() -> Self {
        Self {
            edges: STANDARD_EDGES.to_vec(),
        }
    }

    /// Graph with no edges (order is pure registration sequence)
    pub fn empty() -> Self {
        Self { edges: Vec::new() }
    }

    /// Add an edge: `before` must be deleted before `after`
    pub fn with_edge(mut self, before: ResourceKind, after: ResourceKind) -> Self {
        self.edges.push((before, after));
        self
    }

    pub fn edges(&self) -> &[(ResourceKind, ResourceKind)] {
        &self.edges
    }

    /// Deletion order over every registered kind.
    ///
    /// Kahn's algorithm; among ready kinds the earliest in registration
    /// sequence goes first, so the result is deterministic.
    pub fn full_order(&self) -> Result<Vec<ResourceKind>, CycleError> {
        let mut indegree = [0usize; ResourceKind::ALL.len()];
        for (_, after) in &self.edges {
            indegree[after.registration_index()] += 1;
        }

        let mut ready: BTreeSet<ResourceKind> = ResourceKind::ALL
            .into_iter()
            .filter(|k| indegree[k.registration_index()] == 0)
            .collect();
        let mut order = Vec::with_capacity(ResourceKind::ALL.len());

        while let Some(kind) = ready.pop_first() {
            order.push(kind);
            for (before, after) in &self.edges {
                if *before == kind {
                    let slot = &mut indegree[after.registration_index()];
                    *slot -= 1;
                    if *slot == 0 {
                        ready.insert(*after);
                    }
                }
            }
        }

        if order.len() < ResourceKind::ALL.len() {
            let kinds = ResourceKind::ALL
                .into_iter()
                .filter(|k| indegree[k.registration_index()] > 0)
                .collect();
            return Err(CycleError { kinds });
        }

        Ok(order)
    }

    /// Deletion order for a subset of kinds.
    ///
    /// Sorting always covers the whole table, so transitive constraints
    /// hold even when intermediate kinds are absent, and a cycle anywhere
    /// fails the call.
    pub fn order_for<I>(&self, kinds: I) -> Result<Vec<ResourceKind>, CycleError>
    where
        I: IntoIterator<Item = ResourceKind>,
    {
        let wanted: BTreeSet<ResourceKind> = kinds.into_iter().collect();
        Ok(self
            .full_order()?
            .into_iter()
            .filter(|k| wanted.contains(k))
            .collect())
    }
}
