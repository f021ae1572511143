//! The contract shared by every mesh representation.
//!
//! [`PoolMesh`] is the four-operation API (plus `create`) that callers such as
//! benchmark drivers program against. [`StarMesh`](crate::star::StarMesh) and
//! [`Orchestrator`](crate::orchestrator::Orchestrator) both implement it and
//! must agree on every observable result.
//!
//! # Invariants
//!
//! - **MESH-001**: every live pool belongs to exactly one component.
//! - **MESH-002**: components only grow; `component_size` never decreases.
//! - **MESH-003**: `measure` returns the same level for every member of a component.
//! - **MESH-004**: `is_connected(a, a)` is `false`; self-connection never
//!   establishes membership.

use alloc::vec::Vec;

use crate::node::NodeId;

/// A network of pools joined by channels, each component sharing one water level.
pub trait PoolMesh {
    /// Create a new isolated pool: size 1, level 0.
    fn create(&mut self) -> NodeId;

    /// Join the components of `a` and `b`. Idempotent; `connect(a, a)` is a no-op.
    fn connect(&mut self, a: NodeId, b: NodeId);

    /// Pour `amount` into `node`; it spreads evenly over the whole component.
    fn add(&mut self, node: NodeId, amount: i64);

    /// Current level of `node`'s component.
    fn measure(&mut self, node: NodeId) -> i64;

    /// Whether `a` and `b` are distinct members of the same component.
    fn is_connected(&self, a: NodeId, b: NodeId) -> bool;

    /// Number of pools in `node`'s component (0 for an invalid handle).
    fn component_size(&self, node: NodeId) -> u64;

    /// Number of live pools in the mesh.
    fn node_count(&self) -> usize;

    /// Every component with its size, level and live members.
    ///
    /// Members are sorted; components are ordered by their smallest member.
    fn components(&mut self) -> Vec<ComponentSummary>;
}

/// Point-in-time description of one component.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentSummary {
    /// Number of pools ever merged into the component.
    pub size: u64,
    /// Shared water level.
    pub level: i64,
    /// Live members, sorted ascending.
    pub members: Vec<NodeId>,
}

impl ComponentSummary {
    /// Whether `node` is one of the live members.
    pub fn contains(&self, node: NodeId) -> bool {
        self.members.binary_search(&node).is_ok()
    }
}

/// Sort members and order components by their first member.
pub(crate) fn normalise(components: &mut [ComponentSummary]) {
    for component in components.iter_mut() {
        component.members.sort_unstable();
    }
    components.sort_unstable_by_key(|c| c.members.first().copied());
}
