//! Serialisable view of a mesh's partition.
//!
//! A [`MeshSnapshot`] captures every component of a [`PoolMesh`] (size,
//! level, live members) so it can be logged, diffed between the two mesh
//! representations, or shipped to another process. It is a read-only
//! summary; meshes are not rebuilt from it.
//!
//! # no_std
//!
//! This module requires the `serde` feature and only needs `alloc`.

use alloc::vec::Vec;

use crate::mesh::{ComponentSummary, PoolMesh};
use crate::node::NodeId;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Point-in-time partition of a mesh.
///
/// # Example
///
/// ```rust,ignore
/// use pool_mesh::snapshot::MeshSnapshot;
/// use pool_mesh::star::StarMesh;
///
/// let mut mesh = StarMesh::new();
/// let snapshot = MeshSnapshot::from_mesh(&mut mesh);
/// let json = serde_json::to_string(&snapshot).unwrap();
/// let restored: MeshSnapshot = serde_json::from_str(&json).unwrap();
/// ```
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MeshSnapshot {
    /// Format version, [`SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Live pools at snapshot time.
    pub node_count: usize,
    /// Every component, ordered by smallest member.
    pub components: Vec<ComponentSummary>,
}

impl MeshSnapshot {
    /// Capture `mesh`. Takes `&mut` because reading levels may flush buffers.
    pub fn from_mesh<M: PoolMesh + ?Sized>(mesh: &mut M) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            node_count: mesh.node_count(),
            components: mesh.components(),
        }
    }

    /// Number of components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Component containing `node`, if it was live at snapshot time.
    pub fn find_component(&self, node: NodeId) -> Option<&ComponentSummary> {
        self.components.iter().find(|c| c.contains(node))
    }

    /// Whether two snapshots describe the same partition and levels, ignoring
    /// member handles. Used to compare meshes built by different representations.
    pub fn same_shape(&self, other: &MeshSnapshot) -> bool {
        let shape = |s: &MeshSnapshot| {
            let mut shape: Vec<(u64, i64, usize)> = s
                .components
                .iter()
                .map(|c| (c.size, c.level, c.members.len()))
                .collect();
            shape.sort_unstable();
            shape
        };
        self.node_count == other.node_count && shape(self) == shape(other)
    }
}
