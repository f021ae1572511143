//! Opaque pool handles.
//!
//! A [`NodeId`] is the only way to refer to a pool. Handles are minted by a
//! mesh's `create` and carry a generation counter so that a handle retired
//! by [`Orchestrator::release`](crate::orchestrator::Orchestrator::release)
//! is detected instead of silently aliasing whichever pool reuses its slot.

use core::fmt;

use crate::error::MeshError;

/// Handle to a single pool inside one mesh.
///
/// Cheap to copy and compare. Only meaningful for the mesh that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot this handle points at.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time the handle was minted.
    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub(crate) fn slot(self) -> usize {
        self.index as usize
    }
}

/// Index for the slot appended after `len` existing slots.
///
/// Slot indices are `u32`; `u32::MAX` itself is never handed out.
pub(crate) fn next_index(len: usize) -> Result<u32, MeshError> {
    u32::try_from(len)
        .ok()
        .filter(|&index| index < u32::MAX)
        .ok_or(MeshError::CapacityExhausted(len))
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}.{}", self.index, self.generation)
    }
}
