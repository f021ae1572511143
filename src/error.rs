//! Handle-validation errors.
//!
//! The four mesh operations are total and never surface these; they log the
//! error and fall back to a no-op. Fallible entry points such as
//! [`Orchestrator::release`](crate::orchestrator::Orchestrator::release) and
//! the `validate` methods return them directly.

use crate::node::NodeId;

/// Why a [`NodeId`] was rejected by a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// The handle's slot exists but has since been released (and possibly reused).
    #[error("{0} has been released")]
    StaleHandle(NodeId),
    /// The handle's slot was never allocated by this mesh.
    #[error("{0} does not belong to this mesh")]
    UnknownNode(NodeId),
    /// Every `u32` slot index is in use; no further pool can be created.
    #[error("mesh is full: {0} pool slots allocated")]
    CapacityExhausted(usize),
}
