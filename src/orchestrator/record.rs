//! Shared per-component state for the [`Orchestrator`](super::Orchestrator).
//!
//! One [`AggregateRecord`] stands for a whole component: every registered
//! member maps to the same record, so a level read is a single lookup.
//! Adds are coalesced in a pending buffer and divided once on the next read.

use alloc::vec::Vec;

use crate::arith::{add_level, spread, weighted_merge};
use crate::node::NodeId;

/// Index of a record in the orchestrator's record arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(pub(crate) u32);

/// Size, level and membership of one component.
#[derive(Clone, Debug)]
pub struct AggregateRecord {
    size: u64,
    level: i64,
    pending: i64,
    coalesce: bool,
    /// Members in join order. May still hold released handles until pruned.
    pub(crate) members: Vec<NodeId>,
    /// Members not yet released.
    pub(crate) live: usize,
}

impl AggregateRecord {
    /// Record for two previously unregistered pools.
    pub(crate) fn pair(a: (NodeId, i64), b: (NodeId, i64), coalesce: bool) -> Self {
        let mut members = Vec::with_capacity(2);
        members.push(a.0);
        members.push(b.0);
        Self {
            size: 2,
            level: weighted_merge(a.1, 1, b.1, 1),
            pending: 0,
            coalesce,
            members,
            live: 2,
        }
    }

    /// Pools ever merged into this component.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Level without the pending buffer applied.
    pub fn settled_level(&self) -> i64 {
        self.level
    }

    /// Adds not yet divided over the component.
    pub fn pending(&self) -> i64 {
        self.pending
    }

    /// Buffer `amount`, or apply it at once when coalescing is disabled.
    pub(crate) fn add(&mut self, amount: i64) {
        if !self.coalesce {
            self.apply(amount);
            return;
        }
        match self.pending.checked_add(amount) {
            Some(pending) => self.pending = pending,
            None => {
                let pending = core::mem::take(&mut self.pending);
                self.apply(pending);
                self.apply(amount);
            }
        }
    }

    /// Apply the pending buffer and return the level.
    pub(crate) fn flush(&mut self) -> i64 {
        if self.pending != 0 {
            let pending = core::mem::take(&mut self.pending);
            self.apply(pending);
        }
        self.level
    }

    /// Register one unregistered pool carrying `level`.
    pub(crate) fn attach(&mut self, node: NodeId, level: i64) {
        self.flush();
        self.level = weighted_merge(self.level, self.size, level, 1);
        self.size = self.size.saturating_add(1);
        self.members.push(node);
        self.live += 1;
    }

    /// Fold `other` into `self`. The caller repoints `other`'s members.
    pub(crate) fn absorb(&mut self, mut other: AggregateRecord) {
        self.flush();
        other.flush();
        self.level = weighted_merge(self.level, self.size, other.level, other.size);
        self.size = self.size.saturating_add(other.size);
        self.live += other.live;
        self.members.append(&mut other.members);
    }

    fn apply(&mut self, amount: i64) {
        self.level = add_level(self.level, spread(amount, self.size));
    }
}
