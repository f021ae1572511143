//! Star-topology meshes: every component is a star around one root pool.
//!
//! Each pool is either a **root**, which owns the component's size, level
//! and the set of every other member, or a **leaf**, which only knows its
//! root. Reading a level or testing membership is therefore at most one hop.
//!
//! # Merging
//!
//! `connect` resolves to one of four rules:
//!
//! | Rule | Invoked on | Effect |
//! |------|------------|--------|
//! | unite | idle root, other side in a foreign component | survivor computes the merged level, registers the other root, calls back into it |
//! | yield | idle root that a merging root already lists | hands every peer to the merging root, becomes its leaf |
//! | attach | merging root | adds one peer, points it at itself |
//! | forward | leaf | re-issues the connect on its root |
//!
//! The pool `connect` is invoked on (or that pool's root) survives. The
//! symmetric call-back of the unite rule would loop forever if the survivor
//! were still idle when the yielding root reconnects its peers; the
//! [`RootState::Merging`] state routes those calls to the attach rule instead.
//!
//! # Invariants
//!
//! - **STAR-001**: a leaf's root is always a root (depth ≤ 2).
//! - **STAR-002**: a root's `size` equals its peer count + 1.
//! - **STAR-003**: no root is observable in [`RootState::Merging`] between calls.

use alloc::vec::Vec;
use core::mem;

use hashbrown::HashSet;
use tracing::{debug, trace, warn};

use crate::arith::{add_level, spread, weighted_merge};
use crate::error::MeshError;
use crate::mesh::{normalise, ComponentSummary, PoolMesh};
use crate::node::{next_index, NodeId};

/// Lifecycle state of a root pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootState {
    /// Not inside a merge.
    Idle,
    /// Absorbing another component; incoming connects attach as leaves.
    Merging,
}

/// Public view of a pool's place in its star.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    /// Centre of a star, holding the component's level.
    Root(RootState),
    /// Member pointing at its root.
    Leaf(NodeId),
}

#[derive(Clone, Debug)]
enum Slot {
    Root {
        state: RootState,
        size: u64,
        level: i64,
        peers: HashSet<NodeId>,
    },
    Leaf {
        root: NodeId,
    },
}

impl Slot {
    fn singleton() -> Self {
        Slot::Root {
            state: RootState::Idle,
            size: 1,
            level: 0,
            peers: HashSet::new(),
        }
    }
}

/// Which rule a connect resolves to.
enum Step {
    Noop,
    Forward(NodeId),
    Attach,
    Yield,
    Unite(NodeId),
}

/// A pool network where each component is stored as a star.
#[derive(Clone, Debug, Default)]
pub struct StarMesh {
    slots: Vec<Slot>,
}

impl StarMesh {
    /// Empty mesh.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Empty mesh with room for `capacity` pools.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Number of pools created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` if no pool has been created.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Create an isolated pool (root, size 1, level 0).
    ///
    /// # Panics
    ///
    /// Panics if the mesh already holds `u32::MAX` pools. Use
    /// [`try_create`](Self::try_create) to handle that limit.
    pub fn create(&mut self) -> NodeId {
        match self.try_create() {
            Ok(id) => id,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create an isolated pool, or report that every slot index is taken.
    pub fn try_create(&mut self) -> Result<NodeId, MeshError> {
        let index = next_index(self.slots.len())?;
        self.slots.push(Slot::singleton());
        Ok(NodeId::new(index, 0))
    }

    /// Check that `node` was minted by this mesh.
    pub fn validate(&self, node: NodeId) -> Result<(), MeshError> {
        if node.generation() == 0 && node.slot() < self.slots.len() {
            Ok(())
        } else {
            Err(MeshError::UnknownNode(node))
        }
    }

    /// Join the components of `a` and `b`; `a`'s root becomes the root of both.
    pub fn connect(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        if let Err(err) = self.validate(a).and_then(|()| self.validate(b)) {
            warn!(%err, "ignoring connect");
            return;
        }
        self.dispatch(a, b);
    }

    /// Pour `amount` into `node`'s component.
    ///
    /// The root's level grows by `amount / size`, truncated toward zero.
    pub fn add(&mut self, node: NodeId, amount: i64) {
        if amount == 0 {
            return;
        }
        if let Err(err) = self.validate(node) {
            warn!(%err, "ignoring add");
            return;
        }
        let root = self.root(node);
        if let Slot::Root { size, level, .. } = &mut self.slots[root.slot()] {
            *level = add_level(*level, spread(amount, *size));
        }
    }

    /// Level of `node`'s component (0 for an invalid handle).
    pub fn measure(&self, node: NodeId) -> i64 {
        if let Err(err) = self.validate(node) {
            warn!(%err, "measuring invalid handle");
            return 0;
        }
        match &self.slots[self.root(node).slot()] {
            Slot::Root { level, .. } => *level,
            Slot::Leaf { .. } => 0,
        }
    }

    /// Whether `b` is `a`'s root or a peer of `a`'s root.
    pub fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        if a == b || self.validate(a).is_err() || self.validate(b).is_err() {
            return false;
        }
        let root = self.root(a);
        b == root
            || matches!(&self.slots[root.slot()], Slot::Root { peers, .. } if peers.contains(&b))
    }

    /// Size of `node`'s component (0 for an invalid handle).
    pub fn component_size(&self, node: NodeId) -> u64 {
        if self.validate(node).is_err() {
            return 0;
        }
        match &self.slots[self.root(node).slot()] {
            Slot::Root { size, .. } => *size,
            Slot::Leaf { .. } => 0,
        }
    }

    /// Role of `node`, or `None` for an invalid handle.
    pub fn role(&self, node: NodeId) -> Option<NodeRole> {
        self.validate(node).ok()?;
        Some(match &self.slots[node.slot()] {
            Slot::Root { state, .. } => NodeRole::Root(*state),
            Slot::Leaf { root } => NodeRole::Leaf(*root),
        })
    }

    /// Root of `node`'s star, or `None` for an invalid handle.
    pub fn root_of(&self, node: NodeId) -> Option<NodeId> {
        self.validate(node).ok()?;
        Some(self.root(node))
    }

    /// Every star as a [`ComponentSummary`].
    pub fn components(&self) -> Vec<ComponentSummary> {
        let mut components: Vec<ComponentSummary> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Root {
                    size, level, peers, ..
                } => {
                    let mut members = Vec::with_capacity(peers.len() + 1);
                    members.push(NodeId::new(index as u32, 0));
                    members.extend(peers.iter().copied());
                    Some(ComponentSummary {
                        size: *size,
                        level: *level,
                        members,
                    })
                }
                Slot::Leaf { .. } => None,
            })
            .collect();
        normalise(&mut components);
        components
    }

    // ── Internal helpers ───────────────────────────────────────────────────

    fn root(&self, node: NodeId) -> NodeId {
        match &self.slots[node.slot()] {
            Slot::Root { .. } => node,
            Slot::Leaf { root } => *root,
        }
    }

    fn step(&self, a: NodeId, b: NodeId) -> Step {
        match &self.slots[a.slot()] {
            Slot::Leaf { root } if *root == b => Step::Noop,
            Slot::Leaf { root } => Step::Forward(*root),
            Slot::Root { peers, .. } if peers.contains(&b) => Step::Noop,
            Slot::Root {
                state: RootState::Merging,
                ..
            } => Step::Attach,
            Slot::Root {
                state: RootState::Idle,
                ..
            } => {
                let absorbing = matches!(
                    &self.slots[b.slot()],
                    Slot::Root { state: RootState::Merging, peers, .. } if peers.contains(&a)
                );
                if absorbing {
                    Step::Yield
                } else {
                    let other = self.root(b);
                    if other == a {
                        Step::Noop
                    } else {
                        Step::Unite(other)
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        match self.step(a, b) {
            Step::Noop => {}
            Step::Forward(root) => {
                trace!(%a, %root, %b, "forwarding connect to root");
                self.dispatch(root, b);
            }
            Step::Attach => self.attach_leaf(a, b),
            Step::Yield => self.yield_root(a, b),
            Step::Unite(other) => self.unite_roots(a, other),
        }
    }

    /// Merge the star rooted at `other` into the one rooted at `survivor`.
    fn unite_roots(&mut self, survivor: NodeId, other: NodeId) {
        let (other_level, other_size) = match &self.slots[other.slot()] {
            Slot::Root { level, size, .. } => (*level, *size),
            Slot::Leaf { .. } => return,
        };
        match &mut self.slots[survivor.slot()] {
            Slot::Root {
                state,
                size,
                level,
                peers,
            } => {
                *state = RootState::Merging;
                *level = weighted_merge(*level, *size, other_level, other_size);
                *size = size.saturating_add(other_size);
                peers.insert(other);
            }
            Slot::Leaf { .. } => return,
        }
        debug!(%survivor, %other, other_size, "uniting stars");

        // Symmetric registration: `other` sees a merging root that lists it
        // and yields.
        self.dispatch(other, survivor);

        if let Slot::Root { state, size, peers, .. } = &mut self.slots[survivor.slot()] {
            *state = RootState::Idle;
            debug_assert_eq!(*size, peers.len() as u64 + 1);
        }
    }

    /// Hand every peer of `old` to `new_root` and become its leaf.
    fn yield_root(&mut self, old: NodeId, new_root: NodeId) {
        let peers = match mem::replace(&mut self.slots[old.slot()], Slot::Leaf { root: new_root }) {
            Slot::Root { peers, .. } => peers,
            leaf @ Slot::Leaf { .. } => {
                self.slots[old.slot()] = leaf;
                return;
            }
        };
        debug!(%old, %new_root, moved = peers.len(), "yielding root");
        for peer in peers {
            self.dispatch(new_root, peer);
        }
    }

    fn attach_leaf(&mut self, root: NodeId, leaf: NodeId) {
        if let Slot::Root { peers, .. } = &mut self.slots[root.slot()] {
            peers.insert(leaf);
        }
        trace!(%root, %leaf, "attached leaf");
        self.slots[leaf.slot()] = Slot::Leaf { root };
    }
}

impl PoolMesh for StarMesh {
    fn create(&mut self) -> NodeId {
        StarMesh::create(self)
    }

    fn connect(&mut self, a: NodeId, b: NodeId) {
        StarMesh::connect(self, a, b)
    }

    fn add(&mut self, node: NodeId, amount: i64) {
        StarMesh::add(self, node, amount)
    }

    fn measure(&mut self, node: NodeId) -> i64 {
        StarMesh::measure(self, node)
    }

    fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        StarMesh::is_connected(self, a, b)
    }

    fn component_size(&self, node: NodeId) -> u64 {
        StarMesh::component_size(self, node)
    }

    fn node_count(&self) -> usize {
        self.len()
    }

    fn components(&mut self) -> Vec<ComponentSummary> {
        StarMesh::components(self)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
