//! Centralised meshes: a registry maps pools to shared aggregate records.
//!
//! Pools start unregistered and keep a private buffered level, so pools that
//! are never connected cost one arena slot and nothing else. The first
//! `connect` registers them; after that every member of a component points at
//! one [`AggregateRecord`].
//!
//! Merging two records is union-by-size: the record with the shorter member
//! list is folded into the longer one and only its members are repointed.
//! Any pool is repointed at most `log2(N)` times over N pools, so total
//! relinking work is `O(N log N)`.
//!
//! Handles are generation-checked. [`Orchestrator::release`] retires a pool,
//! reclaims its record once no live member remains, and lets a later
//! `create` reuse the slot under a new generation.
//!
//! # Invariants
//!
//! - **ORCH-001**: a registered pool maps to exactly one live record.
//! - **ORCH-002**: a record's `live` count equals its registered, unreleased members.
//! - **ORCH-003**: pending adds are flushed before any level is merged.

mod record;

pub use record::{AggregateRecord, RecordId};

use alloc::vec::Vec;

use hashbrown::HashMap;
use tracing::{debug, trace, warn};

use crate::arith::add_level;
use crate::error::MeshError;
use crate::mesh::{normalise, ComponentSummary, PoolMesh};
use crate::node::{next_index, NodeId};

/// Tuning knobs for an [`Orchestrator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Pools to pre-allocate room for.
    pub node_capacity: usize,
    /// Buffer adds on registered pools and divide once per read (`true`), or
    /// divide on every add (`false`).
    pub coalesce_adds: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            node_capacity: 0,
            coalesce_adds: true,
        }
    }
}

#[derive(Clone, Debug)]
struct NodeSlot {
    generation: u32,
    live: bool,
    /// Level accumulated before the pool is registered.
    buffered: i64,
}

/// A pool network backed by a registry of shared aggregate records.
#[derive(Clone, Debug, Default)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    nodes: Vec<NodeSlot>,
    free_nodes: Vec<u32>,
    registry: HashMap<NodeId, RecordId>,
    records: Vec<Option<AggregateRecord>>,
    free_records: Vec<u32>,
    live_nodes: usize,
}

impl Orchestrator {
    /// Empty orchestrator with the default configuration.
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    /// Empty orchestrator with room for `capacity` pools.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(OrchestratorConfig {
            node_capacity: capacity,
            ..OrchestratorConfig::default()
        })
    }

    /// Empty orchestrator using `config`.
    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self {
            config,
            nodes: Vec::with_capacity(config.node_capacity),
            free_nodes: Vec::new(),
            registry: HashMap::with_capacity(config.node_capacity),
            records: Vec::new(),
            free_records: Vec::new(),
            live_nodes: 0,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Number of live (unreleased) pools.
    pub fn len(&self) -> usize {
        self.live_nodes
    }

    /// `true` if no live pool exists.
    pub fn is_empty(&self) -> bool {
        self.live_nodes == 0
    }

    /// Number of pools that have been registered through `connect`.
    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of aggregate records currently alive.
    pub fn record_count(&self) -> usize {
        self.records.len() - self.free_records.len()
    }

    /// Create an unregistered pool with level 0.
    ///
    /// Reuses a released slot when one is available.
    ///
    /// # Panics
    ///
    /// Panics if the arena already holds `u32::MAX` slots and none can be
    /// reused. Use [`try_create`](Self::try_create) to handle that limit.
    pub fn create(&mut self) -> NodeId {
        match self.try_create() {
            Ok(id) => id,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create an unregistered pool, or report that no slot is available.
    pub fn try_create(&mut self) -> Result<NodeId, MeshError> {
        let id = match self.free_nodes.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index as usize];
                slot.live = true;
                slot.buffered = 0;
                NodeId::new(index, slot.generation)
            }
            None => {
                let index = next_index(self.nodes.len())?;
                self.nodes.push(NodeSlot {
                    generation: 0,
                    live: true,
                    buffered: 0,
                });
                NodeId::new(index, 0)
            }
        };
        self.live_nodes += 1;
        Ok(id)
    }

    /// Check that `node` is a live handle minted by this orchestrator.
    pub fn validate(&self, node: NodeId) -> Result<(), MeshError> {
        match self.nodes.get(node.slot()) {
            None => Err(MeshError::UnknownNode(node)),
            Some(slot) if slot.generation != node.generation() => {
                if node.generation() > slot.generation {
                    Err(MeshError::UnknownNode(node))
                } else {
                    Err(MeshError::StaleHandle(node))
                }
            }
            Some(slot) if !slot.live => Err(MeshError::StaleHandle(node)),
            Some(_) => Ok(()),
        }
    }

    /// Join the components of `a` and `b`.
    pub fn connect(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        if let Err(err) = self.validate(a).and_then(|()| self.validate(b)) {
            warn!(%err, "ignoring connect");
            return;
        }
        match (self.registry.get(&a).copied(), self.registry.get(&b).copied()) {
            (None, None) => self.register_pair(a, b),
            (Some(record), None) => self.register_into(record, b),
            (None, Some(record)) => self.register_into(record, a),
            (Some(left), Some(right)) if left == right => {}
            (Some(left), Some(right)) => self.merge_records(left, right),
        }
    }

    /// Pour `amount` into `node`'s component.
    pub fn add(&mut self, node: NodeId, amount: i64) {
        if amount == 0 {
            return;
        }
        if let Err(err) = self.validate(node) {
            warn!(%err, "ignoring add");
            return;
        }
        match self.registry.get(&node).copied() {
            Some(id) => {
                if let Some(record) = self.record_mut(id) {
                    record.add(amount);
                }
            }
            None => {
                let slot = &mut self.nodes[node.slot()];
                slot.buffered = add_level(slot.buffered, amount);
            }
        }
    }

    /// Level of `node`'s component, flushing any pending adds first.
    pub fn measure(&mut self, node: NodeId) -> i64 {
        if let Err(err) = self.validate(node) {
            warn!(%err, "measuring invalid handle");
            return 0;
        }
        match self.registry.get(&node).copied() {
            Some(id) => self.record_mut(id).map_or(0, AggregateRecord::flush),
            None => self.nodes[node.slot()].buffered,
        }
    }

    /// Whether `a` and `b` are distinct pools sharing a record.
    pub fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        if a == b || self.validate(a).is_err() || self.validate(b).is_err() {
            return false;
        }
        match (self.registry.get(&a), self.registry.get(&b)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    /// Size of `node`'s component (0 for an invalid handle).
    pub fn component_size(&self, node: NodeId) -> u64 {
        if self.validate(node).is_err() {
            return 0;
        }
        self.registry
            .get(&node)
            .and_then(|&id| self.record(id))
            .map_or(1, AggregateRecord::size)
    }

    /// Record `node` is registered with, if any.
    pub fn record_of(&self, node: NodeId) -> Result<Option<&AggregateRecord>, MeshError> {
        self.validate(node)?;
        Ok(self.registry.get(&node).and_then(|&id| self.record(id)))
    }

    /// Retire `node`.
    ///
    /// The handle becomes stale and its slot is recycled by a later
    /// [`create`](Self::create). A slot whose generation has reached
    /// `u32::MAX` is retired instead, so old handles can never match it again.
    /// The component keeps its size; its record is reclaimed once every
    /// member has been released.
    pub fn release(&mut self, node: NodeId) -> Result<(), MeshError> {
        self.validate(node)?;
        let slot = &mut self.nodes[node.slot()];
        slot.live = false;
        slot.buffered = 0;
        match slot.generation.checked_add(1) {
            Some(generation) => {
                slot.generation = generation;
                self.free_nodes.push(node.index());
            }
            None => debug!(%node, "retiring slot with exhausted generations"),
        }
        self.live_nodes -= 1;

        let Some(id) = self.registry.remove(&node) else {
            trace!(%node, "released unregistered pool");
            return Ok(());
        };
        let reclaim = match self.record_mut(id) {
            Some(record) => {
                record.live = record.live.saturating_sub(1);
                record.live == 0
            }
            None => false,
        };
        if reclaim {
            self.records[id.0 as usize] = None;
            self.free_records.push(id.0);
            debug!(%node, record = id.0, "reclaimed record");
        } else {
            self.prune_members(id);
        }
        Ok(())
    }

    /// Every component, including unregistered singletons.
    pub fn components(&mut self) -> Vec<ComponentSummary> {
        let mut components: Vec<ComponentSummary> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.live)
            .map(|(index, slot)| NodeId::new(index as u32, slot.generation))
            .filter(|node| !self.registry.contains_key(node))
            .map(|node| ComponentSummary {
                size: 1,
                level: self.nodes[node.slot()].buffered,
                members: alloc::vec![node],
            })
            .collect();

        for index in 0..self.records.len() {
            let Some(record) = self.records[index].as_mut() else {
                continue;
            };
            let level = record.flush();
            let size = record.size();
            let members: Vec<NodeId> = record.members.clone();
            let members = members
                .into_iter()
                .filter(|&member| self.is_registered_with(member, RecordId(index as u32)))
                .collect();
            components.push(ComponentSummary {
                size,
                level,
                members,
            });
        }
        normalise(&mut components);
        components
    }

    // ── Internal helpers ───────────────────────────────────────────────────

    fn record(&self, id: RecordId) -> Option<&AggregateRecord> {
        self.records.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn record_mut(&mut self, id: RecordId) -> Option<&mut AggregateRecord> {
        self.records.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    fn is_registered_with(&self, node: NodeId, id: RecordId) -> bool {
        self.validate(node).is_ok() && self.registry.get(&node) == Some(&id)
    }

    fn take_buffered(&mut self, node: NodeId) -> i64 {
        core::mem::take(&mut self.nodes[node.slot()].buffered)
    }

    fn insert_record(&mut self, record: AggregateRecord) -> RecordId {
        match self.free_records.pop() {
            Some(index) => {
                self.records[index as usize] = Some(record);
                RecordId(index)
            }
            None => {
                self.records.push(Some(record));
                RecordId(self.records.len() as u32 - 1)
            }
        }
    }

    fn register_pair(&mut self, a: NodeId, b: NodeId) {
        let level_a = self.take_buffered(a);
        let level_b = self.take_buffered(b);
        let record = AggregateRecord::pair((a, level_a), (b, level_b), self.config.coalesce_adds);
        let id = self.insert_record(record);
        self.registry.insert(a, id);
        self.registry.insert(b, id);
        debug!(%a, %b, record = id.0, "registered pair");
    }

    fn register_into(&mut self, id: RecordId, node: NodeId) {
        let level = self.take_buffered(node);
        if let Some(record) = self.record_mut(id) {
            record.attach(node, level);
            self.registry.insert(node, id);
            trace!(%node, record = id.0, "attached pool to record");
        }
    }

    /// Union-by-size on the member lists; ties keep `left`.
    fn merge_records(&mut self, left: RecordId, right: RecordId) {
        let left_len = self.record(left).map_or(0, |r| r.members.len());
        let right_len = self.record(right).map_or(0, |r| r.members.len());
        let (keep, fold) = if right_len > left_len {
            (right, left)
        } else {
            (left, right)
        };

        let Some(folded) = self.records[fold.0 as usize].take() else {
            return;
        };
        self.free_records.push(fold.0);

        let mut moved = 0usize;
        for &member in &folded.members {
            if self.is_registered_with(member, fold) {
                self.registry.insert(member, keep);
                moved += 1;
            }
        }
        if let Some(record) = self.record_mut(keep) {
            record.absorb(folded);
        }
        self.prune_members(keep);
        debug!(keep = keep.0, fold = fold.0, moved, "merged records");
    }

    /// Drop released handles once they make up more than half the list.
    fn prune_members(&mut self, id: RecordId) {
        let Some(record) = self.records.get(id.0 as usize).and_then(Option::as_ref) else {
            return;
        };
        if record.members.len() <= record.live.saturating_mul(2) {
            return;
        }
        let members: Vec<NodeId> = record
            .members
            .iter()
            .copied()
            .filter(|&member| self.is_registered_with(member, id))
            .collect();
        if let Some(record) = self.record_mut(id) {
            record.members = members;
        }
    }
}

impl PoolMesh for Orchestrator {
    fn create(&mut self) -> NodeId {
        Orchestrator::create(self)
    }

    fn connect(&mut self, a: NodeId, b: NodeId) {
        Orchestrator::connect(self, a, b)
    }

    fn add(&mut self, node: NodeId, amount: i64) {
        Orchestrator::add(self, node, amount)
    }

    fn measure(&mut self, node: NodeId) -> i64 {
        Orchestrator::measure(self, node)
    }

    fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        Orchestrator::is_connected(self, a, b)
    }

    fn component_size(&self, node: NodeId) -> u64 {
        Orchestrator::component_size(self, node)
    }

    fn node_count(&self) -> usize {
        self.len()
    }

    fn components(&mut self) -> Vec<ComponentSummary> {
        Orchestrator::components(self)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator_with(levels: &[i64]) -> (Orchestrator, Vec<NodeId>) {
        let mut mesh = Orchestrator::new();
        let ids = levels
            .iter()
            .map(|&level| {
                let id = mesh.create();
                mesh.add(id, level);
                id
            })
            .collect();
        (mesh, ids)
    }

    #[test]
    fn test_pools_register_lazily() {
        let (mut mesh, ids) = orchestrator_with(&[10, 20, 12]);
        assert_eq!(mesh.registered_count(), 0);
        assert_eq!(mesh.record_count(), 0);
        assert_eq!(mesh.measure(ids[0]), 10);

        mesh.connect(ids[0], ids[1]);
        assert_eq!(mesh.registered_count(), 2);
        assert_eq!(mesh.record_count(), 1);
        assert_eq!(mesh.record_of(ids[2]).map(|r| r.is_none()), Ok(true));
    }

    #[test]
    fn test_self_connect_does_not_register() {
        let (mut mesh, ids) = orchestrator_with(&[10]);
        mesh.connect(ids[0], ids[0]);
        assert_eq!(mesh.registered_count(), 0);
        assert!(!mesh.is_connected(ids[0], ids[0]));
        assert_eq!(mesh.measure(ids[0]), 10);
    }

    #[test]
    fn test_attach_to_existing_record() {
        let (mut mesh, ids) = orchestrator_with(&[10, 20, 12]);
        mesh.connect(ids[0], ids[1]);
        mesh.connect(ids[2], ids[0]);
        assert_eq!(mesh.record_count(), 1);
        assert_eq!(mesh.component_size(ids[2]), 3);
        assert_eq!(mesh.measure(ids[1]), 14);
    }

    #[test]
    fn test_smaller_record_is_folded_into_larger() {
        let mut mesh = Orchestrator::new();
        let big: Vec<NodeId> = (0..4).map(|_| mesh.create()).collect();
        let small: Vec<NodeId> = (0..2).map(|_| mesh.create()).collect();
        for pair in big.windows(2) {
            mesh.connect(pair[0], pair[1]);
        }
        mesh.connect(small[0], small[1]);
        let big_record = mesh.registry[&big[0]];

        // Invoked from the small side; the big record still survives.
        mesh.connect(small[0], big[3]);
        assert_eq!(mesh.registry[&small[0]], big_record);
        assert_eq!(mesh.registry[&small[1]], big_record);
        assert_eq!(mesh.record_count(), 1);
        assert_eq!(mesh.component_size(small[1]), 6);
    }

    #[test]
    fn test_pending_adds_flush_before_merge() {
        let (mut mesh, ids) = orchestrator_with(&[10, 10, 12]);
        mesh.connect(ids[0], ids[1]);
        mesh.add(ids[0], 20);
        mesh.connect(ids[0], ids[2]);
        // (20 * 2 + 12) / 3, same as a star mesh would report.
        assert_eq!(mesh.measure(ids[2]), 17);
    }

    #[test]
    fn test_release_reclaims_record_after_last_member() {
        let (mut mesh, ids) = orchestrator_with(&[10, 20]);
        mesh.connect(ids[0], ids[1]);
        assert_eq!(mesh.release(ids[0]), Ok(()));
        assert_eq!(mesh.record_count(), 1);
        assert_eq!(mesh.measure(ids[1]), 15);
        assert_eq!(mesh.component_size(ids[1]), 2);

        assert_eq!(mesh.release(ids[1]), Ok(()));
        assert_eq!(mesh.record_count(), 0);
        assert_eq!(mesh.registered_count(), 0);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_release_twice_is_stale() {
        let (mut mesh, ids) = orchestrator_with(&[10]);
        assert_eq!(mesh.release(ids[0]), Ok(()));
        assert_eq!(mesh.release(ids[0]), Err(MeshError::StaleHandle(ids[0])));
    }

    #[test]
    fn test_released_slot_is_reused_with_new_generation() {
        let (mut mesh, ids) = orchestrator_with(&[10]);
        mesh.release(ids[0]).unwrap();
        let reborn = mesh.create();
        assert_eq!(reborn.index(), ids[0].index());
        assert_eq!(reborn.generation(), ids[0].generation() + 1);
        assert_eq!(mesh.measure(reborn), 0);
        assert_eq!(mesh.validate(ids[0]), Err(MeshError::StaleHandle(ids[0])));
    }

    #[test]
    fn test_slot_with_exhausted_generations_is_retired() {
        let mut mesh = Orchestrator::new();
        let first = mesh.create();
        mesh.nodes[first.slot()].generation = u32::MAX;
        let worn = NodeId::new(first.index(), u32::MAX);

        assert_eq!(mesh.release(worn), Ok(()));
        assert!(mesh.free_nodes.is_empty());
        assert_eq!(mesh.validate(worn), Err(MeshError::StaleHandle(worn)));
        assert_eq!(mesh.validate(first), Err(MeshError::StaleHandle(first)));

        let next = mesh.create();
        assert_eq!(next.index(), first.index() + 1);
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh.validate(worn), Err(MeshError::StaleHandle(worn)));
    }

    #[test]
    fn test_try_create_reuses_released_slot() {
        let mut mesh = Orchestrator::new();
        let a = mesh.try_create().unwrap();
        mesh.release(a).unwrap();
        assert_eq!(mesh.try_create(), Ok(NodeId::new(a.index(), 1)));
        assert_eq!(mesh.len(), 1);
    }

    #[test]
    fn test_stale_handle_does_not_alias_reused_slot() {
        let (mut mesh, ids) = orchestrator_with(&[10, 20]);
        mesh.release(ids[0]).unwrap();
        let reborn = mesh.create();
        mesh.connect(ids[0], ids[1]);
        assert!(!mesh.is_connected(reborn, ids[1]));
        assert_eq!(mesh.registered_count(), 0);
    }

    #[test]
    fn test_unknown_handle_is_rejected() {
        let mesh = Orchestrator::new();
        let ghost = NodeId::new(5, 0);
        assert_eq!(mesh.validate(ghost), Err(MeshError::UnknownNode(ghost)));
        assert_eq!(mesh.component_size(ghost), 0);
    }

    #[test]
    fn test_merge_skips_released_members() {
        let mut mesh = Orchestrator::new();
        let ids: Vec<NodeId> = (0..4).map(|_| mesh.create()).collect();
        mesh.connect(ids[0], ids[1]);
        mesh.connect(ids[2], ids[3]);
        mesh.release(ids[3]).unwrap();
        mesh.connect(ids[0], ids[2]);

        assert!(mesh.is_connected(ids[1], ids[2]));
        assert_eq!(mesh.component_size(ids[0]), 4);
        let components = mesh.components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].members, vec![ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn test_components_include_unregistered_singletons() {
        let (mut mesh, ids) = orchestrator_with(&[10, 20, 12]);
        mesh.connect(ids[0], ids[1]);
        mesh.add(ids[1], 10);
        let components = mesh.components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].level, 20);
        assert_eq!(components[0].size, 2);
        assert_eq!(components[1].members, vec![ids[2]]);
        assert_eq!(components[1].level, 12);
    }

    #[test]
    fn test_uncoalesced_config_truncates_per_add() {
        let mut mesh = Orchestrator::with_config(OrchestratorConfig {
            coalesce_adds: false,
            ..OrchestratorConfig::default()
        });
        let a = mesh.create();
        let b = mesh.create();
        mesh.connect(a, b);
        mesh.add(a, 1);
        mesh.add(b, 1);
        assert_eq!(mesh.measure(a), 0);
    }
}
