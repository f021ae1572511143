//! # pool-mesh
//!
//! Pools joined by channels share one water level. Connect two pools and their
//! networks merge, the merged level being the size-weighted average of the
//! two. Pour water into any pool and it spreads evenly over the whole network.
//!
//! This is a weighted-average union-find: like classic union-find it answers
//! "are these two in the same set?", but it also keeps one authoritative
//! aggregate per set, consistent under any merge order, without walking the
//! set on every union or read.
//!
//! ---
//!
//! ## Two representations, one contract
//!
//! | Type | Storage | Merge cost | Read cost |
//! |------|---------|------------|-----------|
//! | [`StarMesh`] | every pool is a root or a leaf pointing at its root | relinks the absorbed star | one hop |
//! | [`Orchestrator`] | registry of shared aggregate records | union-by-size, `O(N log N)` total | one lookup + buffered flush |
//!
//! Both implement [`PoolMesh`]:
//!
//! ```text
//! create()            → NodeId          size 1, level 0
//! connect(a, b)                         idempotent, connect(a, a) is a no-op
//! add(node, amount)                     amount / size lands on every member
//! measure(node)       → i64             same for every member
//! is_connected(a, b)  → bool            false for a == b
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`arith`] | [`weighted_merge`](arith::weighted_merge) | Overflow-safe level arithmetic |
//! | [`node`] | [`NodeId`] | Generation-checked pool handles |
//! | [`mesh`] | [`PoolMesh`], [`ComponentSummary`] | Shared contract |
//! | [`star`] | [`StarMesh`], [`RootState`] | Star-topology representation |
//! | [`orchestrator`] | [`Orchestrator`], [`OrchestratorConfig`] | Registry representation |
//! | [`error`] | [`MeshError`] | Handle validation errors |
//! | `snapshot` | `MeshSnapshot` | Serialisable partition summary (requires `serde`) |
//!
//! ## Overflow
//!
//! No operation panics on arithmetic. Merges fall back to 128-bit
//! intermediates; an add that overflows saturates at `i64::MAX`.
//!
//! ## Logging
//!
//! Merges, re-parenting and record reclamation emit `tracing` events at
//! `debug`/`trace`; saturation and invalid handles emit `warn`. Install any
//! subscriber to see them.
//!
//! ## `no_std`
//!
//! This crate is `#![no_std]` + `alloc` by default. Enable the `std` feature
//! to forward `std` to `tracing` and `thiserror`, `serde` for
//! serialisation, and `python-ffi` for the PyO3 bindings.

#![cfg_attr(not(any(test, feature = "std", feature = "python-ffi")), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod arith;
pub mod error;
pub mod mesh;
pub mod node;
pub mod orchestrator;
pub mod star;
#[cfg(feature = "serde")]
pub mod snapshot;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use error::MeshError;
pub use mesh::{ComponentSummary, PoolMesh};
pub use node::NodeId;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use star::{NodeRole, RootState, StarMesh};
