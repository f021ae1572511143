//! Python FFI bindings via PyO3.
//!
//! Exposes both mesh representations to Python with the same four-operation
//! API. Pool handles are opaque `Pool` objects.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from pool_mesh import StarMesh, Orchestrator
//!
//! mesh = StarMesh()
//! a, b = mesh.create(), mesh.create()
//! mesh.add(a, 10)
//! mesh.add(b, 20)
//! mesh.connect(a, b)
//! print(mesh.measure(b))          # 15
//! print(mesh.is_connected(a, b))  # True
//!
//! orch = Orchestrator(coalesce_adds=True)
//! p = orch.create()
//! orch.release(p)
//! orch.release(p)                 # ValueError: pool#0.0 has been released
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::error::MeshError;
use crate::node::NodeId;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::star::StarMesh;

impl From<MeshError> for PyErr {
    fn from(err: MeshError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

// ── Pool handle ──────────────────────────────────────────────────────────────

/// Opaque handle to a pool inside one mesh.
#[pyclass(name = "Pool", frozen)]
#[derive(Clone, Copy)]
pub struct PyPool {
    inner: NodeId,
}

#[pymethods]
impl PyPool {
    /// Arena slot of the pool.
    #[getter]
    pub fn index(&self) -> u32 {
        self.inner.index()
    }

    /// Generation of the slot when the handle was created.
    #[getter]
    pub fn generation(&self) -> u32 {
        self.inner.generation()
    }

    /// Handles compare equal when they name the same pool.
    pub fn __eq__(&self, other: &Self) -> bool {
        self.inner == other.inner
    }

    /// Hash consistent with `__eq__`.
    pub fn __hash__(&self) -> u64 {
        (u64::from(self.inner.index()) << 32) | u64::from(self.inner.generation())
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!("Pool({})", self.inner)
    }
}

impl From<NodeId> for PyPool {
    fn from(inner: NodeId) -> Self {
        Self { inner }
    }
}

// ── StarMesh ─────────────────────────────────────────────────────────────────

/// Pool network stored as one star per component.
#[pyclass(name = "StarMesh")]
pub struct PyStarMesh {
    inner: StarMesh,
}

#[pymethods]
impl PyStarMesh {
    /// Create an empty mesh.
    #[new]
    pub fn new() -> Self {
        Self {
            inner: StarMesh::new(),
        }
    }

    /// Create an isolated pool with level 0. Raises ValueError when full.
    pub fn create(&mut self) -> PyResult<PyPool> {
        Ok(self.inner.try_create()?.into())
    }

    /// Join the components of `a` and `b`.
    pub fn connect(&mut self, a: PyPool, b: PyPool) {
        self.inner.connect(a.inner, b.inner);
    }

    /// Pour `amount` into the pool's component.
    pub fn add(&mut self, pool: PyPool, amount: i64) {
        self.inner.add(pool.inner, amount);
    }

    /// Current level of the pool's component.
    pub fn measure(&self, pool: PyPool) -> i64 {
        self.inner.measure(pool.inner)
    }

    /// Whether `a` and `b` are distinct members of one component.
    pub fn is_connected(&self, a: PyPool, b: PyPool) -> bool {
        self.inner.is_connected(a.inner, b.inner)
    }

    /// Number of pools in the pool's component.
    pub fn component_size(&self, pool: PyPool) -> u64 {
        self.inner.component_size(pool.inner)
    }

    /// Number of pools created.
    pub fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!("StarMesh(pools={})", self.inner.len())
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Pool network backed by a registry of shared aggregate records.
#[pyclass(name = "Orchestrator")]
pub struct PyOrchestrator {
    inner: Orchestrator,
}

#[pymethods]
impl PyOrchestrator {
    /// Create an empty orchestrator.
    ///
    /// Args:
    ///     node_capacity: pools to pre-allocate room for (default 0)
    ///     coalesce_adds: buffer adds and divide once per read (default True)
    #[new]
    #[pyo3(signature = (node_capacity=0, coalesce_adds=true))]
    pub fn new(node_capacity: usize, coalesce_adds: bool) -> Self {
        Self {
            inner: Orchestrator::with_config(OrchestratorConfig {
                node_capacity,
                coalesce_adds,
            }),
        }
    }

    /// Create an unregistered pool with level 0. Raises ValueError when full.
    pub fn create(&mut self) -> PyResult<PyPool> {
        Ok(self.inner.try_create()?.into())
    }

    /// Join the components of `a` and `b`.
    pub fn connect(&mut self, a: PyPool, b: PyPool) {
        self.inner.connect(a.inner, b.inner);
    }

    /// Pour `amount` into the pool's component.
    pub fn add(&mut self, pool: PyPool, amount: i64) {
        self.inner.add(pool.inner, amount);
    }

    /// Current level of the pool's component.
    pub fn measure(&mut self, pool: PyPool) -> i64 {
        self.inner.measure(pool.inner)
    }

    /// Whether `a` and `b` are distinct members of one component.
    pub fn is_connected(&self, a: PyPool, b: PyPool) -> bool {
        self.inner.is_connected(a.inner, b.inner)
    }

    /// Number of pools in the pool's component.
    pub fn component_size(&self, pool: PyPool) -> u64 {
        self.inner.component_size(pool.inner)
    }

    /// Retire a pool. Raises ValueError if it was already released.
    pub fn release(&mut self, pool: PyPool) -> PyResult<()> {
        Ok(self.inner.release(pool.inner)?)
    }

    /// Number of live pools.
    pub fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "Orchestrator(pools={}, records={})",
            self.inner.len(),
            self.inner.record_count()
        )
    }
}

// ── Module entry point ────────────────────────────────────────────────────────

/// Pool mesh Python bindings.
///
/// Exposes `StarMesh`, `Orchestrator` and the opaque `Pool` handle.
#[pymodule]
pub fn pool_mesh(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPool>()?;
    m.add_class::<PyStarMesh>()?;
    m.add_class::<PyOrchestrator>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
