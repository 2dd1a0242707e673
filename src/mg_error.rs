//! MgTransferError: Unified error type for mg-transfer public APIs
//!
//! This error type is used throughout the mg-transfer library to provide robust,
//! non-panicking error handling for all public APIs. Configuration and
//! structural problems are reported as `Err`; numerical residuals found by the
//! consistency validator are data, not errors (see [`crate::validator`]).

use crate::mesh::{CellId, VertexId};
use thiserror::Error;

/// Unified error type for mg-transfer operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MgTransferError {
    /// Finite-element component map length disagrees with the dof count.
    #[error("component map has {component_map_len} entries but dofs_per_cell is {dofs_per_cell}")]
    ComponentMapMismatch {
        dofs_per_cell: usize,
        component_map_len: usize,
    },
    /// A component map entry references a component that does not exist.
    #[error("component map entry {entry} at local dof {local} exceeds component count {n_components}")]
    ComponentOutOfRange {
        local: usize,
        entry: usize,
        n_components: usize,
    },
    /// Only degree-1 (bilinear) elements are implemented.
    #[error("unsupported polynomial degree {0} (only degree 1 is implemented)")]
    UnsupportedDegree(usize),
    /// A finite element needs at least one solution component.
    #[error("finite element needs at least one component, got {0}")]
    UnsupportedComponentCount(usize),
    /// A renumbering permutation is not a bijection over the index range.
    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),
    /// A dof enumeration failed its bijection invariant.
    #[error("dof enumeration invalid: {0}")]
    InvalidEnumeration(String),
    /// A mesh hierarchy failed its parent/child invariants.
    #[error("mesh hierarchy invariant violated: {0}")]
    InvalidHierarchy(String),
    /// A level index outside the hierarchy's `[min, max]` range.
    #[error("level {level} out of range [{min}, {max}]")]
    LevelOutOfRange {
        level: usize,
        min: usize,
        max: usize,
    },
    /// A cell id that does not name a cell of the hierarchy.
    #[error("cell {0} not found in mesh hierarchy")]
    CellNotFound(CellId),
    /// An operation requiring an active cell was given a refined one.
    #[error("cell {0} is not active")]
    InactiveCell(CellId),
    /// A geometric dof with no index in the queried enumeration.
    #[error("no dof for vertex {vertex} component {component} on level {level}")]
    MissingDof {
        level: usize,
        vertex: VertexId,
        component: usize,
    },
    /// A field vector sized inconsistently with its enumeration.
    #[error("field has {found} entries, expected {expected}")]
    FieldSizeMismatch { expected: usize, found: usize },
    /// A per-level collection sized inconsistently with the hierarchy.
    #[error("expected {expected} levels, found {found}")]
    LevelCountMismatch { expected: usize, found: usize },
    /// Two enumerations over the same mesh disagree on a level's cardinality.
    #[error("structural mismatch on level {level}: {left} dofs vs {right} dofs")]
    StructuralMismatch {
        level: usize,
        left: usize,
        right: usize,
    },
    /// Two enumerations built from different finite elements cannot be compared.
    #[error("cannot compare enumerations with different finite elements ({left} vs {right} dofs per cell)")]
    FiniteElementMismatch { left: usize, right: usize },
    /// A sparse matrix entry outside the matrix dimensions.
    #[error("matrix entry ({row}, {col}) outside {n_rows}x{n_cols}")]
    EntryOutOfBounds {
        row: usize,
        col: usize,
        n_rows: usize,
        n_cols: usize,
    },
    /// An I/O failure while writing level tables.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MgTransferError {
    fn from(err: std::io::Error) -> Self {
        MgTransferError::Io(err.to_string())
    }
}
