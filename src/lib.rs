//! # mg-transfer
//!
//! mg-transfer is a geometric-multigrid degree-of-freedom transfer engine for
//! PDE codes: given a nested hierarchy of quadrilateral refinement levels with
//! a finite-element space attached to every level, it enumerates dofs both on
//! the active cell cover and per level, extracts boundary-constrained index
//! sets, builds the sparse operators that move a field between adjacent
//! levels, and projects an active-space solution into a full multilevel
//! representation.
//!
//! ## Renumbering invariance
//!
//! The engine's central contract is that transfer results are invariant under
//! renumbering of the per-level index spaces: two independently renumbered
//! enumerations over the identical mesh topology produce, after projection,
//! numerically identical level-wise fields when compared cell by cell, even
//! though the raw index-to-value layout differs. [`validator`] ships the
//! comparison harness that encodes this contract.
//!
//! ## Determinism
//!
//! All traversals iterate cells and levels in a fixed arena order, and sparse
//! assembly goes through ordered triplet maps, so rebuilding any operator
//! from unchanged inputs is bit-identical.
//!
//! ## Usage
//!
//! ```rust
//! # fn try_main() -> Result<(), mg_transfer::mg_error::MgTransferError> {
//! use mg_transfer::prelude::*;
//!
//! let mut mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
//! mesh.refine_global()?;
//! let fe = FeSystem::new(1, 2)?;
//! let handler = DofHandler::distribute(&mesh, &fe)?;
//! let boundary = extract_boundary_indices(&mesh, &fe, &handler, &BoundarySpec::homogeneous(0))?;
//! let matrices = build_transfer_matrices(&mesh, &fe, &handler, &boundary)?;
//! let active = vec![0.0; handler.n_dofs()];
//! let fields = copy_to_hierarchy(&active, &mesh, &handler, &boundary, &matrices)?;
//! assert_eq!(fields.max_level(), mesh.max_level());
//! # Ok(())
//! # }
//! # try_main().unwrap();
//! ```

pub mod boundary;
pub mod dofs;
pub mod fe;
pub mod mesh;
pub mod mg_error;
pub mod output;
pub mod transfer;
pub mod validator;

/// A convenient prelude to import the most-used types and operations:
pub mod prelude {
    pub use crate::boundary::{
        BoundarySpec, extract_active_boundary_indices, extract_boundary_indices,
    };
    pub use crate::dofs::{
        DofHandler, RenumberOrdering, apply_ordering, component_wise, component_wise_on_level,
    };
    pub use crate::fe::FeSystem;
    pub use crate::mesh::{BoundaryId, CellId, MeshHierarchy, VertexId};
    pub use crate::mg_error::MgTransferError;
    pub use crate::output::{for_each_level_cell, write_level_tables};
    pub use crate::transfer::{
        LevelFields, TransferMatrix, build_transfer_matrices, copy_to_hierarchy,
    };
    pub use crate::validator::{Reporter, ValidationReport, Verbosity, compare_hierarchies};
}
