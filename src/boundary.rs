//! Boundary constraint extraction.
//!
//! Walks every level of a hierarchy, inspects every cell face lying on a
//! designated boundary, and collects the per-level dof indices that the
//! finite element associates with the boundary-incident vertices. A boundary
//! id not present in the specification is left unconstrained.

use crate::dofs::DofHandler;
use crate::fe::FeSystem;
use crate::mesh::{BoundaryId, FACES_PER_CELL, MeshHierarchy};
use crate::mg_error::MgTransferError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// The set of boundary ids whose dofs are constrained to zero
/// (homogeneous Dirichlet).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundarySpec {
    ids: BTreeSet<BoundaryId>,
}

impl BoundarySpec {
    /// An empty specification constraining nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A specification constraining a single boundary id.
    pub fn homogeneous(id: BoundaryId) -> Self {
        let mut spec = Self::default();
        spec.insert(id);
        spec
    }

    /// Adds a constrained boundary id.
    pub fn insert(&mut self, id: BoundaryId) {
        self.ids.insert(id);
    }

    /// Whether `id` is constrained.
    #[inline]
    pub fn contains(&self, id: BoundaryId) -> bool {
        self.ids.contains(&id)
    }
}

/// Collects, for every level, the level-local indices of constrained dofs.
///
/// Every cell on a level is inspected, active or not; the returned sets are
/// derived from mesh geometry and the current enumeration only, so two
/// enumerations over the same mesh constrain the same geometric dofs.
pub fn extract_boundary_indices(
    mesh: &MeshHierarchy,
    fe: &FeSystem,
    handler: &DofHandler,
    spec: &BoundarySpec,
) -> Result<Vec<BTreeSet<usize>>, MgTransferError> {
    let nc = fe.n_components();
    let mut sets = Vec::with_capacity(mesh.n_levels());
    for level in 0..mesh.n_levels() {
        let mut constrained = BTreeSet::new();
        for cell in mesh.cells_on_level(level) {
            let vertices = mesh.cell_vertices(cell)?;
            for face in 0..FACES_PER_CELL {
                let Some(id) = mesh.boundary_id_of_face(cell, face)? else {
                    continue;
                };
                if !spec.contains(id) {
                    continue;
                }
                for local in MeshHierarchy::face_vertices(face) {
                    let vertex = vertices[local];
                    for component in 0..nc {
                        let index = handler.level_dof_index(level, vertex, component).ok_or(
                            MgTransferError::MissingDof {
                                level,
                                vertex,
                                component,
                            },
                        )?;
                        constrained.insert(index);
                    }
                }
            }
        }
        sets.push(constrained);
    }
    Ok(sets)
}

/// Active-space counterpart of [`extract_boundary_indices`], restricted to
/// active cells.
pub fn extract_active_boundary_indices(
    mesh: &MeshHierarchy,
    fe: &FeSystem,
    handler: &DofHandler,
    spec: &BoundarySpec,
) -> Result<BTreeSet<usize>, MgTransferError> {
    let nc = fe.n_components();
    let mut constrained = BTreeSet::new();
    let active: Vec<_> = mesh.active_cells().collect();
    let mut seen = HashSet::new();
    for cell in active {
        let vertices = mesh.cell_vertices(cell)?;
        for face in 0..FACES_PER_CELL {
            let Some(id) = mesh.boundary_id_of_face(cell, face)? else {
                continue;
            };
            if !spec.contains(id) {
                continue;
            }
            for local in MeshHierarchy::face_vertices(face) {
                let vertex = vertices[local];
                if !seen.insert(vertex) {
                    continue;
                }
                for component in 0..nc {
                    let index = handler.active_dof_index(vertex, component).ok_or(
                        MgTransferError::MissingDof {
                            level: cell.level(),
                            vertex,
                            component,
                        },
                    )?;
                    constrained.insert(index);
                }
            }
        }
    }
    Ok(constrained)
}
