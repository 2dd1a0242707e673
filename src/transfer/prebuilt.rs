//! Prebuilt level-transfer operators and the hierarchy projection driver.
//!
//! [`build_transfer_matrices`] assembles one sparse operator per level
//! transition from the element's nested embedding coefficients, scattered
//! through the current per-level enumerations. The operators act on
//! geometric fields: two enumerations over the same mesh produce matrices
//! that differ only by the index permutation, never in the value any
//! geometric dof receives.
//!
//! [`copy_to_hierarchy`] projects an active-space field into a full
//! per-level representation: injection at the deepest owning level,
//! prolongation everywhere else, constrained dofs pinned to zero.

use crate::dofs::DofHandler;
use crate::fe::FeSystem;
use crate::mesh::{CHILDREN_PER_CELL, MeshHierarchy};
use crate::mg_error::MgTransferError;
use crate::transfer::level_fields::LevelFields;
use crate::transfer::matrix::TransferMatrix;
use std::collections::BTreeSet;

/// Builds the transfer matrix for every level transition `l -> l+1`.
///
/// Entries whose row is constrained on the fine level or whose column is
/// constrained on the coarse level are zeroed; a unit entry is kept where
/// one geometric dof is constrained on both levels, so the constrained
/// value passes through the transfer unchanged.
///
/// # Errors
/// `LevelCountMismatch` when `boundary` or the enumeration does not cover
/// every mesh level.
pub fn build_transfer_matrices(
    mesh: &MeshHierarchy,
    fe: &FeSystem,
    handler: &DofHandler,
    boundary: &[BTreeSet<usize>],
) -> Result<Vec<TransferMatrix>, MgTransferError> {
    let n_levels = mesh.n_levels();
    if boundary.len() != n_levels {
        return Err(MgTransferError::LevelCountMismatch {
            expected: n_levels,
            found: boundary.len(),
        });
    }
    if handler.n_levels() != n_levels {
        return Err(MgTransferError::LevelCountMismatch {
            expected: n_levels,
            found: handler.n_levels(),
        });
    }

    let embeddings: Vec<Vec<Vec<f64>>> = (0..CHILDREN_PER_CELL)
        .map(|child| fe.child_embedding(child))
        .collect();

    let mut matrices = Vec::with_capacity(n_levels.saturating_sub(1));
    for level in 0..n_levels.saturating_sub(1) {
        let coarse_constrained = &boundary[level];
        let fine_constrained = &boundary[level + 1];
        let mut triplets = Vec::new();

        for cell in mesh.cells_on_level(level) {
            let Some(children) = mesh.children(cell)? else {
                continue;
            };
            let parent_dofs = handler.cell_level_dof_indices(mesh, cell)?;
            for (k, &child) in children.iter().enumerate() {
                let child_dofs = handler.cell_level_dof_indices(mesh, child)?;
                for (i, coefficients) in embeddings[k].iter().enumerate() {
                    let row = child_dofs[i];
                    if fine_constrained.contains(&row) {
                        continue;
                    }
                    for (j, &coefficient) in coefficients.iter().enumerate() {
                        if coefficient == 0.0 {
                            continue;
                        }
                        let col = parent_dofs[j];
                        if coarse_constrained.contains(&col) {
                            continue;
                        }
                        triplets.push((row, col, coefficient));
                    }
                }
            }
        }

        // constrained on both levels: the geometric dof keeps its value
        for (vertex, component, col) in handler.level_dof_entries(level)? {
            if !coarse_constrained.contains(&col) {
                continue;
            }
            if let Some(row) = handler.level_dof_index(level + 1, vertex, component) {
                if fine_constrained.contains(&row) {
                    triplets.push((row, col, 1.0));
                }
            }
        }

        let matrix = TransferMatrix::from_triplets(
            handler.n_dofs_on_level(level + 1)?,
            handler.n_dofs_on_level(level)?,
            triplets,
        )?;
        log::debug!(
            "transfer {} -> {}: {}x{} with {} entries",
            level,
            level + 1,
            matrix.n_rows(),
            matrix.n_cols(),
            matrix.nnz()
        );
        matrices.push(matrix);
    }
    Ok(matrices)
}

/// Projects an active-space field into a per-level hierarchy.
///
/// The coarsest level receives direct injection from the cells active on it;
/// every finer level is filled by the corresponding transfer matrix and then
/// overwritten with the values of cells active on that level. Constrained
/// level dofs hold zero in the result, on every level.
///
/// # Errors
/// `FieldSizeMismatch` when `active_field` is not sized to the active
/// enumeration, `LevelCountMismatch` when `boundary` or `matrices` do not
/// match the hierarchy.
pub fn copy_to_hierarchy(
    active_field: &[f64],
    mesh: &MeshHierarchy,
    handler: &DofHandler,
    boundary: &[BTreeSet<usize>],
    matrices: &[TransferMatrix],
) -> Result<LevelFields, MgTransferError> {
    let n_levels = mesh.n_levels();
    if active_field.len() != handler.n_dofs() {
        return Err(MgTransferError::FieldSizeMismatch {
            expected: handler.n_dofs(),
            found: active_field.len(),
        });
    }
    if boundary.len() != n_levels {
        return Err(MgTransferError::LevelCountMismatch {
            expected: n_levels,
            found: boundary.len(),
        });
    }
    if matrices.len() + 1 != n_levels {
        return Err(MgTransferError::LevelCountMismatch {
            expected: n_levels.saturating_sub(1),
            found: matrices.len(),
        });
    }

    let mut fields = LevelFields::reinit(handler);
    inject_active(active_field, mesh, handler, &boundary[0], 0, &mut fields)?;
    for level in 1..n_levels {
        let prolongated = matrices[level - 1].apply(fields.level(level - 1)?)?;
        fields.set_level(level, prolongated)?;
        inject_active(
            active_field,
            mesh,
            handler,
            &boundary[level],
            level,
            &mut fields,
        )?;
    }
    Ok(fields)
}

/// Overwrites the dofs of cells active on `level` with their active-space
/// values; constrained dofs are written as zero.
fn inject_active(
    active_field: &[f64],
    mesh: &MeshHierarchy,
    handler: &DofHandler,
    constrained: &BTreeSet<usize>,
    level: usize,
    fields: &mut LevelFields,
) -> Result<(), MgTransferError> {
    for cell in mesh.cells_on_level(level) {
        if !mesh.is_active(cell)? {
            continue;
        }
        let level_indices = handler.cell_level_dof_indices(mesh, cell)?;
        let active_indices = handler.cell_dof_indices(mesh, cell)?;
        let values = fields.level_mut(level)?;
        for (level_index, active_index) in level_indices.iter().zip(&active_indices) {
            values[*level_index] = if constrained.contains(level_index) {
                0.0
            } else {
                active_field[*active_index]
            };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{BoundarySpec, extract_boundary_indices};

    fn setup(
        n_components: usize,
        constrained: bool,
    ) -> (
        MeshHierarchy,
        FeSystem,
        DofHandler,
        Vec<BTreeSet<usize>>,
    ) {
        let mut mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
        mesh.refine_global().unwrap();
        let fe = FeSystem::new(1, n_components).unwrap();
        let handler = DofHandler::distribute(&mesh, &fe).unwrap();
        let spec = if constrained {
            BoundarySpec::homogeneous(0)
        } else {
            BoundarySpec::new()
        };
        let boundary = extract_boundary_indices(&mesh, &fe, &handler, &spec).unwrap();
        (mesh, fe, handler, boundary)
    }

    #[test]
    fn unconstrained_transfer_preserves_constants() {
        let (mesh, fe, handler, boundary) = setup(1, false);
        let matrices = build_transfer_matrices(&mesh, &fe, &handler, &boundary).unwrap();
        assert_eq!(matrices.len(), 1);
        let coarse = vec![1.0; handler.n_dofs_on_level(0).unwrap()];
        let fine = matrices[0].apply(&coarse).unwrap();
        assert!(fine.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn constrained_rows_and_columns_are_cleared() {
        let (mesh, fe, handler, boundary) = setup(1, true);
        let matrices = build_transfer_matrices(&mesh, &fe, &handler, &boundary).unwrap();
        // all four coarse dofs are constrained; the only surviving entries
        // are the unit diagonal of geometric dofs constrained on both levels
        let coarse = vec![1.0; 4];
        let fine = matrices[0].apply(&coarse).unwrap();
        for (index, &value) in fine.iter().enumerate() {
            if boundary[1].contains(&index) {
                // corner dofs keep the coarse value, edge midpoints get none
                assert!(value == 0.0 || value == 1.0);
            } else {
                assert_eq!(value, 0.0, "interior dof {index} fed by constrained column");
            }
        }
        let kept: usize = fine.iter().filter(|&&v| v == 1.0).count();
        assert_eq!(kept, 4);
    }

    #[test]
    fn rebuild_is_bit_identical() {
        let (mesh, fe, handler, boundary) = setup(2, true);
        let first = build_transfer_matrices(&mesh, &fe, &handler, &boundary).unwrap();
        let second = build_transfer_matrices(&mesh, &fe, &handler, &boundary).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn copy_to_hierarchy_injects_and_prolongates() {
        let (mesh, fe, handler, boundary) = setup(1, false);
        let active = vec![2.0; handler.n_dofs()];
        let matrices = build_transfer_matrices(&mesh, &fe, &handler, &boundary).unwrap();
        let fields = copy_to_hierarchy(&active, &mesh, &handler, &boundary, &matrices).unwrap();
        // level 0 holds nothing (no active cells there), level 1 the field
        assert!(fields.level(0).unwrap().iter().all(|&v| v == 0.0));
        assert!(fields.level(1).unwrap().iter().all(|&v| v == 2.0));
    }

    #[test]
    fn constrained_dofs_hold_zero_after_projection() {
        let (mesh, fe, handler, boundary) = setup(2, true);
        let active = vec![1.0; handler.n_dofs()];
        let matrices = build_transfer_matrices(&mesh, &fe, &handler, &boundary).unwrap();
        let fields = copy_to_hierarchy(&active, &mesh, &handler, &boundary, &matrices).unwrap();
        for level in 0..mesh.n_levels() {
            let values = fields.level(level).unwrap();
            for index in &boundary[level] {
                assert_eq!(values[*index], 0.0, "level {level} dof {index}");
            }
        }
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let (mesh, fe, handler, boundary) = setup(1, false);
        let matrices = build_transfer_matrices(&mesh, &fe, &handler, &boundary).unwrap();
        assert!(matches!(
            build_transfer_matrices(&mesh, &fe, &handler, &boundary[..1]).unwrap_err(),
            MgTransferError::LevelCountMismatch { .. }
        ));
        let short = vec![0.0; handler.n_dofs() - 1];
        assert!(matches!(
            copy_to_hierarchy(&short, &mesh, &handler, &boundary, &matrices).unwrap_err(),
            MgTransferError::FieldSizeMismatch { .. }
        ));
        assert!(matches!(
            copy_to_hierarchy(
                &vec![0.0; handler.n_dofs()],
                &mesh,
                &handler,
                &boundary,
                &[]
            )
            .unwrap_err(),
            MgTransferError::LevelCountMismatch { .. }
        ));
    }
}
