//! Degree-of-freedom enumeration over a mesh hierarchy.
//!
//! [`DofHandler::distribute`] assigns two families of indices: the *active*
//! enumeration (one index per geometric dof of the active cell cover) and one
//! *per-level* enumeration for every refinement level (covering all cells on
//! that level, refined-away ones included). Both are total bijections onto
//! their own contiguous `[0, n)` ranges; renumbering permutes a bijection's
//! codomain without touching cardinalities or geometric dof identity.
//!
//! A geometric dof is a (vertex, component) pair; the tables are keyed by
//! vertex-major slots so shared vertices naturally share indices between the
//! cells touching them.

use crate::fe::FeSystem;
use crate::mesh::{CellId, MeshHierarchy, VertexId};
use crate::mg_error::MgTransferError;

/// Per-level and active dof enumerations for one mesh hierarchy.
#[derive(Clone, Debug)]
pub struct DofHandler {
    fe: FeSystem,
    n_global_dofs: usize,
    n_level_dofs: Vec<usize>,
    active: Vec<Option<usize>>,
    levels: Vec<Vec<Option<usize>>>,
}

impl DofHandler {
    /// Enumerates all dofs of `mesh` for the element `fe`.
    ///
    /// Traversal is deterministic: levels coarse to fine, cells in arena
    /// order, local dofs in vertex-major order. Rebuilding from an unchanged
    /// mesh reproduces the identical enumeration.
    pub fn distribute(mesh: &MeshHierarchy, fe: &FeSystem) -> Result<Self, MgTransferError> {
        fe.validate()?;
        let nc = fe.n_components();
        let slots = mesh.n_vertices() * nc;
        let n_levels = mesh.n_levels();

        let mut levels = vec![vec![None; slots]; n_levels];
        let mut n_level_dofs = vec![0usize; n_levels];
        for (level, table) in levels.iter_mut().enumerate() {
            let mut next = 0usize;
            for cell in mesh.cells_on_level(level) {
                for vertex in mesh.cell_vertices(cell)? {
                    for component in 0..nc {
                        let slot = &mut table[vertex.get() as usize * nc + component];
                        if slot.is_none() {
                            *slot = Some(next);
                            next += 1;
                        }
                    }
                }
            }
            n_level_dofs[level] = next;
        }

        let mut active = vec![None; slots];
        let mut next = 0usize;
        let active_cells: Vec<CellId> = mesh.active_cells().collect();
        for cell in active_cells {
            for vertex in mesh.cell_vertices(cell)? {
                for component in 0..nc {
                    let slot = &mut active[vertex.get() as usize * nc + component];
                    if slot.is_none() {
                        *slot = Some(next);
                        next += 1;
                    }
                }
            }
        }

        let handler = DofHandler {
            fe: fe.clone(),
            n_global_dofs: next,
            n_level_dofs,
            active,
            levels,
        };
        log::debug!(
            "distributed {} active dofs over {} levels {:?}",
            handler.n_global_dofs,
            n_levels,
            handler.n_level_dofs
        );
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        handler.debug_assert_invariants();
        Ok(handler)
    }

    /// The element this enumeration was built for.
    #[inline]
    pub fn fe(&self) -> &FeSystem {
        &self.fe
    }

    /// Number of dofs in the active enumeration.
    #[inline]
    pub fn n_dofs(&self) -> usize {
        self.n_global_dofs
    }

    /// Number of levels covered by the per-level enumerations.
    #[inline]
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of dofs on `level`.
    pub fn n_dofs_on_level(&self, level: usize) -> Result<usize, MgTransferError> {
        self.n_level_dofs
            .get(level)
            .copied()
            .ok_or(MgTransferError::LevelOutOfRange {
                level,
                min: 0,
                max: self.levels.len().saturating_sub(1),
            })
    }

    /// Dof counts for all levels, coarse to fine.
    #[inline]
    pub fn level_dof_counts(&self) -> &[usize] {
        &self.n_level_dofs
    }

    /// Active index of a geometric dof, or `None` if the vertex is not part
    /// of the active cover.
    #[inline]
    pub fn active_dof_index(&self, vertex: VertexId, component: usize) -> Option<usize> {
        let nc = self.fe.n_components();
        self.active
            .get(vertex.get() as usize * nc + component)
            .copied()
            .flatten()
    }

    /// Level index of a geometric dof, or `None` if the vertex does not
    /// belong to any cell on `level`.
    #[inline]
    pub fn level_dof_index(
        &self,
        level: usize,
        vertex: VertexId,
        component: usize,
    ) -> Option<usize> {
        let nc = self.fe.n_components();
        self.levels
            .get(level)?
            .get(vertex.get() as usize * nc + component)
            .copied()
            .flatten()
    }

    /// Active indices of an active cell's local dofs, in local order.
    pub fn cell_dof_indices(
        &self,
        mesh: &MeshHierarchy,
        cell: CellId,
    ) -> Result<Vec<usize>, MgTransferError> {
        if !mesh.is_active(cell)? {
            return Err(MgTransferError::InactiveCell(cell));
        }
        let vertices = mesh.cell_vertices(cell)?;
        let nc = self.fe.n_components();
        let mut indices = Vec::with_capacity(self.fe.dofs_per_cell());
        for vertex in vertices {
            for component in 0..nc {
                indices.push(self.active_dof_index(vertex, component).ok_or(
                    MgTransferError::MissingDof {
                        level: cell.level(),
                        vertex,
                        component,
                    },
                )?);
            }
        }
        Ok(indices)
    }

    /// Level indices of a cell's local dofs in the cell's own level space,
    /// in local order. Works for active and refined cells alike.
    pub fn cell_level_dof_indices(
        &self,
        mesh: &MeshHierarchy,
        cell: CellId,
    ) -> Result<Vec<usize>, MgTransferError> {
        let vertices = mesh.cell_vertices(cell)?;
        let nc = self.fe.n_components();
        let mut indices = Vec::with_capacity(self.fe.dofs_per_cell());
        for vertex in vertices {
            for component in 0..nc {
                indices.push(self.level_dof_index(cell.level(), vertex, component).ok_or(
                    MgTransferError::MissingDof {
                        level: cell.level(),
                        vertex,
                        component,
                    },
                )?);
            }
        }
        Ok(indices)
    }

    /// Iterates `(vertex, component, index)` for every dof on `level`.
    pub fn level_dof_entries(
        &self,
        level: usize,
    ) -> Result<impl Iterator<Item = (VertexId, usize, usize)> + '_, MgTransferError> {
        let table = self
            .levels
            .get(level)
            .ok_or(MgTransferError::LevelOutOfRange {
                level,
                min: 0,
                max: self.levels.len().saturating_sub(1),
            })?;
        let nc = self.fe.n_components();
        Ok(table.iter().enumerate().filter_map(move |(slot, index)| {
            index.map(|index| (VertexId::new((slot / nc) as u32), slot % nc, index))
        }))
    }

    /// Iterates `(vertex, component, index)` for every active dof.
    pub fn active_dof_entries(&self) -> impl Iterator<Item = (VertexId, usize, usize)> + '_ {
        let nc = self.fe.n_components();
        self.active.iter().enumerate().filter_map(move |(slot, index)| {
            index.map(|index| (VertexId::new((slot / nc) as u32), slot % nc, index))
        })
    }

    /// Replaces the active enumeration by `permutation` applied to its
    /// codomain (`new = permutation[old]`).
    ///
    /// # Errors
    /// `InvalidPermutation` when `permutation` is not a bijection over
    /// `[0, n_dofs())`.
    pub fn renumber_active(&mut self, permutation: &[usize]) -> Result<(), MgTransferError> {
        validate_permutation(permutation, self.n_global_dofs)?;
        for slot in &mut self.active {
            if let Some(index) = slot {
                *index = permutation[*index];
            }
        }
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
        Ok(())
    }

    /// Replaces the enumeration of `level` by `permutation` applied to its
    /// codomain.
    pub fn renumber_level(
        &mut self,
        level: usize,
        permutation: &[usize],
    ) -> Result<(), MgTransferError> {
        let n = self.n_dofs_on_level(level)?;
        validate_permutation(permutation, n)?;
        for slot in &mut self.levels[level] {
            if let Some(index) = slot {
                *index = permutation[*index];
            }
        }
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
        Ok(())
    }

    /// Checks that every enumeration is a total bijection onto its range.
    pub fn validate_invariants(&self) -> Result<(), MgTransferError> {
        check_bijection(&self.active, self.n_global_dofs, "active")?;
        for (level, table) in self.levels.iter().enumerate() {
            check_bijection(table, self.n_level_dofs[level], &format!("level {level}"))?;
        }
        Ok(())
    }

    #[cfg(any(debug_assertions, feature = "check-invariants"))]
    fn debug_assert_invariants(&self) {
        if let Err(err) = self.validate_invariants() {
            panic!("DofHandler invalid: {err}");
        }
    }
}

fn check_bijection(
    table: &[Option<usize>],
    n: usize,
    what: &str,
) -> Result<(), MgTransferError> {
    let mut seen = vec![false; n];
    let mut assigned = 0usize;
    for index in table.iter().flatten() {
        if *index >= n {
            return Err(MgTransferError::InvalidEnumeration(format!(
                "{what} enumeration assigns index {index} outside [0, {n})"
            )));
        }
        if seen[*index] {
            return Err(MgTransferError::InvalidEnumeration(format!(
                "{what} enumeration assigns index {index} twice"
            )));
        }
        seen[*index] = true;
        assigned += 1;
    }
    if assigned != n {
        return Err(MgTransferError::InvalidEnumeration(format!(
            "{what} enumeration covers {assigned} of {n} indices"
        )));
    }
    Ok(())
}

pub(crate) fn validate_permutation(
    permutation: &[usize],
    n: usize,
) -> Result<(), MgTransferError> {
    if permutation.len() != n {
        return Err(MgTransferError::InvalidPermutation(format!(
            "expected {n} entries, got {}",
            permutation.len()
        )));
    }
    let mut seen = vec![false; n];
    for &target in permutation {
        if target >= n {
            return Err(MgTransferError::InvalidPermutation(format!(
                "target {target} outside [0, {n})"
            )));
        }
        if seen[target] {
            return Err(MgTransferError::InvalidPermutation(format!(
                "duplicate target {target}"
            )));
        }
        seen[target] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_mesh() -> MeshHierarchy {
        let mut mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
        mesh.refine_global().unwrap();
        mesh
    }

    #[test]
    fn counts_match_vertex_cover() {
        let mesh = two_level_mesh();
        let fe = FeSystem::new(1, 2).unwrap();
        let handler = DofHandler::distribute(&mesh, &fe).unwrap();
        // active cover: the 3x3 level-1 grid, 2 components
        assert_eq!(handler.n_dofs(), 18);
        assert_eq!(handler.n_dofs_on_level(0).unwrap(), 8);
        assert_eq!(handler.n_dofs_on_level(1).unwrap(), 18);
        handler.validate_invariants().unwrap();
    }

    #[test]
    fn neighboring_cells_share_dofs() {
        let mesh = two_level_mesh();
        let fe = FeSystem::new(1, 1).unwrap();
        let handler = DofHandler::distribute(&mesh, &fe).unwrap();
        // level-1 cells 0 and 1 share an edge: cell 0's right vertices are
        // cell 1's left vertices.
        let left = handler
            .cell_dof_indices(&mesh, CellId::new(1, 0))
            .unwrap();
        let right = handler
            .cell_dof_indices(&mesh, CellId::new(1, 1))
            .unwrap();
        assert_eq!(left[1], right[0]);
        assert_eq!(left[3], right[2]);
    }

    #[test]
    fn refined_cells_keep_level_indices_but_lose_active_ones() {
        let mesh = two_level_mesh();
        let fe = FeSystem::new(1, 1).unwrap();
        let handler = DofHandler::distribute(&mesh, &fe).unwrap();
        let root = CellId::new(0, 0);
        assert_eq!(
            handler.cell_level_dof_indices(&mesh, root).unwrap(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(
            handler.cell_dof_indices(&mesh, root).unwrap_err(),
            MgTransferError::InactiveCell(root)
        );
    }

    #[test]
    fn deterministic_rebuild() {
        let mesh = two_level_mesh();
        let fe = FeSystem::new(1, 2).unwrap();
        let first = DofHandler::distribute(&mesh, &fe).unwrap();
        let second = DofHandler::distribute(&mesh, &fe).unwrap();
        for cell in mesh.active_cells() {
            assert_eq!(
                first.cell_dof_indices(&mesh, cell).unwrap(),
                second.cell_dof_indices(&mesh, cell).unwrap()
            );
        }
    }

    #[test]
    fn bad_permutations_are_rejected() {
        let mesh = two_level_mesh();
        let fe = FeSystem::new(1, 1).unwrap();
        let mut handler = DofHandler::distribute(&mesh, &fe).unwrap();
        let n = handler.n_dofs();
        assert!(matches!(
            handler.renumber_active(&vec![0; n]).unwrap_err(),
            MgTransferError::InvalidPermutation(_)
        ));
        assert!(matches!(
            handler.renumber_active(&[0, 1]).unwrap_err(),
            MgTransferError::InvalidPermutation(_)
        ));
        // identity is fine
        let identity: Vec<usize> = (0..n).collect();
        handler.renumber_active(&identity).unwrap();
        handler.validate_invariants().unwrap();
    }

    #[test]
    fn renumbering_permutes_without_changing_cardinality() {
        let mesh = two_level_mesh();
        let fe = FeSystem::new(1, 1).unwrap();
        let mut handler = DofHandler::distribute(&mesh, &fe).unwrap();
        let n = handler.n_dofs();
        let reversed: Vec<usize> = (0..n).rev().collect();
        handler.renumber_active(&reversed).unwrap();
        assert_eq!(handler.n_dofs(), n);
        handler.validate_invariants().unwrap();
    }
}
