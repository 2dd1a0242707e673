//! Nested quadrilateral mesh hierarchy.
//!
//! The hierarchy is an arena of cells indexed by [`CellId`] (a level/position
//! pair); parent/child relations are stored as index pairs rather than owning
//! pointers, so the refinement tree carries no ownership cycles. Refinement
//! follows a flag-then-execute protocol: cells flagged via
//! [`MeshHierarchy::flag_for_refinement`] are split into `2x2` children by
//! [`MeshHierarchy::execute_refinement`]. Cells are never removed, so levels
//! only grow.
//!
//! Vertices are deduplicated globally through their exact coordinates. All
//! refinement midpoints of a dyadic domain are exactly representable, so the
//! bit patterns of the coordinates are a sound dedup key.

use crate::mg_error::MgTransferError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Identifier attached to a boundary face. The whole exterior of a
/// [`MeshHierarchy::hyper_cube`] domain carries [`DEFAULT_BOUNDARY_ID`].
pub type BoundaryId = u8;

/// Boundary id assigned to the domain exterior.
pub const DEFAULT_BOUNDARY_ID: BoundaryId = 0;

/// Number of vertices of a quadrilateral cell.
pub const VERTICES_PER_CELL: usize = 4;

/// Number of faces of a quadrilateral cell.
pub const FACES_PER_CELL: usize = 4;

/// Number of children a refined cell has.
pub const CHILDREN_PER_CELL: usize = 4;

/// Local vertex pairs of each face, in the face order left/right/bottom/top.
const FACE_VERTICES: [[usize; 2]; FACES_PER_CELL] = [[0, 2], [1, 3], [0, 1], [2, 3]];

/// `VertexId`: a strong handle for a vertex slot in the mesh arena.
///
/// Vertices are shared between cells and between levels; the id names the
/// geometric vertex, independent of any dof numbering.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VertexId(u32);

impl VertexId {
    /// Creates a new `VertexId` from a raw arena slot.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        VertexId(raw)
    }

    /// Returns the raw arena slot of this vertex.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VertexId").field(&self.0).finish()
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `CellId`: (level, position) address of a cell in the hierarchy arena.
///
/// Ordering is level-major, so ordered containers of cell ids iterate
/// coarse-to-fine and in arena order within a level.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    level: u8,
    index: u32,
}

impl CellId {
    /// Creates a cell id from a refinement level and a position on that level.
    #[inline]
    pub const fn new(level: u8, index: u32) -> Self {
        CellId { level, index }
    }

    /// Refinement level of the cell, 0 being the coarsest.
    #[inline]
    pub const fn level(self) -> usize {
        self.level as usize
    }

    /// Position of the cell within its level.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CellId")
            .field(&self.level)
            .field(&self.index)
            .finish()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.level, self.index)
    }
}

/// One quadrilateral cell of the hierarchy.
///
/// Vertex order is lexicographic: `v0=(x0,y0)`, `v1=(x1,y0)`, `v2=(x0,y1)`,
/// `v3=(x1,y1)`.
#[derive(Clone, Debug)]
struct Cell {
    vertices: [VertexId; VERTICES_PER_CELL],
    parent: Option<CellId>,
    children: Option<[CellId; CHILDREN_PER_CELL]>,
}

/// A nested hierarchy of quadrilateral cells over a square domain.
///
/// The hierarchy is immutable between refinement executions; dof enumerations
/// and transfer operators built from it stay valid until the next
/// [`execute_refinement`](Self::execute_refinement).
#[derive(Clone, Debug)]
pub struct MeshHierarchy {
    levels: Vec<Vec<Cell>>,
    vertices: Vec<[f64; 2]>,
    vertex_lookup: HashMap<[u64; 2], VertexId>,
    refine_flags: BTreeSet<CellId>,
    lo: [f64; 2],
    hi: [f64; 2],
}

impl MeshHierarchy {
    /// Creates a hierarchy with a single level-0 cell spanning `[lo, hi]^2`.
    pub fn hyper_cube(lo: f64, hi: f64) -> Self {
        let mut mesh = MeshHierarchy {
            levels: vec![Vec::new()],
            vertices: Vec::new(),
            vertex_lookup: HashMap::new(),
            refine_flags: BTreeSet::new(),
            lo: [lo, lo],
            hi: [hi, hi],
        };
        let vertices = [
            mesh.intern_vertex([lo, lo]),
            mesh.intern_vertex([hi, lo]),
            mesh.intern_vertex([lo, hi]),
            mesh.intern_vertex([hi, hi]),
        ];
        mesh.levels[0].push(Cell {
            vertices,
            parent: None,
            children: None,
        });
        mesh
    }

    /// Number of refinement levels present (at least 1).
    #[inline]
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Finest refinement level present.
    #[inline]
    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// Number of cells on `level`; 0 for levels beyond the hierarchy.
    #[inline]
    pub fn n_cells_on_level(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, Vec::len)
    }

    /// Number of vertex slots in the arena.
    #[inline]
    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Position of a vertex, or `None` for an unknown id.
    #[inline]
    pub fn vertex_position(&self, vertex: VertexId) -> Option<[f64; 2]> {
        self.vertices.get(vertex.get() as usize).copied()
    }

    /// Iterates the cells on `level` in arena order.
    pub fn cells_on_level(&self, level: usize) -> impl Iterator<Item = CellId> {
        let count = self.n_cells_on_level(level);
        (0..count).map(move |index| CellId::new(level as u8, index as u32))
    }

    /// Iterates all active (unrefined) cells, coarse to fine, arena order
    /// within a level. This traversal order is the construction order of the
    /// active dof enumeration.
    pub fn active_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        (0..self.levels.len()).flat_map(move |level| {
            self.levels[level]
                .iter()
                .enumerate()
                .filter_map(move |(index, cell)| {
                    cell.children
                        .is_none()
                        .then(|| CellId::new(level as u8, index as u32))
                })
        })
    }

    /// Whether `cell` has no children.
    pub fn is_active(&self, cell: CellId) -> Result<bool, MgTransferError> {
        Ok(self.cell(cell)?.children.is_none())
    }

    /// The vertices of `cell` in lexicographic order.
    pub fn cell_vertices(
        &self,
        cell: CellId,
    ) -> Result<[VertexId; VERTICES_PER_CELL], MgTransferError> {
        Ok(self.cell(cell)?.vertices)
    }

    /// The parent of `cell`, or `None` on level 0.
    pub fn parent(&self, cell: CellId) -> Result<Option<CellId>, MgTransferError> {
        Ok(self.cell(cell)?.parent)
    }

    /// The children of `cell`, or `None` for an active cell.
    pub fn children(
        &self,
        cell: CellId,
    ) -> Result<Option<[CellId; CHILDREN_PER_CELL]>, MgTransferError> {
        Ok(self.cell(cell)?.children)
    }

    /// Boundary id of a cell face, or `None` for an interior face.
    ///
    /// Face order is left, right, bottom, top; `face` must be below
    /// [`FACES_PER_CELL`]. The domain exterior carries
    /// [`DEFAULT_BOUNDARY_ID`].
    pub fn boundary_id_of_face(
        &self,
        cell: CellId,
        face: usize,
    ) -> Result<Option<BoundaryId>, MgTransferError> {
        debug_assert!(face < FACES_PER_CELL);
        let vertices = self.cell_vertices(cell)?;
        let (axis, bound) = match face {
            0 => (0, self.lo[0]),
            1 => (0, self.hi[0]),
            2 => (1, self.lo[1]),
            _ => (1, self.hi[1]),
        };
        let on_exterior = FACE_VERTICES[face].iter().all(|&local| {
            self.vertices[vertices[local].get() as usize][axis] == bound
        });
        Ok(on_exterior.then_some(DEFAULT_BOUNDARY_ID))
    }

    /// Local vertex indices of a face, matching the order of
    /// [`boundary_id_of_face`](Self::boundary_id_of_face).
    #[inline]
    pub fn face_vertices(face: usize) -> [usize; 2] {
        FACE_VERTICES[face]
    }

    /// Flags an active cell for refinement; refining an already refined cell
    /// is a no-op. Flags are consumed by
    /// [`execute_refinement`](Self::execute_refinement).
    pub fn flag_for_refinement(&mut self, cell: CellId) -> Result<(), MgTransferError> {
        if self.cell(cell)?.children.is_some() {
            return Ok(());
        }
        self.refine_flags.insert(cell);
        Ok(())
    }

    /// Splits every flagged cell into four children, returning the number of
    /// cells refined. Flags are processed in level-major order, so execution
    /// is deterministic for any flagging order.
    pub fn execute_refinement(&mut self) -> Result<usize, MgTransferError> {
        let flags = std::mem::take(&mut self.refine_flags);
        let mut refined = 0;
        for cell in flags {
            if self.cell(cell)?.children.is_some() {
                continue;
            }
            self.refine_cell(cell)?;
            refined += 1;
        }
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
        Ok(refined)
    }

    /// Flags every active cell and executes, adding one level of refinement
    /// everywhere.
    pub fn refine_global(&mut self) -> Result<usize, MgTransferError> {
        let active: Vec<CellId> = self.active_cells().collect();
        for cell in active {
            self.flag_for_refinement(cell)?;
        }
        self.execute_refinement()
    }

    /// Checks the arena invariants: children are one level finer and point
    /// back to their parent, every non-root cell has a consistent parent
    /// link, and every referenced vertex exists.
    pub fn validate_invariants(&self) -> Result<(), MgTransferError> {
        for (level, cells) in self.levels.iter().enumerate() {
            for (index, cell) in cells.iter().enumerate() {
                let id = CellId::new(level as u8, index as u32);
                for vertex in cell.vertices {
                    if (vertex.get() as usize) >= self.vertices.len() {
                        return Err(MgTransferError::InvalidHierarchy(format!(
                            "cell {id} references unknown vertex {vertex}"
                        )));
                    }
                }
                if let Some(children) = cell.children {
                    for child in children {
                        if child.level() != level + 1 {
                            return Err(MgTransferError::InvalidHierarchy(format!(
                                "child {child} of {id} is not one level finer"
                            )));
                        }
                        if self.cell(child)?.parent != Some(id) {
                            return Err(MgTransferError::InvalidHierarchy(format!(
                                "child {child} does not point back to parent {id}"
                            )));
                        }
                    }
                }
                match cell.parent {
                    Some(parent) => {
                        let back = self.cell(parent)?.children.map_or(false, |children| {
                            children.contains(&id)
                        });
                        if !back {
                            return Err(MgTransferError::InvalidHierarchy(format!(
                                "parent {parent} does not list {id} as a child"
                            )));
                        }
                    }
                    None if level > 0 => {
                        return Err(MgTransferError::InvalidHierarchy(format!(
                            "cell {id} above level 0 has no parent"
                        )));
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    fn cell(&self, id: CellId) -> Result<&Cell, MgTransferError> {
        self.levels
            .get(id.level())
            .and_then(|cells| cells.get(id.index()))
            .ok_or(MgTransferError::CellNotFound(id))
    }

    fn intern_vertex(&mut self, position: [f64; 2]) -> VertexId {
        let key = [position[0].to_bits(), position[1].to_bits()];
        if let Some(&vertex) = self.vertex_lookup.get(&key) {
            return vertex;
        }
        let vertex = VertexId::new(self.vertices.len() as u32);
        self.vertices.push(position);
        self.vertex_lookup.insert(key, vertex);
        vertex
    }

    fn refine_cell(&mut self, id: CellId) -> Result<(), MgTransferError> {
        let cell = self.cell(id)?;
        let [x0, y0] = self.vertices[cell.vertices[0].get() as usize];
        let [x1, y1] = self.vertices[cell.vertices[3].get() as usize];
        let xs = [x0, 0.5 * (x0 + x1), x1];
        let ys = [y0, 0.5 * (y0 + y1), y1];

        let mut grid = [[VertexId::new(0); 3]; 3];
        for (ix, &x) in xs.iter().enumerate() {
            for (iy, &y) in ys.iter().enumerate() {
                grid[ix][iy] = self.intern_vertex([x, y]);
            }
        }

        let child_level = id.level() + 1;
        if self.levels.len() == child_level {
            self.levels.push(Vec::new());
        }
        let mut children = [CellId::new(0, 0); CHILDREN_PER_CELL];
        for (k, child) in children.iter_mut().enumerate() {
            let (kx, ky) = (k & 1, k >> 1);
            let vertices = [
                grid[kx][ky],
                grid[kx + 1][ky],
                grid[kx][ky + 1],
                grid[kx + 1][ky + 1],
            ];
            *child = CellId::new(child_level as u8, self.levels[child_level].len() as u32);
            self.levels[child_level].push(Cell {
                vertices,
                parent: Some(id),
                children: None,
            });
        }
        self.levels[id.level()][id.index()].children = Some(children);
        Ok(())
    }

    #[cfg(any(debug_assertions, feature = "check-invariants"))]
    fn debug_assert_invariants(&self) {
        if let Err(err) = self.validate_invariants() {
            panic!("MeshHierarchy invalid: {err}");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyper_cube_has_one_cell_and_four_vertices() {
        let mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
        assert_eq!(mesh.n_levels(), 1);
        assert_eq!(mesh.n_cells_on_level(0), 1);
        assert_eq!(mesh.n_vertices(), 4);
        let cell = CellId::new(0, 0);
        assert!(mesh.is_active(cell).unwrap());
        assert_eq!(mesh.parent(cell).unwrap(), None);
    }

    #[test]
    fn global_refinement_shares_vertices() {
        let mut mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
        assert_eq!(mesh.refine_global().unwrap(), 1);
        assert_eq!(mesh.n_levels(), 2);
        assert_eq!(mesh.n_cells_on_level(1), 4);
        // 3x3 grid of distinct vertices after one refinement
        assert_eq!(mesh.n_vertices(), 9);

        assert_eq!(mesh.refine_global().unwrap(), 4);
        assert_eq!(mesh.n_cells_on_level(2), 16);
        assert_eq!(mesh.n_vertices(), 25);
        mesh.validate_invariants().unwrap();
    }

    #[test]
    fn refinement_links_parent_and_children() {
        let mut mesh = MeshHierarchy::hyper_cube(0.0, 1.0);
        mesh.refine_global().unwrap();
        let root = CellId::new(0, 0);
        assert!(!mesh.is_active(root).unwrap());
        let children = mesh.children(root).unwrap().unwrap();
        for child in children {
            assert_eq!(child.level(), 1);
            assert_eq!(mesh.parent(child).unwrap(), Some(root));
            assert!(mesh.is_active(child).unwrap());
        }
    }

    #[test]
    fn flagging_refined_cell_is_a_noop() {
        let mut mesh = MeshHierarchy::hyper_cube(0.0, 1.0);
        mesh.refine_global().unwrap();
        let root = CellId::new(0, 0);
        mesh.flag_for_refinement(root).unwrap();
        assert_eq!(mesh.execute_refinement().unwrap(), 0);
        assert_eq!(mesh.n_levels(), 2);
    }

    #[test]
    fn local_refinement_only_splits_flagged_cells() {
        let mut mesh = MeshHierarchy::hyper_cube(0.0, 1.0);
        mesh.refine_global().unwrap();
        mesh.flag_for_refinement(CellId::new(1, 0)).unwrap();
        assert_eq!(mesh.execute_refinement().unwrap(), 1);
        assert_eq!(mesh.n_levels(), 3);
        assert_eq!(mesh.n_cells_on_level(2), 4);
        let active: Vec<CellId> = mesh.active_cells().collect();
        // 3 remaining level-1 cells plus 4 children
        assert_eq!(active.len(), 7);
        mesh.validate_invariants().unwrap();
    }

    #[test]
    fn exterior_faces_carry_the_default_boundary_id() {
        let mut mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
        mesh.refine_global().unwrap();
        // level-1 cell 0 sits at the lower-left corner: its left and bottom
        // faces are exterior, right and top faces are interior.
        let cell = CellId::new(1, 0);
        assert_eq!(
            mesh.boundary_id_of_face(cell, 0).unwrap(),
            Some(DEFAULT_BOUNDARY_ID)
        );
        assert_eq!(
            mesh.boundary_id_of_face(cell, 2).unwrap(),
            Some(DEFAULT_BOUNDARY_ID)
        );
        assert_eq!(mesh.boundary_id_of_face(cell, 1).unwrap(), None);
        assert_eq!(mesh.boundary_id_of_face(cell, 3).unwrap(), None);
    }

    #[test]
    fn unknown_cell_is_reported() {
        let mesh = MeshHierarchy::hyper_cube(0.0, 1.0);
        let missing = CellId::new(3, 7);
        assert_eq!(
            mesh.is_active(missing).unwrap_err(),
            MgTransferError::CellNotFound(missing)
        );
    }

    #[test]
    fn cell_id_ordering_is_level_major() {
        let a = CellId::new(1, 9);
        let b = CellId::new(2, 0);
        assert!(a < b);
        assert_eq!(format!("{a}"), "1:9");
        assert_eq!(format!("{a:?}"), "CellId(1, 9)");
    }

    #[test]
    fn vertex_ids_serde_roundtrip() {
        let v = VertexId::new(17);
        let ser = serde_json::to_string(&v).expect("serialize");
        let de: VertexId = serde_json::from_str(&ser).expect("deserialize");
        assert_eq!(de, v);
    }
}
