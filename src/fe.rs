//! Finite-element descriptor for vector-valued bilinear elements.
//!
//! [`FeSystem`] describes `n_components` copies of a continuous Q1 element on
//! quadrilaterals: one dof per vertex per component, vertex-major local
//! layout. Besides the dof/component bookkeeping it provides the nested
//! embedding coefficients expressing a cell's basis in the combined basis of
//! its four children, which is the only geometric input the transfer-matrix
//! builder needs. The coefficients are reference-cell data and do not depend
//! on any dof numbering.

use crate::mesh::{CHILDREN_PER_CELL, VERTICES_PER_CELL};
use crate::mg_error::MgTransferError;

/// Vector-valued continuous Q1 element on quadrilaterals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeSystem {
    degree: usize,
    n_components: usize,
    component_map: Vec<usize>,
}

impl FeSystem {
    /// Creates a system of `n_components` Q1 elements of the given degree.
    ///
    /// # Errors
    /// `UnsupportedDegree` for any degree other than 1,
    /// `UnsupportedComponentCount` for zero components.
    pub fn new(degree: usize, n_components: usize) -> Result<Self, MgTransferError> {
        let component_map = (0..VERTICES_PER_CELL * n_components)
            .map(|local| local % n_components)
            .collect();
        Self::with_component_map(degree, n_components, component_map)
    }

    /// Creates a system with an explicit component map, validating it against
    /// the dof count. The map must assign a component to every local dof in
    /// the vertex-major layout (`local = vertex * n_components + component`).
    pub fn with_component_map(
        degree: usize,
        n_components: usize,
        component_map: Vec<usize>,
    ) -> Result<Self, MgTransferError> {
        if degree != 1 {
            return Err(MgTransferError::UnsupportedDegree(degree));
        }
        if n_components == 0 {
            return Err(MgTransferError::UnsupportedComponentCount(n_components));
        }
        let fe = FeSystem {
            degree,
            n_components,
            component_map,
        };
        fe.validate()?;
        Ok(fe)
    }

    /// Checks the component map against the dof count; a mismatch is a fatal
    /// configuration error.
    pub fn validate(&self) -> Result<(), MgTransferError> {
        if self.component_map.len() != self.dofs_per_cell() {
            return Err(MgTransferError::ComponentMapMismatch {
                dofs_per_cell: self.dofs_per_cell(),
                component_map_len: self.component_map.len(),
            });
        }
        for (local, &entry) in self.component_map.iter().enumerate() {
            if entry >= self.n_components {
                return Err(MgTransferError::ComponentOutOfRange {
                    local,
                    entry,
                    n_components: self.n_components,
                });
            }
        }
        Ok(())
    }

    /// Polynomial degree (always 1).
    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of solution components.
    #[inline]
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Number of local dofs per cell.
    #[inline]
    pub fn dofs_per_cell(&self) -> usize {
        VERTICES_PER_CELL * self.n_components
    }

    /// Component owning local dof `local`.
    #[inline]
    pub fn component_index(&self, local: usize) -> usize {
        self.component_map[local]
    }

    /// Vertex owning local dof `local` in the vertex-major layout.
    #[inline]
    pub fn local_vertex(&self, local: usize) -> usize {
        local / self.n_components
    }

    /// Embedding coefficients of this cell's basis in child `child`'s basis.
    ///
    /// Row `i` expresses child-local dof `i` as a combination of parent-local
    /// dofs; entry values are the parent bilinear shape functions evaluated at
    /// the child vertex positions, so they lie in `{0, 1/4, 1/2, 1}` and each
    /// row sums to one. Components do not couple.
    pub fn child_embedding(&self, child: usize) -> Vec<Vec<f64>> {
        debug_assert!(child < CHILDREN_PER_CELL);
        let n = self.dofs_per_cell();
        let (kx, ky) = ((child & 1) as f64, (child >> 1) as f64);
        let mut rows = vec![vec![0.0; n]; n];
        for cv in 0..VERTICES_PER_CELL {
            let x = 0.5 * (kx + (cv & 1) as f64);
            let y = 0.5 * (ky + (cv >> 1) as f64);
            for pv in 0..VERTICES_PER_CELL {
                let sx = if pv & 1 == 0 { 1.0 - x } else { x };
                let sy = if pv >> 1 == 0 { 1.0 - y } else { y };
                let weight = sx * sy;
                if weight == 0.0 {
                    continue;
                }
                for c in 0..self.n_components {
                    rows[cv * self.n_components + c][pv * self.n_components + c] = weight;
                }
            }
        }
        rows
    }
}
