//! Per-level tabular output for visualization sinks.
//!
//! One table per level: for every cell on the level, one row per vertex with
//! the vertex position followed by the nodal value of each component, cells
//! separated by a blank line (gnuplot block convention). The per-cell work is
//! a closure passed into a generic level traversal, so callers can plug in
//! their own sampling without subclassing anything.

use crate::dofs::DofHandler;
use crate::mesh::{CellId, MeshHierarchy};
use crate::mg_error::MgTransferError;
use crate::transfer::LevelFields;
use std::io::Write;

/// Calls `visit` for every cell on `level` with the cell's local dof values
/// fetched through the enumeration.
pub fn for_each_level_cell<F>(
    mesh: &MeshHierarchy,
    handler: &DofHandler,
    fields: &LevelFields,
    level: usize,
    mut visit: F,
) -> Result<(), MgTransferError>
where
    F: FnMut(CellId, &[f64]) -> Result<(), MgTransferError>,
{
    let values = fields.level(level)?;
    let mut local = vec![0.0; handler.fe().dofs_per_cell()];
    for cell in mesh.cells_on_level(level) {
        let indices = handler.cell_level_dof_indices(mesh, cell)?;
        for (slot, index) in local.iter_mut().zip(&indices) {
            *slot = values[*index];
        }
        visit(cell, &local)?;
    }
    Ok(())
}

/// Writes one table per level through `make_sink`, which yields the writer
/// for each level (one file per level, or in-memory buffers in tests).
pub fn write_level_tables<W, F>(
    mesh: &MeshHierarchy,
    handler: &DofHandler,
    fields: &LevelFields,
    mut make_sink: F,
) -> Result<(), MgTransferError>
where
    W: Write,
    F: FnMut(usize) -> std::io::Result<W>,
{
    let nc = handler.fe().n_components();
    for level in fields.min_level()..=fields.max_level() {
        let mut sink = make_sink(level)?;
        for_each_level_cell(mesh, handler, fields, level, |cell, local| {
            let vertices = mesh.cell_vertices(cell)?;
            for (v, vertex) in vertices.iter().enumerate() {
                let [x, y] = mesh
                    .vertex_position(*vertex)
                    .ok_or(MgTransferError::CellNotFound(cell))?;
                write!(sink, "{x} {y}")?;
                for component in 0..nc {
                    write!(sink, " {}", local[v * nc + component])?;
                }
                writeln!(sink)?;
            }
            writeln!(sink)?;
            Ok(())
        })?;
    }
    Ok(())
}
