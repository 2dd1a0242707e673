//! Consistency validation between independently renumbered hierarchies.
//!
//! Two enumerations over the same mesh must, after projection, agree on
//! every level *per cell* rather than per raw index: each enumeration's own
//! cell-to-index map is used to fetch local values and the differences must
//! vanish. Structural disagreements (level or cardinality mismatches) abort
//! the comparison; numerical residuals are collected and reported but never
//! abort it, so every level is always checked.

use crate::dofs::DofHandler;
use crate::mesh::MeshHierarchy;
use crate::mg_error::MgTransferError;
use crate::transfer::LevelFields;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// How much the reporter emits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Verbosity {
    /// Only findings.
    Quiet,
    /// Findings plus per-level summaries.
    Normal,
    /// Everything, including per-dof residual lines.
    Verbose,
}

/// Destination for validation output: an attachable sink, with the `log`
/// facade as fallback.
pub struct Reporter {
    verbosity: Verbosity,
    sink: Option<Box<dyn Write>>,
}

impl Reporter {
    /// A reporter emitting through the `log` facade.
    pub fn new(verbosity: Verbosity) -> Self {
        Reporter {
            verbosity,
            sink: None,
        }
    }

    /// A reporter writing lines into `sink` (a file, or an in-memory buffer
    /// in tests).
    pub fn with_sink(verbosity: Verbosity, sink: impl Write + 'static) -> Self {
        Reporter {
            verbosity,
            sink: Some(Box::new(sink)),
        }
    }

    /// Emits one line if `at` is within the configured verbosity.
    pub fn emit(&mut self, at: Verbosity, message: &str) -> Result<(), MgTransferError> {
        if at > self.verbosity {
            return Ok(());
        }
        match &mut self.sink {
            Some(sink) => writeln!(sink, "{message}")?,
            None if at == Verbosity::Verbose => log::debug!("{message}"),
            None => log::info!("{message}"),
        }
        Ok(())
    }
}

/// Per-level norms of the two fields and of their cell-matched difference.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelComparison {
    pub level: usize,
    pub left_norm: f64,
    pub right_norm: f64,
    pub difference_norm: f64,
}

/// One nonzero cell-matched difference, located in the first enumeration's
/// index space.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub level: usize,
    pub index: usize,
    pub difference: f64,
}

/// Outcome of a hierarchy comparison.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub levels: Vec<LevelComparison>,
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    /// Whether every cell-matched difference vanished.
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compares two projected hierarchies cell by cell.
///
/// # Errors
/// `LevelCountMismatch`/`StructuralMismatch`/`FiniteElementMismatch` when the
/// two enumerations cannot describe the same mesh; the comparison is
/// undefined then and aborts rather than matching unrelated cells.
pub fn compare_hierarchies(
    mesh: &MeshHierarchy,
    left_handler: &DofHandler,
    left_fields: &LevelFields,
    right_handler: &DofHandler,
    right_fields: &LevelFields,
    reporter: &mut Reporter,
) -> Result<ValidationReport, MgTransferError> {
    if left_handler.n_levels() != right_handler.n_levels()
        || left_handler.n_levels() != mesh.n_levels()
    {
        return Err(MgTransferError::LevelCountMismatch {
            expected: mesh.n_levels(),
            found: left_handler.n_levels().min(right_handler.n_levels()),
        });
    }
    if left_handler.fe().dofs_per_cell() != right_handler.fe().dofs_per_cell() {
        return Err(MgTransferError::FiniteElementMismatch {
            left: left_handler.fe().dofs_per_cell(),
            right: right_handler.fe().dofs_per_cell(),
        });
    }

    let mut report = ValidationReport::default();
    for level in 0..mesh.n_levels() {
        let n_left = left_handler.n_dofs_on_level(level)?;
        let n_right = right_handler.n_dofs_on_level(level)?;
        if n_left != n_right {
            return Err(MgTransferError::StructuralMismatch {
                level,
                left: n_left,
                right: n_right,
            });
        }

        let left_values = left_fields.level(level)?;
        let right_values = right_fields.level(level)?;
        let mut difference = vec![0.0; n_left];
        for cell in mesh.cells_on_level(level) {
            let left_indices = left_handler.cell_level_dof_indices(mesh, cell)?;
            let right_indices = right_handler.cell_level_dof_indices(mesh, cell)?;
            for (li, ri) in left_indices.iter().zip(&right_indices) {
                difference[*li] = left_values[*li] - right_values[*ri];
            }
        }

        let difference_norm = difference.iter().map(|d| d * d).sum::<f64>().sqrt();
        let summary = LevelComparison {
            level,
            left_norm: left_fields.l2_norm(level)?,
            right_norm: right_fields.l2_norm(level)?,
            difference_norm,
        };
        reporter.emit(
            Verbosity::Normal,
            &format!(
                "level {level}: |u| = {:.6} |v| = {:.6} |d| = {:.6}",
                summary.left_norm, summary.right_norm, summary.difference_norm
            ),
        )?;
        report.levels.push(summary);

        for (index, &value) in difference.iter().enumerate() {
            if value != 0.0 {
                reporter.emit(
                    Verbosity::Quiet,
                    &format!("level {level} dof {index}: difference {value}"),
                )?;
                report.mismatches.push(Mismatch {
                    level,
                    index,
                    difference: value,
                });
            }
        }
    }

    if !report.is_consistent() {
        let levels = report
            .mismatches
            .iter()
            .map(|m| m.level)
            .unique()
            .join(", ");
        log::warn!(
            "hierarchy comparison found {} mismatching dofs on levels {levels}",
            report.mismatches.len()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{BoundarySpec, extract_boundary_indices};
    use crate::dofs::{component_wise, component_wise_on_level};
    use crate::fe::FeSystem;
    use crate::transfer::{build_transfer_matrices, copy_to_hierarchy};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn project(
        mesh: &MeshHierarchy,
        fe: &FeSystem,
        handler: &DofHandler,
    ) -> LevelFields {
        let spec = BoundarySpec::homogeneous(0);
        let boundary = extract_boundary_indices(mesh, fe, handler, &spec).unwrap();
        let matrices = build_transfer_matrices(mesh, fe, handler, &boundary).unwrap();
        let mut active = vec![0.0; handler.n_dofs()];
        for cell in mesh.active_cells() {
            let indices = handler.cell_dof_indices(mesh, cell).unwrap();
            for (local, index) in indices.iter().enumerate() {
                active[*index] = fe.component_index(local) as f64 + 1.0;
            }
        }
        copy_to_hierarchy(&active, mesh, handler, &boundary, &matrices).unwrap()
    }

    #[test]
    fn renumbered_projection_matches_cell_by_cell() {
        let mut mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
        mesh.refine_global().unwrap();
        mesh.flag_for_refinement(crate::mesh::CellId::new(1, 0))
            .unwrap();
        mesh.execute_refinement().unwrap();
        let fe = FeSystem::new(1, 2).unwrap();

        let left = DofHandler::distribute(&mesh, &fe).unwrap();
        let mut right = DofHandler::distribute(&mesh, &fe).unwrap();
        component_wise(&mut right).unwrap();
        for level in 0..right.n_levels() {
            component_wise_on_level(&mut right, level).unwrap();
        }

        let left_fields = project(&mesh, &fe, &left);
        let right_fields = project(&mesh, &fe, &right);

        let buffer = SharedBuffer::default();
        let mut reporter = Reporter::with_sink(Verbosity::Normal, buffer.clone());
        let report = compare_hierarchies(
            &mesh,
            &left,
            &left_fields,
            &right,
            &right_fields,
            &mut reporter,
        )
        .unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.levels.len(), 3);
        for summary in &report.levels {
            assert_eq!(summary.difference_norm, 0.0);
            assert_eq!(summary.left_norm, summary.right_norm);
        }
        let output = String::from_utf8(buffer.0.borrow().clone()).unwrap();
        assert_eq!(output.lines().count(), 3);
        assert!(output.starts_with("level 0:"));
    }

    #[test]
    fn corrupted_field_is_reported_but_not_fatal() {
        let mut mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
        mesh.refine_global().unwrap();
        let fe = FeSystem::new(1, 1).unwrap();
        let left = DofHandler::distribute(&mesh, &fe).unwrap();
        let right = DofHandler::distribute(&mesh, &fe).unwrap();
        let left_fields = project(&mesh, &fe, &left);
        let mut right_fields = project(&mesh, &fe, &right);
        right_fields.level_mut(1).unwrap()[4] += 0.5;

        let mut reporter = Reporter::new(Verbosity::Quiet);
        let report = compare_hierarchies(
            &mesh,
            &left,
            &left_fields,
            &right,
            &right_fields,
            &mut reporter,
        )
        .unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].level, 1);
        assert_eq!(report.mismatches[0].difference, -0.5);
        // both levels were still compared
        assert_eq!(report.levels.len(), 2);
    }

    #[test]
    fn structural_mismatch_aborts() {
        let mut coarse_mesh = MeshHierarchy::hyper_cube(-1.0, 1.0);
        coarse_mesh.refine_global().unwrap();
        let mut fine_mesh = coarse_mesh.clone();
        fine_mesh.refine_global().unwrap();
        let fe = FeSystem::new(1, 1).unwrap();
        let left = DofHandler::distribute(&coarse_mesh, &fe).unwrap();
        let right = DofHandler::distribute(&fine_mesh, &fe).unwrap();
        let left_fields = LevelFields::reinit(&left);
        let right_fields = LevelFields::reinit(&right);
        let mut reporter = Reporter::new(Verbosity::Quiet);
        assert!(matches!(
            compare_hierarchies(
                &coarse_mesh,
                &left,
                &left_fields,
                &right,
                &right_fields,
                &mut reporter,
            )
            .unwrap_err(),
            MgTransferError::LevelCountMismatch { .. }
        ));
    }
}
