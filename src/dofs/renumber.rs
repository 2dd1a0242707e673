//! Renumbering strategies for dof enumerations.
//!
//! A renumbering replaces an enumeration's bijection with another one over
//! the same range: cardinalities and geometric dof identity are untouched.
//! Component-wise ordering groups all indices of component 0 first, then
//! component 1, and so on, preserving the relative order within a component;
//! it can be applied to the active enumeration and to each per-level
//! enumeration independently.

use crate::dofs::handler::DofHandler;
use crate::mesh::VertexId;
use crate::mg_error::MgTransferError;
use serde::{Deserialize, Serialize};

/// Ordering options for dof renumbering.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RenumberOrdering {
    /// Construction (traversal) order; applying it changes nothing.
    Natural,
    /// All dofs of component 0 first, then component 1, etc.
    ComponentWise,
}

/// Applies `ordering` to the active enumeration and to every level.
pub fn apply_ordering(
    handler: &mut DofHandler,
    ordering: RenumberOrdering,
) -> Result<(), MgTransferError> {
    match ordering {
        RenumberOrdering::Natural => Ok(()),
        RenumberOrdering::ComponentWise => {
            component_wise(handler)?;
            for level in 0..handler.n_levels() {
                component_wise_on_level(handler, level)?;
            }
            Ok(())
        }
    }
}

/// Renumbers the active enumeration component-wise.
pub fn component_wise(handler: &mut DofHandler) -> Result<(), MgTransferError> {
    let permutation = component_permutation(
        handler.n_dofs(),
        handler.fe().n_components(),
        handler.active_dof_entries(),
    )?;
    handler.renumber_active(&permutation)
}

/// Renumbers the enumeration of one level component-wise, independently of
/// the active enumeration and of other levels.
pub fn component_wise_on_level(
    handler: &mut DofHandler,
    level: usize,
) -> Result<(), MgTransferError> {
    let permutation = component_permutation(
        handler.n_dofs_on_level(level)?,
        handler.fe().n_components(),
        handler.level_dof_entries(level)?,
    )?;
    handler.renumber_level(level, &permutation)
}

/// Builds the permutation that sorts indices by component, stably with
/// respect to the current index order.
fn component_permutation(
    n: usize,
    n_components: usize,
    entries: impl Iterator<Item = (VertexId, usize, usize)>,
) -> Result<Vec<usize>, MgTransferError> {
    let mut component_of = vec![usize::MAX; n];
    for (_, component, index) in entries {
        if index >= n {
            return Err(MgTransferError::InvalidEnumeration(format!(
                "enumeration assigns index {index} outside [0, {n})"
            )));
        }
        component_of[index] = component;
    }

    let mut counts = vec![0usize; n_components];
    for &component in &component_of {
        if component == usize::MAX {
            return Err(MgTransferError::InvalidEnumeration(
                "enumeration leaves indices unassigned".into(),
            ));
        }
        counts[component] += 1;
    }

    let mut cursor = vec![0usize; n_components];
    let mut offset = 0usize;
    for (component, count) in counts.iter().enumerate() {
        cursor[component] = offset;
        offset += count;
    }

    let mut permutation = vec![0usize; n];
    for (index, &component) in component_of.iter().enumerate() {
        permutation[index] = cursor[component];
        cursor[component] += 1;
    }
    Ok(permutation)
}
