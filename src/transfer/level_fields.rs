//! Per-level field container.
//!
//! One numeric vector per refinement level over the contiguous range
//! `[min_level, max_level]`, each owning its size. Containers are created via
//! [`LevelFields::reinit`] from the current enumeration rather than resized
//! in place from unrelated code paths.

use crate::dofs::DofHandler;
use crate::mg_error::MgTransferError;
use serde::{Deserialize, Serialize};

/// A field value vector for every level of a hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelFields {
    min_level: usize,
    fields: Vec<Vec<f64>>,
}

impl LevelFields {
    /// Allocates one zeroed vector per level, sized to the enumeration's
    /// per-level dof counts.
    pub fn reinit(handler: &DofHandler) -> Self {
        LevelFields {
            min_level: 0,
            fields: handler
                .level_dof_counts()
                .iter()
                .map(|&n| vec![0.0; n])
                .collect(),
        }
    }

    /// Coarsest level held.
    #[inline]
    pub fn min_level(&self) -> usize {
        self.min_level
    }

    /// Finest level held.
    #[inline]
    pub fn max_level(&self) -> usize {
        self.min_level + self.fields.len().saturating_sub(1)
    }

    /// The values on `level`.
    pub fn level(&self, level: usize) -> Result<&[f64], MgTransferError> {
        let slot = self.slot(level)?;
        Ok(&self.fields[slot])
    }

    /// Mutable values on `level`.
    pub fn level_mut(&mut self, level: usize) -> Result<&mut [f64], MgTransferError> {
        let slot = self.slot(level)?;
        Ok(&mut self.fields[slot])
    }

    /// Replaces the values on `level`, keeping the level's size.
    pub fn set_level(&mut self, level: usize, values: Vec<f64>) -> Result<(), MgTransferError> {
        let slot = self.slot(level)?;
        if values.len() != self.fields[slot].len() {
            return Err(MgTransferError::FieldSizeMismatch {
                expected: self.fields[slot].len(),
                found: values.len(),
            });
        }
        self.fields[slot] = values;
        Ok(())
    }

    /// Euclidean norm of the values on `level`.
    pub fn l2_norm(&self, level: usize) -> Result<f64, MgTransferError> {
        let values = self.level(level)?;
        Ok(values.iter().map(|v| v * v).sum::<f64>().sqrt())
    }

    fn slot(&self, level: usize) -> Result<usize, MgTransferError> {
        if level < self.min_level || level > self.max_level() || self.fields.is_empty() {
            return Err(MgTransferError::LevelOutOfRange {
                level,
                min: self.min_level,
                max: self.max_level(),
            });
        }
        Ok(level - self.min_level)
    }
}
