//! Sparse level-transfer matrix in CSR form.
//!
//! Assembly goes through triplets keyed by (row, column): duplicate scatter
//! targets are legal because embedding coefficients are geometric and any two
//! contributions to the same entry agree. The triplet map is ordered, so
//! building twice from the same enumeration yields bit-identical matrices.

use crate::mg_error::MgTransferError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparse linear map from a coarse-level dof vector to the next finer
/// level's dof vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferMatrix {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl TransferMatrix {
    /// Builds a matrix from (row, column, value) triplets.
    ///
    /// Later duplicates overwrite earlier ones; conflicting duplicate values
    /// indicate a broken scatter and are caught in debug builds.
    ///
    /// # Errors
    /// `EntryOutOfBounds` when a triplet lies outside the matrix dimensions.
    pub fn from_triplets(
        n_rows: usize,
        n_cols: usize,
        triplets: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Result<Self, MgTransferError> {
        let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (row, col, value) in triplets {
            if row >= n_rows || col >= n_cols {
                return Err(MgTransferError::EntryOutOfBounds {
                    row,
                    col,
                    n_rows,
                    n_cols,
                });
            }
            if let Some(previous) = entries.insert((row, col), value) {
                debug_assert_eq!(
                    previous.to_bits(),
                    value.to_bits(),
                    "conflicting duplicate entry at ({row}, {col})"
                );
            }
        }

        let mut row_ptr = vec![0usize; n_rows + 1];
        for &(row, _) in entries.keys() {
            row_ptr[row + 1] += 1;
        }
        for row in 0..n_rows {
            row_ptr[row + 1] += row_ptr[row];
        }
        let mut col_idx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for ((_, col), value) in entries {
            col_idx.push(col);
            values.push(value);
        }
        Ok(TransferMatrix {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Number of rows (fine-level dofs).
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns (coarse-level dofs).
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterates the (column, value) entries of one row in column order.
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        self.col_idx[range.clone()]
            .iter()
            .zip(&self.values[range])
            .map(|(&col, &value)| (col, value))
    }

    /// Computes `y = A x`.
    ///
    /// # Errors
    /// `FieldSizeMismatch` when `x` is not sized to the column space.
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>, MgTransferError> {
        if x.len() != self.n_cols {
            return Err(MgTransferError::FieldSizeMismatch {
                expected: self.n_cols,
                found: x.len(),
            });
        }
        let mut y = vec![0.0; self.n_rows];
        for (row, out) in y.iter_mut().enumerate() {
            let mut sum = 0.0;
            for k in self.row_ptr[row]..self.row_ptr[row + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            *out = sum;
        }
        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplets_are_deduplicated_and_sorted() {
        let m = TransferMatrix::from_triplets(
            3,
            2,
            vec![(2, 1, 0.5), (0, 0, 1.0), (2, 0, 0.25), (2, 1, 0.5)],
        )
        .unwrap();
        assert_eq!(m.nnz(), 3);
        assert_eq!(
            m.row_entries(2).collect::<Vec<_>>(),
            vec![(0, 0.25), (1, 0.5)]
        );
        assert!(m.row_entries(1).next().is_none());
    }

    #[test]
    fn apply_multiplies() {
        let m = TransferMatrix::from_triplets(2, 3, vec![(0, 0, 1.0), (0, 2, 2.0), (1, 1, 0.5)])
            .unwrap();
        let y = m.apply(&[1.0, 4.0, 0.25]).unwrap();
        assert_eq!(y, vec![1.5, 2.0]);
    }

    #[test]
    fn size_mismatch_is_reported() {
        let m = TransferMatrix::from_triplets(2, 3, vec![]).unwrap();
        assert_eq!(
            m.apply(&[1.0]).unwrap_err(),
            MgTransferError::FieldSizeMismatch {
                expected: 3,
                found: 1,
            }
        );
    }

    #[test]
    fn out_of_bounds_entry_is_rejected() {
        assert_eq!(
            TransferMatrix::from_triplets(2, 2, vec![(2, 0, 1.0)]).unwrap_err(),
            MgTransferError::EntryOutOfBounds {
                row: 2,
                col: 0,
                n_rows: 2,
                n_cols: 2,
            }
        );
    }

    #[test]
    fn serde_roundtrip() {
        let m = TransferMatrix::from_triplets(2, 2, vec![(0, 1, 0.5), (1, 0, 0.25)]).unwrap();
        let ser = serde_json::to_string(&m).expect("serialize");
        let de: TransferMatrix = serde_json::from_str(&ser).expect("deserialize");
        assert_eq!(de, m);
    }
}
