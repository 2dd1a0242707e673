//! Level-transfer operators: sparse matrices, per-level fields, and the
//! hierarchy projection driver.

pub mod level_fields;
pub mod matrix;
pub mod prebuilt;

pub use level_fields::LevelFields;
pub use matrix::TransferMatrix;
pub use prebuilt::{build_transfer_matrices, copy_to_hierarchy};
