//! Dof enumeration and renumbering.

pub mod handler;
pub mod renumber;

pub use handler::DofHandler;
pub use renumber::{RenumberOrdering, apply_ordering, component_wise, component_wise_on_level};
