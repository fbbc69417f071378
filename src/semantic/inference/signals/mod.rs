//! Signal sources for relationship inference.
//!
//! Each signal scores a candidate between 0.0 and 1.0 independently of the
//! others; [`fusion`](super::fusion) combines them.
//!
//! - [`semantic`] - embedding similarity of column and table names
//! - [`overlap`] - containment of sampled source values in the target
//! - [`inflection`] - singular/plural helpers used by name resolution

pub mod inflection;
pub mod overlap;
pub mod semantic;

// Re-export inflection utilities for convenience
pub use inflection::{pluralize, singularize};
