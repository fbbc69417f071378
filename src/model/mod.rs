//! Schema snapshot model.
//!
//! The snapshot is the single shared input to all detection components:
//!
//! - [`SchemaSnapshot`] - validated, immutable map of tables
//! - [`Table`] / [`Column`] - structural metadata with optional statistics
//! - [`TypeCategory`] - normalized column type used for compatibility checks

mod error;
mod snapshot;
mod types;

pub use error::{SnapshotError, SnapshotResult};
pub use snapshot::{Column, ColumnRef, ColumnStats, SchemaSnapshot, Table};
pub use types::TypeCategory;
