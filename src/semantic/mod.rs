//! Semantic analysis of schema snapshots.
//!
//! Currently a single layer: [`inference`], which discovers relationships
//! the schema doesn't declare.

pub mod inference;
