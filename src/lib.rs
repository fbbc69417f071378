//! # relscout
//!
//! Infers undeclared foreign-key relationships between the tables of a
//! relational schema.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   SchemaSnapshot                         │
//! │   (tables, columns, types, declared keys, statistics)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!   [pattern rules]  [name similarity]  [value overlap]
//!          └───────────────┼────────────────┘
//!                          ▼ [fusion + cardinality]
//! ┌─────────────────────────────────────────────────────────┐
//! │            Ranked CandidateRelationships                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [optional external verifier]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  DetectionReport                         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The library never installs a `tracing` subscriber; binaries decide where
//! logs go.

pub mod config;
pub mod error;
pub mod model;
pub mod semantic;

pub use error::{DetectError, DetectResult};
pub use model::{Column, SchemaSnapshot, Table, TypeCategory};
pub use semantic::inference::{
    render_report, CandidateRelationship, Cardinality, DetectionConfig, DetectionReport,
    RelationshipDetector, SampleSet,
};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::model::{Column, ColumnRef, ColumnStats, SchemaSnapshot, Table, TypeCategory};
    pub use crate::semantic::inference::{
        render_report, CandidateRelationship, Cardinality, DeferVerifier, DetectionConfig,
        DetectionReport, Embedder, HashingEmbedder, ManyToManyRelationship, NoSampler,
        PatternRule, Provenance, RelationshipDetector, RelationshipKey, RuleBasedVerifier,
        SampleSet, Status, ValueSampler, Verifier,
    };
}
