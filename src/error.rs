//! Top-level error type for whole detection runs.

use thiserror::Error;

use crate::config::SettingsError;
use crate::model::SnapshotError;
use crate::semantic::inference::SampleError;

/// Result type for detection runs.
pub type DetectResult<T> = Result<T, DetectError>;

/// Errors that abort a detection run.
///
/// Only malformed input gets here. Missing evidence, failed sampling and
/// unreachable verifiers degrade the report instead.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("invalid schema snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("failed to parse schema snapshot: {0}")]
    SnapshotParse(#[source] serde_json::Error),

    #[error("invalid sample document: {0}")]
    Samples(#[from] SampleError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to serialize report: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
