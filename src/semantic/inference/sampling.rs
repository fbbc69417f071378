//! Column value sampling.
//!
//! The overlap verifier works from a [`SampleSet`]. Samples come either from
//! a JSON document or from a [`ValueSampler`] implementation that talks to a
//! live source; the detector itself never opens a database connection.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Result type for sampling operations.
pub type SampleResult<T> = Result<T, SampleError>;

/// Errors from a value sampler.
#[derive(Error, Debug)]
pub enum SampleError {
    /// The sample document is malformed.
    #[error("invalid sample document: {0}")]
    InvalidDocument(String),

    /// Failed to parse the sample document.
    #[error("failed to parse sample document: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend failure (connection, query, permission).
    #[error("sampling failed: {0}")]
    Backend(String),
}

/// Source of sampled column values.
///
/// # Example
///
/// ```ignore
/// use relscout::semantic::inference::{SampleRequest, SampleSet, ValueSampler};
///
/// async fn example(sampler: &impl ValueSampler) {
///     let requests = vec![SampleRequest::new("orders", "customer_id", 50)];
///     let samples = SampleSet::collect(sampler, &requests).await;
/// }
/// ```
#[async_trait]
pub trait ValueSampler: Send + Sync {
    /// Fetch up to `limit` values of a column.
    async fn sample(&self, table: &str, column: &str, limit: usize) -> SampleResult<Vec<Value>>;
}

/// Sampler that never has data; every overlap check is indeterminate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSampler;

#[async_trait]
impl ValueSampler for NoSampler {
    async fn sample(&self, _table: &str, _column: &str, _limit: usize) -> SampleResult<Vec<Value>> {
        Ok(Vec::new())
    }
}

/// One column to sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleRequest {
    pub table: String,
    pub column: String,
    pub limit: usize,
}

impl SampleRequest {
    pub fn new(table: impl Into<String>, column: impl Into<String>, limit: usize) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            limit,
        }
    }
}

/// Sampled values keyed by lowercase `(table, column)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    columns: HashMap<(String, String), Vec<Value>>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a column's values.
    pub fn insert(&mut self, table: &str, column: &str, values: Vec<Value>) {
        self.columns
            .insert((table.to_lowercase(), column.to_lowercase()), values);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, table: &str, column: &str, values: Vec<Value>) -> Self {
        self.insert(table, column, values);
        self
    }

    /// Values of a column, if it was sampled.
    pub fn get(&self, table: &str, column: &str) -> Option<&[Value]> {
        self.columns
            .get(&(table.to_lowercase(), column.to_lowercase()))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Parse a `{ "table.column": [values...] }` document.
    pub fn from_json(json: &str) -> SampleResult<Self> {
        let doc: HashMap<String, Vec<Value>> = serde_json::from_str(json)?;
        let mut set = Self::new();
        for (key, values) in doc {
            let (table, column) = key.split_once('.').ok_or_else(|| {
                SampleError::InvalidDocument(format!("key '{key}' is not 'table.column'"))
            })?;
            if table.is_empty() || column.is_empty() {
                return Err(SampleError::InvalidDocument(format!(
                    "key '{key}' is not 'table.column'"
                )));
            }
            set.insert(table, column, values);
        }
        Ok(set)
    }

    /// Fetch every request concurrently.
    ///
    /// A failed request is logged and leaves that column unsampled; it never
    /// fails the whole collection. Empty results are also left out.
    pub async fn collect(sampler: &dyn ValueSampler, requests: &[SampleRequest]) -> Self {
        let futures = requests
            .iter()
            .map(|r| async move { (r, sampler.sample(&r.table, &r.column, r.limit).await) });
        let results = futures::future::join_all(futures).await;

        let mut set = Self::new();
        for (request, result) in results {
            match result {
                Ok(values) if !values.is_empty() => {
                    set.insert(&request.table, &request.column, values)
                }
                Ok(_) => {}
                Err(err) => warn!(
                    table = %request.table,
                    column = %request.column,
                    error = %err,
                    "sampling failed; overlap will be indeterminate"
                ),
            }
        }
        debug!(requested = requests.len(), sampled = set.len(), "collected samples");
        set
    }
}

/// A column missing from the set samples as empty, not as an error.
#[async_trait]
impl ValueSampler for SampleSet {
    async fn sample(&self, table: &str, column: &str, limit: usize) -> SampleResult<Vec<Value>> {
        Ok(self
            .get(table, column)
            .map(|values| values.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
