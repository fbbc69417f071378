//! Data overlap verification.
//!
//! Checks what fraction of sampled source values appear in the target
//! column's sampled value set. A real foreign key has containment near 1.0.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Column, SchemaSnapshot};
use crate::semantic::inference::sampling::SampleSet;
use crate::semantic::inference::RelationshipKey;

/// Default number of distinct source values checked per candidate.
pub const DEFAULT_SAMPLE_SIZE: usize = 50;
/// Default cap on distinct target values held in memory.
pub const DEFAULT_TARGET_CAP: usize = 10_000;

/// Outcome of an overlap check.
///
/// Containment is measured on samples, so the bias is one-sided: when the
/// target sample is only part of the target column, genuinely matching
/// values can be missed (false negatives) but a value found present is
/// present. Scores near the acceptance floor are the most sensitive to the
/// sample sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OverlapOutcome {
    /// Column types can't hold the same values. No sample is consumed.
    TypeMismatch { reason: String },
    /// No usable evidence either way.
    Indeterminate { reason: String },
    Measured {
        /// `matched / sampled`.
        containment: f64,
        /// Distinct non-null source values checked.
        sampled: usize,
        /// How many of those were present in the target sample.
        matched: usize,
    },
}

impl Default for OverlapOutcome {
    fn default() -> Self {
        Self::Indeterminate {
            reason: "not sampled".to_string(),
        }
    }
}

impl OverlapOutcome {
    /// Signal score: 0 for a type mismatch, none for indeterminate.
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::TypeMismatch { .. } => Some(0.0),
            Self::Indeterminate { .. } => None,
            Self::Measured { containment, .. } => Some(*containment),
        }
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }

    fn indeterminate(reason: impl Into<String>) -> Self {
        Self::Indeterminate {
            reason: reason.into(),
        }
    }
}

/// Canonical comparison form of a sampled value.
///
/// Nulls and blank strings are absent. Strings are trimmed, integral floats
/// render as integers (`3.0` == `3`), booleans as `true`/`false`. Arrays and
/// objects compare by their JSON text.
pub fn canonical_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    Some(format!("{}", f as i64))
                } else {
                    Some(f.to_string())
                }
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        other => Some(other.to_string()),
    }
}

/// Sampling-based containment check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapVerifier {
    /// K: distinct source values checked.
    pub sample_size: usize,
    /// Distinct target values retained.
    pub target_cap: usize,
}

impl Default for OverlapVerifier {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            target_cap: DEFAULT_TARGET_CAP,
        }
    }
}

impl OverlapVerifier {
    pub fn new(sample_size: usize, target_cap: usize) -> Self {
        Self {
            sample_size: sample_size.max(1),
            target_cap: target_cap.max(1),
        }
    }

    /// Type check only. `Some` when the pair can never overlap.
    pub fn type_check(&self, source: &Column, target: &Column) -> Option<OverlapOutcome> {
        (!source.category.is_compatible_with(target.category)).then(|| {
            OverlapOutcome::TypeMismatch {
                reason: format!(
                    "{} column '{}' can't reference {} column '{}'",
                    source.category, source.name, target.category, target.name
                ),
            }
        })
    }

    /// Measure containment of `source` values in `target` values.
    ///
    /// `None` for a side means it wasn't sampled.
    pub fn measure(
        &self,
        source_column: &Column,
        target_column: &Column,
        source: Option<&[Value]>,
        target: Option<&[Value]>,
    ) -> OverlapOutcome {
        if let Some(mismatch) = self.type_check(source_column, target_column) {
            return mismatch;
        }

        let Some(source) = source else {
            return OverlapOutcome::indeterminate("source column not sampled");
        };
        let Some(target) = target else {
            return OverlapOutcome::indeterminate("target column not sampled");
        };

        let mut targets: HashSet<String> = HashSet::new();
        for value in target.iter().filter_map(canonical_value) {
            if targets.len() >= self.target_cap {
                break;
            }
            targets.insert(value);
        }
        if targets.is_empty() {
            return OverlapOutcome::indeterminate("target sample is empty");
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut matched = 0;
        for value in source.iter().filter_map(canonical_value) {
            if seen.len() >= self.sample_size {
                break;
            }
            if seen.insert(value.clone()) && targets.contains(&value) {
                matched += 1;
            }
        }
        let sampled = seen.len();
        if sampled == 0 {
            return OverlapOutcome::indeterminate("no non-null source values sampled");
        }

        OverlapOutcome::Measured {
            containment: matched as f64 / sampled as f64,
            sampled,
            matched,
        }
    }

    /// Measure a candidate against a sample set.
    pub fn verify_candidate(
        &self,
        snapshot: &SchemaSnapshot,
        key: &RelationshipKey,
        samples: &SampleSet,
    ) -> OverlapOutcome {
        let (Some(source), Some(target)) = (
            snapshot.column(&key.from_table, &key.from_column),
            snapshot.column(&key.to_table, &key.to_column),
        ) else {
            return OverlapOutcome::indeterminate("column not in snapshot");
        };

        self.measure(
            source,
            target,
            samples.get(&key.from_table, &key.from_column),
            samples.get(&key.to_table, &key.to_column),
        )
    }
}
