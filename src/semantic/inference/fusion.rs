//! Confidence fusion.
//!
//! Combines the per-signal scores of a candidate into one confidence with a
//! weighted average over the signals that are available:
//!
//! ```text
//! fused = Σ wᵢ·sᵢ / Σ wᵢ
//! ```
//!
//! Pattern and semantic always take part (a missing score counts as 0.0).
//! Overlap takes part unless it is indeterminate: no sample is no evidence,
//! and it must not drag a well-named candidate down. A declared foreign key
//! always fuses to 1.0.

use serde::Serialize;

use super::{thresholds, SignalScores};

/// Default weight of the pattern signal.
pub const DEFAULT_PATTERN_WEIGHT: f64 = 0.45;
/// Default weight of the semantic signal.
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.25;
/// Default weight of the overlap signal.
pub const DEFAULT_OVERLAP_WEIGHT: f64 = 0.30;

/// Per-signal weights, normalized to sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionWeights {
    pattern: f64,
    semantic: f64,
    overlap: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN_WEIGHT,
            semantic: DEFAULT_SEMANTIC_WEIGHT,
            overlap: DEFAULT_OVERLAP_WEIGHT,
        }
    }
}

impl FusionWeights {
    /// Build normalized weights.
    ///
    /// Returns `None` when a weight is negative or not finite, or all are 0.
    pub fn normalized(pattern: f64, semantic: f64, overlap: f64) -> Option<Self> {
        let weights = [pattern, semantic, overlap];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return None;
        }
        Some(Self {
            pattern: pattern / sum,
            semantic: semantic / sum,
            overlap: overlap / sum,
        })
    }

    pub fn pattern(&self) -> f64 {
        self.pattern
    }

    pub fn semantic(&self) -> f64 {
        self.semantic
    }

    pub fn overlap(&self) -> f64 {
        self.overlap
    }

    /// Fuse a candidate's signals.
    pub fn fuse(&self, signals: &SignalScores, declared: bool) -> FusedScore {
        let mut breakdown = vec![
            ScoreBreakdown::new("pattern", signals.pattern, self.pattern),
            ScoreBreakdown::new("semantic", signals.semantic, self.semantic),
        ];
        if let Some(overlap) = signals.overlap.score() {
            breakdown.push(ScoreBreakdown::new("overlap", Some(overlap), self.overlap));
        }

        if declared {
            return FusedScore {
                confidence: thresholds::confidence::DECLARED,
                breakdown,
            };
        }

        let total_weight: f64 = breakdown.iter().map(|b| b.weight).sum();
        let weighted: f64 = breakdown.iter().map(|b| b.contribution).sum();
        let confidence = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        FusedScore {
            confidence,
            breakdown,
        }
    }
}

/// Contribution of one signal to a fused score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Signal name.
    pub source: String,
    /// Raw score (0.0 when the signal produced nothing).
    pub raw_score: f64,
    /// Normalized weight.
    pub weight: f64,
    /// `raw_score * weight`.
    pub contribution: f64,
}

impl ScoreBreakdown {
    fn new(source: &str, raw: Option<f64>, weight: f64) -> Self {
        let raw_score = raw.unwrap_or(0.0).clamp(0.0, 1.0);
        Self {
            source: source.to_string(),
            raw_score,
            weight,
            contribution: raw_score * weight,
        }
    }
}

/// Result of fusion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedScore {
    pub confidence: f64,
    pub breakdown: Vec<ScoreBreakdown>,
}
