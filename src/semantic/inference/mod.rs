//! Relationship inference engine for undeclared foreign-key discovery.
//!
//! This module combines several independent signals into a ranked list of
//! candidate relationships between the tables of a [`SchemaSnapshot`].
//!
//! # Architecture
//!
//! 1. **Candidate generation** - naming-convention rules ([`rules`]) and
//!    semantic similarity of names ([`signals::semantic`])
//! 2. **Verification** - containment of sampled values ([`signals::overlap`])
//! 3. **Fusion** - weighted combination into a single confidence ([`fusion`])
//! 4. **Cardinality** - 1:1 / N:1 and junction tables ([`cardinality`])
//! 5. **Ranking** - per-column dedup, banding and ordering ([`ranking`])
//! 6. **External verification** - optional, budgeted ([`verify`])
//!
//! # Example
//!
//! ```ignore
//! use relscout::semantic::inference::{DetectionConfig, RelationshipDetector, SampleSet};
//!
//! let detector = RelationshipDetector::new(DetectionConfig::default());
//! let report = detector.detect(&snapshot, &SampleSet::new());
//! for rel in report.direct_relationships() {
//!     println!("{rel}");
//! }
//! ```
//!
//! [`SchemaSnapshot`]: crate::model::SchemaSnapshot

pub mod cardinality;
mod engine;
pub mod fusion;
pub mod ranking;
mod report;
pub mod rules;
pub mod sampling;
pub mod signals;
pub mod verify;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use engine::{DetectionConfig, RelationshipDetector, DEFAULT_SEMANTIC_FLOOR};
pub use fusion::{FusedScore, FusionWeights, ScoreBreakdown};
pub use ranking::RankingConfig;
pub use report::{render_report, DetectionReport};
pub use rules::{default_rules, PatternKind, PatternMatch, PatternMatcher, PatternRule, Resolution};
pub use sampling::{NoSampler, SampleError, SampleRequest, SampleSet, ValueSampler};
pub use signals::overlap::{OverlapOutcome, OverlapVerifier};
pub use signals::semantic::{EmbedError, Embedder, HashingEmbedder, SemanticScorer};
pub use verify::{
    DeferVerifier, RuleBasedVerifier, VerificationPolicy, VerificationRequest,
    VerificationVerdict, Verifier, VerifyError,
};

/// Centralized confidence thresholds.
pub mod thresholds {
    /// Confidence levels.
    pub mod confidence {
        /// Confidence of a declared foreign key.
        pub const DECLARED: f64 = 1.0;
        /// Fused confidence at or above which a candidate is accepted.
        pub const ACCEPT: f64 = 0.80;
        /// Fused confidence below which a candidate is rejected outright.
        pub const FLOOR: f64 = 0.50;
        /// Candidates of one source column within this distance of the best
        /// are kept and flagged ambiguous.
        pub const AMBIGUITY_TOLERANCE: f64 = 0.05;
    }

    /// Report grouping.
    pub mod report {
        pub const HIGH: f64 = 0.80;
        pub const MEDIUM: f64 = 0.60;
    }

    /// Pattern scoring.
    pub mod pattern {
        /// Score factor for a table resolved from the literal or singular
        /// remainder instead of its plural.
        pub const LITERAL_FORM_FACTOR: f64 = 0.95;
    }
}

/// Cardinality of a relationship, read source → target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    #[default]
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Reverse the cardinality (swap left/right sides).
    pub fn reverse(self) -> Self {
        match self {
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// Short notation: `1:1`, `1:N`, `N:1`, `N:M`.
    pub fn notation(self) -> &'static str {
        match self {
            Cardinality::OneToOne => "1:1",
            Cardinality::OneToMany => "1:N",
            Cardinality::ManyToOne => "N:1",
            Cardinality::ManyToMany => "N:M",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notation())
    }
}

impl FromStr for Cardinality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "1:1" | "one-to-one" => Ok(Cardinality::OneToOne),
            "1:n" | "one-to-many" => Ok(Cardinality::OneToMany),
            "n:1" | "many-to-one" => Ok(Cardinality::ManyToOne),
            "n:m" | "n:n" | "m:n" | "many-to-many" => Ok(Cardinality::ManyToMany),
            _ => Err(format!("unknown cardinality '{s}'")),
        }
    }
}

/// Where a relationship came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Declared foreign-key constraint.
    Declared,
    /// Found by the detector.
    #[default]
    Detected,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared => write!(f, "declared"),
            Self::Detected => write!(f, "detected"),
        }
    }
}

/// Final classification of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Accepted,
    #[default]
    Uncertain,
    Rejected,
    /// Needed verification the verifier couldn't provide.
    Unverified,
}

/// A unique key identifying a relationship by its endpoints.
///
/// Used for deduplication and lookup of relationships. All table/column
/// names are stored in lowercase for case-insensitive comparison. Keys order
/// lexically by (source table, source column, target table, target column).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RelationshipKey {
    /// Source table name (lowercase)
    pub from_table: String,
    /// Source column name (lowercase)
    pub from_column: String,
    /// Target table name (lowercase)
    pub to_table: String,
    /// Target column name (lowercase)
    pub to_column: String,
}

impl RelationshipKey {
    /// Create a new relationship key with normalized (lowercase) names.
    #[must_use]
    pub fn new(from_table: &str, from_column: &str, to_table: &str, to_column: &str) -> Self {
        Self {
            from_table: from_table.to_lowercase(),
            from_column: from_column.to_lowercase(),
            to_table: to_table.to_lowercase(),
            to_column: to_column.to_lowercase(),
        }
    }

    /// Create a key from a candidate.
    #[must_use]
    pub fn from_candidate(rel: &CandidateRelationship) -> Self {
        Self::new(
            &rel.source_table,
            &rel.source_column,
            &rel.target_table,
            &rel.target_column,
        )
    }

    /// Get the reversed key (swapping from/to).
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            from_table: self.to_table.clone(),
            from_column: self.to_column.clone(),
            to_table: self.from_table.clone(),
            to_column: self.from_column.clone(),
        }
    }

    /// Direction-independent identity: `a → b` and `b → a` share it.
    #[must_use]
    pub fn pair_key(&self) -> (String, String) {
        let a = format!("{}.{}", self.from_table, self.from_column);
        let b = format!("{}.{}", self.to_table, self.to_column);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Source side as `(table, column)`.
    pub fn source(&self) -> (&str, &str) {
        (&self.from_table, &self.from_column)
    }
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} → {}.{}",
            self.from_table, self.from_column, self.to_table, self.to_column
        )
    }
}

/// Raw per-signal scores of a candidate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalScores {
    /// Naming-convention score, if a rule matched.
    pub pattern: Option<f64>,
    /// Name similarity, if the embedder produced one.
    pub semantic: Option<f64>,
    /// Sampled-value containment.
    pub overlap: OverlapOutcome,
}

/// A scored relationship candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRelationship {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub signals: SignalScores,
    /// Fused confidence (0.0 to 1.0).
    pub confidence: f64,
    pub cardinality: Cardinality,
    pub provenance: Provenance,
    /// Pattern rule that proposed it, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Human-readable reasons behind the score.
    pub evidence: Vec<String>,
    /// Another candidate for the same source column scored within tolerance.
    pub ambiguous: bool,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<VerificationVerdict>,
    /// Junction table this candidate bridges through, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junction: Option<String>,
}

impl CandidateRelationship {
    /// Key of this candidate.
    pub fn key(&self) -> RelationshipKey {
        RelationshipKey::from_candidate(self)
    }

    /// Whether this restates a declared foreign key.
    pub fn is_declared(&self) -> bool {
        self.provenance == Provenance::Declared
    }
}

impl fmt::Display for CandidateRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} → {}.{}",
            self.source_table, self.source_column, self.target_table, self.target_column
        )
    }
}

/// Two tables linked through a junction table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManyToManyRelationship {
    pub left_table: String,
    pub right_table: String,
    pub junction_table: String,
    /// The two junction → endpoint candidates.
    pub members: [RelationshipKey; 2],
    /// Minimum confidence of the two members.
    pub confidence: f64,
}

impl fmt::Display for ManyToManyRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ⟷ {} (via {})",
            self.left_table, self.right_table, self.junction_table
        )
    }
}
