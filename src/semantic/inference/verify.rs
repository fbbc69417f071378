//! External verification of uncertain candidates.
//!
//! Candidates in the uncertain band can be offered to an external verifier
//! (typically a language model behind an API). The verifier is the only
//! blocking collaborator of a detection run, so every call is bounded by a
//! timeout and the whole run by a budget. When a verifier is slow, broken
//! or silent, candidates end up `Unverified` and the run carries on.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::sampling::SampleSet;
use super::signals::overlap::canonical_value;
use super::{CandidateRelationship, Cardinality, RelationshipKey, Status};

/// Default number of candidates sent per run.
pub const DEFAULT_BUDGET: usize = 10;
/// Default number of candidates per verifier call.
pub const DEFAULT_BATCH_SIZE: usize = 5;
/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Confidence above which [`RuleBasedVerifier`] accepts.
pub const RULE_BASED_MIN_CONFIDENCE: f64 = 0.7;

/// Source values included in each request.
const SAMPLE_PAIRS: usize = 5;

/// Result type for verifier operations.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Errors from a verifier.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// A call didn't finish in time.
    #[error("verifier timed out after {0:?}")]
    Timeout(Duration),

    /// The verifier can't be reached or refused the request.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),

    /// The verifier answered with something that isn't a verdict.
    #[error("malformed verdict: {0}")]
    MalformedVerdict(String),

    /// Failed to parse a JSON verdict.
    #[error("failed to parse verdict: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A sampled source value and whether the target sample contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamplePair {
    pub source_value: String,
    pub found_in_target: bool,
}

/// What the verifier is asked about one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRequest {
    pub key: RelationshipKey,
    /// Fused confidence.
    pub confidence: f64,
    /// Cardinality inferred so far.
    pub cardinality: Cardinality,
    pub evidence: Vec<String>,
    pub sample_pairs: Vec<SamplePair>,
}

impl VerificationRequest {
    /// Build a request, pairing the first few distinct source values with
    /// their presence in the target sample.
    pub fn from_candidate(candidate: &CandidateRelationship, samples: &SampleSet) -> Self {
        let key = candidate.key();

        let targets: HashSet<String> = samples
            .get(&key.to_table, &key.to_column)
            .unwrap_or_default()
            .iter()
            .filter_map(canonical_value)
            .collect();

        let mut seen = HashSet::new();
        let sample_pairs = samples
            .get(&key.from_table, &key.from_column)
            .unwrap_or_default()
            .iter()
            .filter_map(canonical_value)
            .filter(|v| seen.insert(v.clone()))
            .take(SAMPLE_PAIRS)
            .map(|v| SamplePair {
                found_in_target: targets.contains(&v),
                source_value: v,
            })
            .collect();

        Self {
            key,
            confidence: candidate.confidence,
            cardinality: candidate.cardinality,
            evidence: candidate.evidence.clone(),
            sample_pairs,
        }
    }
}

/// A verifier's decision on one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub key: RelationshipKey,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Replaces the inferred cardinality when the verdict accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
    /// The verifier's own confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// External verifier.
///
/// Verdicts may come back in any order and may omit requests; missing
/// verdicts leave their candidates unverified.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify_batch(
        &self,
        requests: &[VerificationRequest],
    ) -> VerifyResult<Vec<VerificationVerdict>>;

    /// Name used in notes and logs.
    fn name(&self) -> &str {
        "verifier"
    }
}

/// Verifier that always defers: it returns no verdicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferVerifier;

#[async_trait]
impl Verifier for DeferVerifier {
    async fn verify_batch(
        &self,
        _requests: &[VerificationRequest],
    ) -> VerifyResult<Vec<VerificationVerdict>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "defer"
    }
}

/// Offline verifier that decides from the fused confidence and names.
///
/// Accepts above `min_confidence`. A request already inferred one-to-one, or
/// whose evidence mentions uniqueness, stays one-to-one; otherwise a `*_id`
/// column pointing at `id` is many-to-one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleBasedVerifier {
    pub min_confidence: f64,
}

impl Default for RuleBasedVerifier {
    fn default() -> Self {
        Self {
            min_confidence: RULE_BASED_MIN_CONFIDENCE,
        }
    }
}

impl RuleBasedVerifier {
    fn decide(&self, request: &VerificationRequest) -> VerificationVerdict {
        let key = &request.key;
        let unique = request.cardinality == Cardinality::OneToOne
            || request
                .evidence
                .iter()
                .any(|e| e.to_lowercase().contains("unique"));
        let cardinality = if unique {
            Some(Cardinality::OneToOne)
        } else if key.from_column.ends_with("_id") && key.to_column == "id" {
            Some(Cardinality::ManyToOne)
        } else {
            None
        };

        VerificationVerdict {
            key: key.clone(),
            accepted: request.confidence > self.min_confidence,
            explanation: Some(format!("rule-based: {}", request.evidence.join(", "))),
            cardinality,
            confidence: Some(request.confidence),
        }
    }
}

#[async_trait]
impl Verifier for RuleBasedVerifier {
    async fn verify_batch(
        &self,
        requests: &[VerificationRequest],
    ) -> VerifyResult<Vec<VerificationVerdict>> {
        Ok(requests.iter().map(|r| self.decide(r)).collect())
    }

    fn name(&self) -> &str {
        "rule-based"
    }
}

/// Wire form of a JSON verdict.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    is_valid: bool,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    cardinality: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Parse a JSON verdict of the form
/// `{"is_valid": true, "confidence": 0.9, "cardinality": "N:1", "explanation": "..."}`.
///
/// Extra fields (`relationship_type`, `recommendation`, ...) are ignored.
/// A missing `is_valid`, an unknown cardinality or a confidence outside
/// [0, 1] is an error.
pub fn parse_verdict_json(key: &RelationshipKey, text: &str) -> VerifyResult<VerificationVerdict> {
    let raw: RawVerdict = serde_json::from_str(text.trim())?;

    let cardinality = raw
        .cardinality
        .as_deref()
        .map(str::parse::<Cardinality>)
        .transpose()
        .map_err(VerifyError::MalformedVerdict)?;

    if let Some(c) = raw.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(VerifyError::MalformedVerdict(format!(
                "confidence {c} is outside [0, 1]"
            )));
        }
    }

    Ok(VerificationVerdict {
        key: key.clone(),
        accepted: raw.is_valid,
        explanation: raw.explanation.filter(|e| !e.trim().is_empty()),
        cardinality,
        confidence: raw.confidence,
    })
}

/// Budget, batching and timeout for a verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// Maximum candidates sent per run.
    pub budget: usize,
    /// Candidates per verifier call.
    pub batch_size: usize,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Outcome counts of a verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationSummary {
    /// Candidates sent to the verifier.
    pub sent: usize,
    /// Candidates that got a verdict.
    pub verified: usize,
    /// Candidates left unverified (timeouts, errors, missing verdicts, budget).
    pub unverified: usize,
    pub notes: Vec<String>,
}

/// Offer uncertain candidates to the verifier, in slice order.
///
/// Candidates beyond the budget are marked unverified without being sent.
pub async fn verify_uncertain(
    verifier: &dyn Verifier,
    policy: &VerificationPolicy,
    candidates: &mut [CandidateRelationship],
    samples: &SampleSet,
) -> VerificationSummary {
    let mut summary = VerificationSummary::default();

    let uncertain: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.status == Status::Uncertain)
        .map(|(idx, _)| idx)
        .collect();
    if uncertain.is_empty() {
        return summary;
    }

    let budget = policy.budget.min(uncertain.len());
    let (to_send, over_budget) = uncertain.split_at(budget);

    if !over_budget.is_empty() {
        for &idx in over_budget {
            candidates[idx].status = Status::Unverified;
        }
        summary.unverified += over_budget.len();
        summary.notes.push(format!(
            "{} uncertain candidate(s) exceeded the verification budget of {}",
            over_budget.len(),
            policy.budget
        ));
    }

    for chunk in to_send.chunks(policy.batch_size.max(1)) {
        let requests: Vec<VerificationRequest> = chunk
            .iter()
            .map(|&idx| VerificationRequest::from_candidate(&candidates[idx], samples))
            .collect();
        summary.sent += requests.len();

        let result = tokio::time::timeout(policy.timeout, verifier.verify_batch(&requests))
            .await
            .unwrap_or(Err(VerifyError::Timeout(policy.timeout)));

        let verdicts = match result {
            Ok(verdicts) => verdicts,
            Err(err) => {
                warn!(verifier = verifier.name(), error = %err, "verification batch failed");
                for &idx in chunk {
                    candidates[idx].status = Status::Unverified;
                }
                summary.unverified += chunk.len();
                summary.notes.push(format!(
                    "{} verifier: {} ({} candidate(s) unverified)",
                    verifier.name(),
                    err,
                    chunk.len()
                ));
                continue;
            }
        };

        let mut by_key: HashMap<RelationshipKey, VerificationVerdict> =
            verdicts.into_iter().map(|v| (v.key.clone(), v)).collect();

        let mut missing = 0;
        for &idx in chunk {
            let candidate = &mut candidates[idx];
            match by_key.remove(&candidate.key()) {
                Some(verdict) => apply_verdict(candidate, verdict),
                None => {
                    candidate.status = Status::Unverified;
                    missing += 1;
                }
            }
        }
        summary.verified += chunk.len() - missing;
        summary.unverified += missing;
        if missing > 0 {
            summary.notes.push(format!(
                "{} verifier returned no verdict for {} candidate(s)",
                verifier.name(),
                missing
            ));
        }
    }

    debug!(
        sent = summary.sent,
        verified = summary.verified,
        unverified = summary.unverified,
        "verification pass complete"
    );
    summary
}

fn apply_verdict(candidate: &mut CandidateRelationship, verdict: VerificationVerdict) {
    if verdict.accepted {
        candidate.status = Status::Accepted;
        if let Some(cardinality) = verdict.cardinality {
            candidate.cardinality = cardinality;
        }
    } else {
        candidate.status = Status::Rejected;
    }
    if let Some(explanation) = &verdict.explanation {
        candidate.evidence.push(format!("verifier: {explanation}"));
    }
    candidate.verdict = Some(verdict);
}
