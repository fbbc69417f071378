//! Relationship detection engine.
//!
//! The engine runs the signal components over a snapshot, fuses their
//! scores, ranks the result and optionally hands the uncertain band to an
//! external verifier.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::model::SchemaSnapshot;

use super::cardinality::{detect_junctions, infer_cardinality};
use super::fusion::FusionWeights;
use super::ranking::{output_order, RankingConfig};
use super::rules::{default_rules, PatternMatch, PatternMatcher, PatternRule};
use super::sampling::{SampleRequest, SampleSet, ValueSampler};
use super::signals::overlap::{
    OverlapOutcome, OverlapVerifier, DEFAULT_SAMPLE_SIZE, DEFAULT_TARGET_CAP,
};
use super::signals::semantic::{Embedder, HashingEmbedder, SemanticIndex, SemanticScorer, DEFAULT_DIMENSION};
use super::verify::{verify_uncertain, VerificationPolicy, Verifier};
use super::{
    thresholds, CandidateRelationship, DetectionReport, Provenance, RelationshipKey, SignalScores,
    Status,
};

/// Default minimum name similarity for semantic-only candidates.
pub const DEFAULT_SEMANTIC_FLOOR: f64 = 0.6;

/// Configuration for a detection run.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Pattern rules, tried in order.
    pub rules: Vec<PatternRule>,
    /// Minimum similarity for a semantic-only candidate.
    pub semantic_floor: f64,
    /// Whether source-column texts include the table name.
    pub include_table_name: bool,
    /// Dimension of the default hashing embedder.
    pub embedding_dimension: usize,
    /// K: distinct source values checked per candidate.
    pub overlap_sample_size: usize,
    /// Distinct target values held per candidate.
    pub target_sample_cap: usize,
    pub fusion_weights: FusionWeights,
    /// Fused confidence below which candidates are rejected.
    pub acceptance_floor: f64,
    /// Fused confidence at or above which candidates are accepted.
    pub accept_threshold: f64,
    pub ambiguity_tolerance: f64,
    /// Maximum candidates sent to the verifier per run.
    pub verification_budget: usize,
    pub verification_batch_size: usize,
    pub verifier_timeout: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let policy = VerificationPolicy::default();
        Self {
            rules: default_rules(),
            semantic_floor: DEFAULT_SEMANTIC_FLOOR,
            include_table_name: true,
            embedding_dimension: DEFAULT_DIMENSION,
            overlap_sample_size: DEFAULT_SAMPLE_SIZE,
            target_sample_cap: DEFAULT_TARGET_CAP,
            fusion_weights: FusionWeights::default(),
            acceptance_floor: thresholds::confidence::FLOOR,
            accept_threshold: thresholds::confidence::ACCEPT,
            ambiguity_tolerance: thresholds::confidence::AMBIGUITY_TOLERANCE,
            verification_budget: policy.budget,
            verification_batch_size: policy.batch_size,
            verifier_timeout: policy.timeout,
        }
    }
}

impl DetectionConfig {
    /// Fewer false positives, may miss some relationships.
    pub fn high_precision() -> Self {
        Self {
            semantic_floor: 0.75,
            acceptance_floor: 0.60,
            accept_threshold: 0.90,
            ambiguity_tolerance: 0.03,
            ..Default::default()
        }
    }

    /// More relationships found, may include false positives.
    pub fn high_recall() -> Self {
        Self {
            semantic_floor: 0.50,
            acceptance_floor: 0.40,
            accept_threshold: 0.75,
            ambiguity_tolerance: 0.08,
            ..Default::default()
        }
    }

    /// Builder: replace the pattern rules.
    pub fn with_rules(mut self, rules: Vec<PatternRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Builder: append a pattern rule.
    pub fn with_rule(mut self, rule: PatternRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Builder: set the semantic floor.
    pub fn with_semantic_floor(mut self, floor: f64) -> Self {
        self.semantic_floor = floor.clamp(0.0, 1.0);
        self
    }

    /// Builder: include or omit table names in source texts.
    pub fn with_table_name_in_text(mut self, include: bool) -> Self {
        self.include_table_name = include;
        self
    }

    /// Builder: set the hashing embedder dimension.
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension.max(1);
        self
    }

    /// Builder: set overlap sample size K.
    pub fn with_overlap_sample_size(mut self, k: usize) -> Self {
        self.overlap_sample_size = k.max(1);
        self
    }

    /// Builder: set the target sample cap.
    pub fn with_target_sample_cap(mut self, cap: usize) -> Self {
        self.target_sample_cap = cap.max(1);
        self
    }

    /// Builder: set fusion weights.
    pub fn with_fusion_weights(mut self, weights: FusionWeights) -> Self {
        self.fusion_weights = weights;
        self
    }

    /// Builder: set the acceptance floor.
    pub fn with_acceptance_floor(mut self, floor: f64) -> Self {
        self.acceptance_floor = floor.clamp(0.0, 1.0);
        self
    }

    /// Builder: set the accept threshold.
    pub fn with_accept_threshold(mut self, threshold: f64) -> Self {
        self.accept_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Builder: set the ambiguity tolerance.
    pub fn with_ambiguity_tolerance(mut self, tolerance: f64) -> Self {
        self.ambiguity_tolerance = tolerance.clamp(0.0, 1.0);
        self
    }

    /// Builder: set the verification budget.
    pub fn with_verification_budget(mut self, budget: usize) -> Self {
        self.verification_budget = budget;
        self
    }

    /// Builder: set the verifier batch size.
    pub fn with_verification_batch_size(mut self, size: usize) -> Self {
        self.verification_batch_size = size.max(1);
        self
    }

    /// Builder: set the per-call verifier timeout.
    pub fn with_verifier_timeout(mut self, timeout: Duration) -> Self {
        self.verifier_timeout = timeout;
        self
    }

    fn ranking(&self) -> RankingConfig {
        RankingConfig {
            accept_threshold: self.accept_threshold,
            acceptance_floor: self.acceptance_floor,
            ambiguity_tolerance: self.ambiguity_tolerance,
        }
    }

    fn verification_policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            budget: self.verification_budget,
            batch_size: self.verification_batch_size.max(1),
            timeout: self.verifier_timeout,
        }
    }
}

/// Candidate keys and the per-source evidence found before sampling.
struct Proposals {
    pattern: BTreeMap<RelationshipKey, PatternMatch>,
    semantic: SemanticIndex,
    keys: BTreeSet<RelationshipKey>,
}

/// Ranked candidates before junction detection.
struct Scored {
    ranked: Vec<CandidateRelationship>,
    rejected: Vec<CandidateRelationship>,
    notes: Vec<String>,
}

/// The relationship detector.
#[derive(Debug, Clone)]
pub struct RelationshipDetector {
    config: DetectionConfig,
    matcher: PatternMatcher,
    scorer: SemanticScorer,
    overlap: OverlapVerifier,
}

impl Default for RelationshipDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

impl RelationshipDetector {
    /// Create a detector using the local hashing embedder.
    pub fn new(config: DetectionConfig) -> Self {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(config.embedding_dimension));
        let scorer = SemanticScorer::new(embedder).with_table_name(config.include_table_name);
        Self {
            matcher: PatternMatcher::with_rules(config.rules.clone()),
            overlap: OverlapVerifier::new(config.overlap_sample_size, config.target_sample_cap),
            scorer,
            config,
        }
    }

    /// Builder: use a different embedding backend.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.scorer = SemanticScorer::new(embedder).with_table_name(self.config.include_table_name);
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    fn gather(&self, snapshot: &SchemaSnapshot) -> Proposals {
        let pattern: BTreeMap<RelationshipKey, PatternMatch> = self
            .matcher
            .find_candidates(snapshot)
            .into_iter()
            .map(|m| (m.key.clone(), m))
            .collect();
        let semantic = self.scorer.index(snapshot);
        let semantic_only = semantic.proposals(snapshot, self.config.semantic_floor);

        debug!(
            pattern = pattern.len(),
            semantic = semantic_only.len(),
            "generated candidates"
        );

        let keys = pattern
            .keys()
            .cloned()
            .chain(semantic_only.into_iter().map(|(key, _)| key))
            .collect();

        Proposals {
            pattern,
            semantic,
            keys,
        }
    }

    /// Every candidate key proposed by the pattern and semantic components,
    /// in key order.
    pub fn propose(&self, snapshot: &SchemaSnapshot) -> Vec<RelationshipKey> {
        self.gather(snapshot).keys.into_iter().collect()
    }

    /// Columns worth sampling for the overlap check.
    ///
    /// Candidates whose types can never overlap are skipped, so they consume
    /// no sample budget.
    pub fn sample_requests(&self, snapshot: &SchemaSnapshot) -> Vec<SampleRequest> {
        let mut requests = BTreeSet::new();
        for key in self.propose(snapshot) {
            let (Some(source), Some(target)) = (
                snapshot.column(&key.from_table, &key.from_column),
                snapshot.column(&key.to_table, &key.to_column),
            ) else {
                continue;
            };
            if self.overlap.type_check(source, target).is_some() {
                continue;
            }
            requests.insert(SampleRequest::new(
                key.from_table.clone(),
                key.from_column.clone(),
                self.config.overlap_sample_size,
            ));
            requests.insert(SampleRequest::new(
                key.to_table.clone(),
                key.to_column.clone(),
                self.config.target_sample_cap,
            ));
        }
        requests.into_iter().collect()
    }

    fn build_candidate(
        &self,
        snapshot: &SchemaSnapshot,
        proposals: &Proposals,
        key: &RelationshipKey,
        samples: &SampleSet,
    ) -> Option<CandidateRelationship> {
        let source_table = snapshot.table(&key.from_table)?;
        let source_column = source_table.get_column(&key.from_column)?;
        let target_table = snapshot.table(&key.to_table)?;
        let target_column = target_table.get_column(&key.to_column)?;

        let pattern = proposals.pattern.get(key);
        let declared = pattern.is_some_and(|m| m.declared);
        let signals = SignalScores {
            pattern: pattern.map(|m| m.score),
            semantic: proposals.semantic.score(key),
            overlap: self.overlap.verify_candidate(snapshot, key, samples),
        };
        let fused = self.config.fusion_weights.fuse(&signals, declared);

        let mut evidence = Vec::new();
        if let Some(m) = pattern {
            evidence.push(m.evidence.clone());
        }
        if let Some(similarity) = signals.semantic {
            evidence.push(format!("name similarity {similarity:.2}"));
        }
        match &signals.overlap {
            OverlapOutcome::Measured {
                sampled, matched, ..
            } => evidence.push(format!(
                "{matched} of {sampled} sampled values found in target"
            )),
            OverlapOutcome::TypeMismatch { reason } => {
                evidence.push(format!("type mismatch: {reason}"))
            }
            OverlapOutcome::Indeterminate { .. } => {}
        }
        if source_table.column_is_unique(&source_column.name) {
            evidence.push("source column is unique".to_string());
        }

        Some(CandidateRelationship {
            source_table: source_table.name.clone(),
            source_column: source_column.name.clone(),
            target_table: target_table.name.clone(),
            target_column: target_column.name.clone(),
            cardinality: infer_cardinality(snapshot, key),
            confidence: fused.confidence,
            provenance: if declared {
                Provenance::Declared
            } else {
                Provenance::Detected
            },
            rule: pattern.map(|m| m.rule.clone()),
            signals,
            evidence,
            ambiguous: false,
            status: Status::Uncertain,
            verdict: None,
            junction: None,
        })
    }

    fn score(&self, snapshot: &SchemaSnapshot, samples: &SampleSet) -> Scored {
        let proposals = self.gather(snapshot);
        let mut notes = Vec::new();
        if let Some(err) = proposals.semantic.failure() {
            notes.push(format!("semantic signal unavailable: embedding failed ({err})"));
        }

        let mut kept = Vec::new();
        let mut rejected = Vec::new();
        for key in &proposals.keys {
            let Some(mut candidate) = self.build_candidate(snapshot, &proposals, key, samples)
            else {
                continue;
            };
            if candidate.is_declared() || candidate.confidence >= self.config.acceptance_floor {
                kept.push(candidate);
            } else {
                candidate.status = Status::Rejected;
                rejected.push(candidate);
            }
        }
        debug!(kept = kept.len(), rejected = rejected.len(), "fused candidates");

        let kept_keys: Vec<RelationshipKey> = kept.iter().map(CandidateRelationship::key).collect();
        let ranked = self.config.ranking().rank(kept.clone());
        let ranked_keys: HashSet<RelationshipKey> =
            ranked.iter().map(CandidateRelationship::key).collect();

        for (key, mut candidate) in kept_keys.into_iter().zip(kept) {
            if !ranked_keys.contains(&key) {
                candidate.status = Status::Rejected;
                candidate
                    .evidence
                    .push("outranked by another candidate for this column pair".to_string());
                rejected.push(candidate);
            }
        }

        Scored {
            ranked,
            rejected,
            notes,
        }
    }

    fn finish(&self, snapshot: &SchemaSnapshot, scored: Scored) -> DetectionReport {
        let Scored {
            mut ranked,
            rejected,
            notes,
        } = scored;

        let bridges = detect_junctions(snapshot, &mut ranked);

        let mut report = DetectionReport::default();
        for candidate in ranked.into_iter().chain(rejected) {
            match candidate.status {
                Status::Accepted => report.accepted.push(candidate),
                Status::Uncertain => report.uncertain.push(candidate),
                Status::Unverified => report.unverified.push(candidate),
                Status::Rejected => report.rejected.push(candidate),
            }
        }
        for list in [
            &mut report.accepted,
            &mut report.uncertain,
            &mut report.unverified,
            &mut report.rejected,
        ] {
            list.sort_by(output_order);
        }
        report.many_to_many = bridges;
        report.notes = notes;

        info!(
            accepted = report.accepted.len(),
            uncertain = report.uncertain.len(),
            unverified = report.unverified.len(),
            rejected = report.rejected.len(),
            many_to_many = report.many_to_many.len(),
            "relationship detection complete"
        );
        report
    }

    /// Detect relationships from already-collected samples, without a
    /// verifier. Uncertain candidates stay uncertain.
    pub fn detect(&self, snapshot: &SchemaSnapshot, samples: &SampleSet) -> DetectionReport {
        let scored = self.score(snapshot, samples);
        self.finish(snapshot, scored)
    }

    /// Full run: collect samples, score, rank and verify the uncertain band.
    pub async fn analyze(
        &self,
        snapshot: &SchemaSnapshot,
        sampler: &dyn ValueSampler,
        verifier: &dyn Verifier,
    ) -> DetectionReport {
        let requests = self.sample_requests(snapshot);
        let samples = SampleSet::collect(sampler, &requests).await;

        let mut scored = self.score(snapshot, &samples);
        let summary = verify_uncertain(
            verifier,
            &self.config.verification_policy(),
            &mut scored.ranked,
            &samples,
        )
        .await;
        scored.notes.extend(summary.notes);

        self.finish(snapshot, scored)
    }
}
