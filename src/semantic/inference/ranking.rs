//! Deduplication, banding and ordering of fused candidates.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use super::{thresholds, CandidateRelationship, Status};

/// Ranking thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingConfig {
    /// Confidence at or above which a candidate is accepted without
    /// verification.
    pub accept_threshold: f64,
    /// Confidence below which a candidate is rejected.
    pub acceptance_floor: f64,
    /// Candidates of one source column within this distance of the best one
    /// are all kept, flagged ambiguous.
    pub ambiguity_tolerance: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            accept_threshold: thresholds::confidence::ACCEPT,
            acceptance_floor: thresholds::confidence::FLOOR,
            ambiguity_tolerance: thresholds::confidence::AMBIGUITY_TOLERANCE,
        }
    }
}

impl RankingConfig {
    /// Band a confidence value.
    pub fn band(&self, confidence: f64) -> Status {
        if confidence >= self.accept_threshold {
            Status::Accepted
        } else if confidence >= self.acceptance_floor {
            Status::Uncertain
        } else {
            Status::Rejected
        }
    }

    /// Deduplicate, band and order candidates.
    ///
    /// 1. Per source column: declared candidates win outright; otherwise the
    ///    best candidate and any within tolerance of it survive.
    /// 2. One candidate per unordered column pair, preferring higher
    ///    confidence, then declared.
    /// 3. Status from the confidence band; ambiguous candidates are never
    ///    accepted without verification, declared ones always are.
    /// 4. Confidence descending, ties by key.
    pub fn rank(&self, candidates: Vec<CandidateRelationship>) -> Vec<CandidateRelationship> {
        let mut by_source: BTreeMap<(String, String), Vec<CandidateRelationship>> = BTreeMap::new();
        for candidate in candidates {
            by_source
                .entry((
                    candidate.source_table.to_lowercase(),
                    candidate.source_column.to_lowercase(),
                ))
                .or_default()
                .push(candidate);
        }

        let mut kept = Vec::new();
        for (_, mut group) in by_source {
            if group.iter().any(CandidateRelationship::is_declared) {
                kept.extend(group.into_iter().filter(CandidateRelationship::is_declared));
                continue;
            }

            group.sort_by(rank_order);
            let best = group[0].confidence;
            let survivors: Vec<_> = group
                .into_iter()
                .filter(|c| best - c.confidence <= self.ambiguity_tolerance + f64::EPSILON)
                .collect();
            let ambiguous = survivors.len() > 1;
            kept.extend(survivors.into_iter().map(|mut c| {
                c.ambiguous = ambiguous;
                c
            }));
        }

        kept.sort_by(rank_order);
        let mut seen_pairs = HashSet::new();
        kept.retain(|c| seen_pairs.insert(c.key().pair_key()));

        for candidate in &mut kept {
            candidate.status = if candidate.is_declared() {
                Status::Accepted
            } else if candidate.ambiguous {
                match self.band(candidate.confidence) {
                    Status::Rejected => Status::Rejected,
                    _ => Status::Uncertain,
                }
            } else {
                self.band(candidate.confidence)
            };
        }

        kept.sort_by(output_order);
        kept
    }
}

/// Higher confidence first, then declared, then key.
fn rank_order(a: &CandidateRelationship, b: &CandidateRelationship) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.is_declared().cmp(&a.is_declared()))
        .then_with(|| a.key().cmp(&b.key()))
}

/// Confidence descending, ties by (source table, source column, target
/// table, target column).
pub(crate) fn output_order(a: &CandidateRelationship, b: &CandidateRelationship) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.key().cmp(&b.key()))
}
