//! Detection output and its text rendering.

use serde::Serialize;

use super::ranking::output_order;
use super::verify::VerificationVerdict;
use super::{thresholds, CandidateRelationship, ManyToManyRelationship, RelationshipKey};

/// Result of a detection run.
///
/// Every list is in output order: confidence descending, ties by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionReport {
    pub accepted: Vec<CandidateRelationship>,
    /// In the uncertain band and never offered to a verifier.
    pub uncertain: Vec<CandidateRelationship>,
    /// Needed verification that didn't happen (budget, timeout, error).
    pub unverified: Vec<CandidateRelationship>,
    /// Below the floor, outranked, or rejected by the verifier.
    pub rejected: Vec<CandidateRelationship>,
    pub many_to_many: Vec<ManyToManyRelationship>,
    /// Degraded collaborators and other run-level remarks.
    pub notes: Vec<String>,
}

impl DetectionReport {
    /// Accepted relationships that are not part of a many-to-many bridge.
    pub fn direct_relationships(&self) -> impl Iterator<Item = &CandidateRelationship> {
        self.accepted.iter().filter(|c| c.junction.is_none())
    }

    /// Look up a candidate in any list.
    pub fn find(&self, key: &RelationshipKey) -> Option<&CandidateRelationship> {
        self.candidates().find(|c| c.key() == *key)
    }

    /// Every candidate in the report, list by list.
    pub fn candidates(&self) -> impl Iterator<Item = &CandidateRelationship> {
        self.accepted
            .iter()
            .chain(&self.uncertain)
            .chain(&self.unverified)
            .chain(&self.rejected)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Render a human-readable summary grouped by confidence.
///
/// High-confidence entries list their evidence; low-confidence ones are
/// only counted. Junction members are shown as their many-to-many bridge.
/// Rejected candidates are left out of the confidence groups, but every
/// candidate carrying a verdict, rejected ones included, is listed under
/// VERIFICATION.
pub fn render_report(report: &DetectionReport) -> String {
    let mut live: Vec<&CandidateRelationship> = report
        .accepted
        .iter()
        .chain(&report.uncertain)
        .chain(&report.unverified)
        .filter(|c| c.junction.is_none())
        .collect();
    live.sort_by(|a, b| output_order(a, b));

    let high: Vec<_> = live
        .iter()
        .filter(|c| c.confidence >= thresholds::report::HIGH)
        .collect();
    let medium: Vec<_> = live
        .iter()
        .filter(|c| {
            c.confidence >= thresholds::report::MEDIUM && c.confidence < thresholds::report::HIGH
        })
        .collect();
    let low = live
        .iter()
        .filter(|c| c.confidence < thresholds::report::MEDIUM)
        .count();

    let rule = "=".repeat(60);
    let divider = "-".repeat(40);
    let mut lines = vec![rule.clone(), "DETECTED RELATIONSHIPS".to_string(), rule];

    if !high.is_empty() {
        lines.push(String::new());
        lines.push("HIGH CONFIDENCE (>= 80%)".to_string());
        lines.push(divider.clone());
        for rel in high {
            lines.push(headline(rel));
            lines.extend(rel.evidence.iter().map(|e| format!("    - {e}")));
        }
    }

    if !medium.is_empty() {
        lines.push(String::new());
        lines.push("MEDIUM CONFIDENCE (60-79%)".to_string());
        lines.push(divider.clone());
        lines.extend(medium.into_iter().map(|rel| headline(rel)));
    }

    if low > 0 {
        lines.push(String::new());
        lines.push("LOW CONFIDENCE (< 60%)".to_string());
        lines.push(divider.clone());
        lines.push(format!("{low} low-confidence relationship(s) found"));
    }

    if !report.many_to_many.is_empty() {
        lines.push(String::new());
        lines.push("MANY-TO-MANY".to_string());
        lines.push(divider.clone());
        lines.extend(
            report
                .many_to_many
                .iter()
                .map(|b| format!("{b}  {:.1}%", b.confidence * 100.0)),
        );
    }

    let mut verified: Vec<&CandidateRelationship> =
        report.candidates().filter(|c| c.verdict.is_some()).collect();
    verified.sort_by(|a, b| output_order(a, b));
    if !verified.is_empty() {
        let valid = verified
            .iter()
            .filter(|c| c.verdict.as_ref().is_some_and(|v| v.accepted))
            .count();
        lines.push(String::new());
        lines.push("VERIFICATION".to_string());
        lines.push(divider);
        lines.push(format!("{valid} valid, {} invalid", verified.len() - valid));
        for rel in verified {
            if let Some(verdict) = &rel.verdict {
                lines.extend(verdict_lines(rel, verdict));
            }
        }
    }

    if !report.notes.is_empty() {
        lines.push(String::new());
        lines.push("NOTES".to_string());
        lines.extend(report.notes.iter().map(|n| format!("  * {n}")));
    }

    lines.push(String::new());
    lines.push(format!(
        "Total relationships: {}",
        live.len() + report.many_to_many.len()
    ));
    lines.join("\n")
}

fn headline(rel: &CandidateRelationship) -> String {
    let mut line = format!(
        "{rel}  {:.1}%  {}  {}",
        rel.confidence * 100.0,
        rel.cardinality,
        rel.provenance
    );
    if rel.ambiguous {
        line.push_str("  (ambiguous)");
    }
    line
}

fn verdict_lines(rel: &CandidateRelationship, verdict: &VerificationVerdict) -> Vec<String> {
    let status = if verdict.accepted { "valid" } else { "invalid" };
    let cardinality = verdict.cardinality.unwrap_or(rel.cardinality);
    let mut lines = vec![
        format!("{rel}  {status}"),
        format!("    cardinality: {cardinality}"),
    ];
    if let Some(confidence) = verdict.confidence {
        lines.push(format!("    verifier confidence: {:.1}%", confidence * 100.0));
    }
    if let Some(explanation) = &verdict.explanation {
        lines.push(format!("    {explanation}"));
    }
    lines
}
