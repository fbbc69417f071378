//! Pattern rules for foreign-key discovery.
//!
//! Each rule is data: a name pattern, a score weight and a resolution
//! strategy. Callers extend the default list by appending rules, so the
//! matcher never needs a new code path for a new naming convention.

use std::collections::BTreeMap;

use regex::Regex;

use crate::model::{SchemaSnapshot, Table};

use super::signals::inflection::table_name_forms;
use super::{thresholds, RelationshipKey};

/// How a rule recognizes a candidate column name.
#[derive(Debug, Clone)]
pub enum PatternKind {
    /// Column ends with the suffix; the remainder names the table
    /// (e.g. `customer_id` with `_id` -> `customer`).
    Suffix(String),
    /// Column starts with the prefix; the remainder (optionally stripped of a
    /// trailing suffix) names the table (e.g. `fk_customer_id` -> `customer`).
    Prefix {
        prefix: String,
        strip_suffix: Option<String>,
    },
    /// Column name equals another table's single-column primary key name.
    PrimaryKeyName,
    /// User-supplied regex. The named capture `table` (or the whole match)
    /// is the remainder.
    Regex(Regex),
}

/// How the remainder of a matched name is turned into a target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Remainder, inflected, equals a table name (case-insensitive).
    TableName,
    /// The whole column name equals a table's primary key column name.
    PrimaryKey,
}

/// A naming-convention rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Rule identifier, carried into candidate provenance.
    pub name: String,
    pub kind: PatternKind,
    /// Pattern score for matches from this rule (0.0 to 1.0).
    pub weight: f64,
    pub resolution: Resolution,
}

impl PatternRule {
    /// `{table}{suffix}` rule resolved by table name.
    pub fn suffix(name: impl Into<String>, suffix: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            kind: PatternKind::Suffix(suffix.into().to_lowercase()),
            weight: weight.clamp(0.0, 1.0),
            resolution: Resolution::TableName,
        }
    }

    /// `{prefix}{table}` rule resolved by table name.
    pub fn prefix(
        name: impl Into<String>,
        prefix: impl Into<String>,
        strip_suffix: Option<&str>,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PatternKind::Prefix {
                prefix: prefix.into().to_lowercase(),
                strip_suffix: strip_suffix.map(str::to_lowercase),
            },
            weight: weight.clamp(0.0, 1.0),
            resolution: Resolution::TableName,
        }
    }

    /// Exact primary-key-name rule.
    pub fn primary_key_name(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            kind: PatternKind::PrimaryKeyName,
            weight: weight.clamp(0.0, 1.0),
            resolution: Resolution::PrimaryKey,
        }
    }

    /// Regex rule resolved by table name.
    pub fn regex(name: impl Into<String>, pattern: Regex, weight: f64) -> Self {
        Self {
            name: name.into(),
            kind: PatternKind::Regex(pattern),
            weight: weight.clamp(0.0, 1.0),
            resolution: Resolution::TableName,
        }
    }

    /// Builder: override the resolution strategy.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Extract the table-naming remainder from a lowercase column name.
    ///
    /// Returns `None` when the rule doesn't apply to this column.
    fn remainder<'a>(&self, col_lower: &'a str) -> Option<std::borrow::Cow<'a, str>> {
        use std::borrow::Cow;

        match &self.kind {
            PatternKind::Suffix(suffix) => col_lower
                .strip_suffix(suffix.as_str())
                .filter(|base| !base.is_empty())
                .map(Cow::Borrowed),
            PatternKind::Prefix {
                prefix,
                strip_suffix,
            } => {
                let rest = col_lower.strip_prefix(prefix.as_str())?;
                let rest = match strip_suffix {
                    Some(suffix) => rest.strip_suffix(suffix.as_str()).unwrap_or(rest),
                    None => rest,
                };
                (!rest.is_empty()).then_some(Cow::Borrowed(rest))
            }
            PatternKind::PrimaryKeyName => Some(Cow::Borrowed(col_lower)),
            PatternKind::Regex(re) => {
                let caps = re.captures(col_lower)?;
                let m = caps.name("table").or_else(|| caps.get(0))?;
                (!m.as_str().is_empty()).then(|| Cow::Owned(m.as_str().to_string()))
            }
        }
    }
}

/// Rule name carried by declared foreign keys.
pub const DECLARED_RULE: &str = "declared_fk";

/// Returns the default rule set, highest weight first.
///
/// An exact match on another table's primary-key column name is the
/// strongest convention signal; suffix/prefix conventions score lower, and
/// the looser `_ref`/`_key`/`_code` and `ref_`/`parent_`/`child_` forms
/// lowest.
pub fn default_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::primary_key_name("pk_name_match", 0.90),
        PatternRule::suffix("suffix_id", "_id", 0.80),
        PatternRule::prefix("fk_prefix", "fk_", Some("_id"), 0.78),
        PatternRule::suffix("suffix_fk", "_fk", 0.75),
        PatternRule::suffix("suffix_ref", "_ref", 0.70),
        PatternRule::suffix("suffix_key", "_key", 0.70),
        PatternRule::prefix("ref_prefix", "ref_", Some("_id"), 0.68),
        PatternRule::prefix("parent_prefix", "parent_", Some("_id"), 0.68),
        PatternRule::suffix("suffix_code", "_code", 0.65),
        PatternRule::prefix("child_prefix", "child_", Some("_id"), 0.62),
    ]
}

/// A candidate produced by the pattern matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub key: RelationshipKey,
    /// Rule that produced the match (`declared_fk` for declared keys).
    pub rule: String,
    /// Pattern score (1.0 for declared keys).
    pub score: f64,
    /// Whether this restates a declared foreign key.
    pub declared: bool,
    pub evidence: String,
}

/// Syntactic candidate generator.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: Vec<PatternRule>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher {
    /// Matcher with the default rules.
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    /// Matcher with a custom rule list.
    pub fn with_rules(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Append a rule.
    pub fn push_rule(&mut self, rule: PatternRule) {
        self.rules.push(rule);
    }

    /// Get all rules.
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Find every pattern candidate in the snapshot.
    ///
    /// Declared foreign keys are always emitted with score 1.0. For each
    /// (source, target) pair only the highest-scoring rule is kept. The
    /// result is sorted by key, so it doesn't depend on table order.
    pub fn find_candidates(&self, snapshot: &SchemaSnapshot) -> Vec<PatternMatch> {
        let mut best: BTreeMap<RelationshipKey, PatternMatch> = BTreeMap::new();

        for table in snapshot.tables() {
            for column in &table.columns {
                if let Some(reference) = &column.references {
                    let key = RelationshipKey::new(
                        &table.name,
                        &column.name,
                        &reference.table,
                        &reference.column,
                    );
                    best.insert(
                        key.clone(),
                        PatternMatch {
                            key,
                            rule: DECLARED_RULE.to_string(),
                            score: thresholds::confidence::DECLARED,
                            declared: true,
                            evidence: format!(
                                "declared foreign key {}.{} → {}.{}",
                                table.name, column.name, reference.table, reference.column
                            ),
                        },
                    );
                    continue;
                }

                let col_lower = column.name.to_lowercase();
                for rule in &self.rules {
                    for m in self.match_rule(rule, snapshot, table, &col_lower) {
                        let replace = best
                            .get(&m.key)
                            .map_or(true, |existing| !existing.declared && m.score > existing.score);
                        if replace {
                            best.insert(m.key.clone(), m);
                        }
                    }
                }
            }
        }

        best.into_values().collect()
    }

    fn match_rule(
        &self,
        rule: &PatternRule,
        snapshot: &SchemaSnapshot,
        source: &Table,
        col_lower: &str,
    ) -> Vec<PatternMatch> {
        let Some(remainder) = rule.remainder(col_lower) else {
            return vec![];
        };

        let targets: Vec<(&Table, String, f64)> = match rule.resolution {
            Resolution::TableName => {
                table_name_forms(&remainder, thresholds::pattern::LITERAL_FORM_FACTOR)
                    .into_iter()
                    .filter_map(|(form, factor)| {
                        let target = snapshot.table(&form)?;
                        let target_column = identifying_column(target)?;
                        Some((target, target_column, rule.weight * factor))
                    })
                    .collect()
            }
            Resolution::PrimaryKey => {
                // "id" matches every surrogate key; it carries no information
                if col_lower == "id" {
                    return vec![];
                }
                snapshot
                    .tables()
                    .filter(|t| !t.name.eq_ignore_ascii_case(&source.name))
                    .filter_map(|t| {
                        let pk = t.sole_primary_key()?;
                        pk.name
                            .eq_ignore_ascii_case(col_lower)
                            .then(|| (t, pk.name.clone(), rule.weight))
                    })
                    .collect()
            }
        };

        targets
            .into_iter()
            .filter(|(target, target_column, _)| {
                // Skip a column pointing at itself
                !(target.name.eq_ignore_ascii_case(&source.name)
                    && target_column.eq_ignore_ascii_case(col_lower))
            })
            .map(|(target, target_column, score)| PatternMatch {
                key: RelationshipKey::new(&source.name, col_lower, &target.name, &target_column),
                rule: rule.name.clone(),
                score,
                declared: false,
                evidence: format!(
                    "column name matches '{}' pattern → {}.{}",
                    rule.name, target.name, target_column
                ),
            })
            .collect()
    }
}

/// The column a reference to `table` lands on: its single-column primary
/// key, or a column literally named `id`.
fn identifying_column(table: &Table) -> Option<String> {
    table
        .sole_primary_key()
        .or_else(|| table.get_column("id"))
        .map(|c| c.name.clone())
}
