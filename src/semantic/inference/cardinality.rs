//! Cardinality inference and junction-table detection.

use std::collections::BTreeMap;

use crate::model::{SchemaSnapshot, Table};

use super::{CandidateRelationship, Cardinality, ManyToManyRelationship, RelationshipKey, Status};

/// Column-name suffixes allowed beside a junction's two keys.
const JUNCTION_SUFFIXES: &[&str] = &["_id", "_at", "_on", "_date", "_time", "_ts"];

/// Audit column names allowed beside a junction's two keys.
const JUNCTION_AUDIT_COLUMNS: &[&str] = &[
    "created",
    "updated",
    "modified",
    "deleted",
    "created_by",
    "updated_by",
];

/// Link-payload column names allowed beside a junction's two keys.
const JUNCTION_PAYLOAD_COLUMNS: &[&str] = &[
    "quantity",
    "qty",
    "price",
    "unit_price",
    "amount",
    "position",
    "sort_order",
    "rank",
    "weight",
];

/// Cardinality of `source → target`, read from the source side.
///
/// One-to-one when the target is its table's sole primary key and the source
/// column is itself unique (sole primary key, or statistics with distinct ≈
/// rows). Everything else is many-to-one.
pub fn infer_cardinality(snapshot: &SchemaSnapshot, key: &RelationshipKey) -> Cardinality {
    let source_unique = snapshot
        .table(&key.from_table)
        .is_some_and(|t| t.column_is_unique(&key.from_column));
    let target_is_pk = snapshot
        .table(&key.to_table)
        .is_some_and(|t| t.is_sole_primary_key(&key.to_column));

    if source_unique && target_is_pk {
        Cardinality::OneToOne
    } else {
        Cardinality::ManyToOne
    }
}

/// Find junction tables among the surviving candidates.
///
/// Both member candidates of each junction are annotated with the junction
/// table name. Rejected candidates don't count as foreign-key-like columns.
pub fn detect_junctions(
    snapshot: &SchemaSnapshot,
    candidates: &mut [CandidateRelationship],
) -> Vec<ManyToManyRelationship> {
    // source table -> source column -> candidate indices
    let mut by_table: BTreeMap<String, BTreeMap<String, Vec<usize>>> = BTreeMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.status == Status::Rejected {
            continue;
        }
        by_table
            .entry(candidate.source_table.to_lowercase())
            .or_default()
            .entry(candidate.source_column.to_lowercase())
            .or_default()
            .push(idx);
    }

    let mut bridges = Vec::new();
    for (table_name, columns) in by_table {
        let Some(table) = snapshot.table(&table_name) else {
            continue;
        };
        if columns.len() != 2 || columns.values().any(|ids| ids.len() != 1) {
            continue;
        }

        let mut members: Vec<usize> = columns.values().map(|ids| ids[0]).collect();
        members.sort_by(|a, b| {
            candidates[*a]
                .target_table
                .to_lowercase()
                .cmp(&candidates[*b].target_table.to_lowercase())
        });
        let (left, right) = (&candidates[members[0]], &candidates[members[1]]);

        let distinct_targets = !left.target_table.eq_ignore_ascii_case(&right.target_table);
        let external_targets = !left.target_table.eq_ignore_ascii_case(&table.name)
            && !right.target_table.eq_ignore_ascii_case(&table.name);
        if !distinct_targets || !external_targets {
            continue;
        }

        let key_columns: Vec<&str> = columns.keys().map(String::as_str).collect();
        if !is_junction_shape(table, &key_columns) {
            continue;
        }

        let bridge = ManyToManyRelationship {
            left_table: left.target_table.clone(),
            right_table: right.target_table.clone(),
            junction_table: table.name.clone(),
            members: [left.key(), right.key()],
            confidence: left.confidence.min(right.confidence),
        };
        for idx in members {
            candidates[idx].junction = Some(table.name.clone());
        }
        bridges.push(bridge);
    }

    bridges
}

/// Whether a table's key and remaining columns look like a pure link table.
fn is_junction_shape(table: &Table, key_columns: &[&str]) -> bool {
    let is_key_column = |name: &str| key_columns.iter().any(|k| k.eq_ignore_ascii_case(name));

    let pk_ok = match table.primary_key.as_slice() {
        [] => true,
        [single] => is_surrogate_key(table, single),
        composite => composite.iter().all(|pk| is_key_column(pk)),
    };
    if !pk_ok {
        return false;
    }

    table
        .columns
        .iter()
        .filter(|c| !is_key_column(&c.name) && !c.is_primary_key)
        .all(|c| is_link_attribute(&c.name))
}

fn is_surrogate_key(table: &Table, column: &str) -> bool {
    let column = column.to_lowercase();
    let table_name = table.name.to_lowercase();
    column == "id"
        || column == format!("{table_name}_id")
        || column == format!("{}_id", super::signals::singularize(&table_name))
}

fn is_link_attribute(column: &str) -> bool {
    let column = column.to_lowercase();
    JUNCTION_SUFFIXES.iter().any(|s| column.ends_with(s))
        || JUNCTION_AUDIT_COLUMNS.contains(&column.as_str())
        || JUNCTION_PAYLOAD_COLUMNS.contains(&column.as_str())
}
