//! Schema snapshot: the immutable input to every detection component.
//!
//! A snapshot is built once per run from extracted metadata. Construction
//! validates that primary keys and declared foreign keys only name tables and
//! columns that exist; after that the snapshot is read-only and can be shared
//! freely across components (and threads).

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::error::{SnapshotError, SnapshotResult};
use super::types::TypeCategory;

/// Fraction of non-null rows that must be distinct for a column to count as
/// unique when only statistics are available.
const UNIQUE_DISTINCT_RATIO: f64 = 0.98;

/// Optional column statistics supplied by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Number of distinct non-null values.
    pub distinct_count: u64,
    /// Number of NULL values.
    #[serde(default)]
    pub null_count: u64,
}

/// A declared foreign-key target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// A column as seen by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared type, as reported by the database.
    #[serde(rename = "type", default)]
    pub data_type: String,
    /// Normalized type category (always recomputed from `data_type`).
    #[serde(skip_deserializing, default)]
    pub category: TypeCategory,
    /// Whether the column accepts NULL.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether the column is part of the table's primary key.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Declared foreign-key target, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ColumnRef>,
    /// Statistics, if the extractor collected them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ColumnStats>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Create a nullable column with no key information.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            category: TypeCategory::parse(&data_type),
            data_type,
            nullable: true,
            is_primary_key: false,
            references: None,
            stats: None,
        }
    }

    /// Builder: mark as (part of) the primary key. Implies NOT NULL.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    /// Builder: mark as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Builder: declare a foreign key.
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ColumnRef::new(table, column));
        self
    }

    /// Builder: attach statistics.
    pub fn with_stats(mut self, distinct_count: u64, null_count: u64) -> Self {
        self.stats = Some(ColumnStats {
            distinct_count,
            null_count,
        });
        self
    }

    /// Whether the column carries a declared foreign key.
    pub fn is_declared_foreign_key(&self) -> bool {
        self.references.is_some()
    }

    /// "distinct count ≈ row count" heuristic.
    ///
    /// Returns false when there are no statistics or no rows.
    pub fn stats_suggest_unique(&self, row_count: u64) -> bool {
        let Some(stats) = self.stats else {
            return false;
        };
        let non_null = row_count.saturating_sub(stats.null_count);
        if row_count == 0 || non_null == 0 {
            return false;
        }
        stats.distinct_count as f64 >= non_null as f64 * UNIQUE_DISTINCT_RATIO
    }
}

/// A table as seen by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Columns in declaration order.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Primary key columns. When empty, derived from the column flags.
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Row count (possibly an estimate).
    #[serde(default)]
    pub row_count: u64,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            row_count: 0,
        }
    }

    /// Builder: append a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Builder: set the row count.
    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = rows;
        self
    }

    /// Look up a column case-insensitively.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The primary key column, when the key is a single column.
    pub fn sole_primary_key(&self) -> Option<&Column> {
        match self.primary_key.as_slice() {
            [only] => self.get_column(only),
            _ => None,
        }
    }

    /// Whether `column` is this table's single-column primary key.
    pub fn is_sole_primary_key(&self, column: &str) -> bool {
        self.sole_primary_key()
            .is_some_and(|pk| pk.name.eq_ignore_ascii_case(column))
    }

    /// Whether the column is known to hold unique values: it is the sole
    /// primary key, or its statistics say distinct ≈ row count.
    pub fn column_is_unique(&self, column: &str) -> bool {
        if self.is_sole_primary_key(column) {
            return true;
        }
        self.get_column(column)
            .is_some_and(|c| c.stats_suggest_unique(self.row_count))
    }

    /// Normalize key flags and type categories, then validate local structure.
    fn normalize(&mut self) -> SnapshotResult<()> {
        if self.name.trim().is_empty() {
            return Err(SnapshotError::EmptyTableName);
        }

        let mut seen = HashSet::new();
        for column in &mut self.columns {
            if column.name.trim().is_empty() {
                return Err(SnapshotError::EmptyColumnName {
                    table: self.name.clone(),
                });
            }
            if !seen.insert(column.name.to_lowercase()) {
                return Err(SnapshotError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
            column.category = TypeCategory::parse(&column.data_type);
        }

        if self.primary_key.is_empty() {
            self.primary_key = self
                .columns
                .iter()
                .filter(|c| c.is_primary_key)
                .map(|c| c.name.clone())
                .collect();
        }

        // Canonicalize PK names to the declared column spelling
        let mut canonical = Vec::with_capacity(self.primary_key.len());
        for pk in &self.primary_key {
            let column = self.get_column(pk).ok_or_else(|| {
                SnapshotError::UnknownPrimaryKeyColumn {
                    table: self.name.clone(),
                    column: pk.clone(),
                }
            })?;
            canonical.push(column.name.clone());
        }
        self.primary_key = canonical;

        let pk_lower: HashSet<String> = self.primary_key.iter().map(|p| p.to_lowercase()).collect();
        for column in &mut self.columns {
            column.is_primary_key = pk_lower.contains(&column.name.to_lowercase());
            if column.is_primary_key {
                column.nullable = false;
            }
        }

        Ok(())
    }
}

/// Immutable, validated collection of tables.
///
/// Tables are keyed by lowercase name, so iteration is always in sorted
/// order regardless of how the snapshot was assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotDocument", into = "SnapshotDocument")]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, Table>,
}

/// Wire form of a snapshot: `{ "tables": [ ... ] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotDocument {
    tables: Vec<Table>,
}

impl TryFrom<SnapshotDocument> for SchemaSnapshot {
    type Error = SnapshotError;

    fn try_from(doc: SnapshotDocument) -> Result<Self, Self::Error> {
        SchemaSnapshot::new(doc.tables)
    }
}

impl From<SchemaSnapshot> for SnapshotDocument {
    fn from(snapshot: SchemaSnapshot) -> Self {
        SnapshotDocument {
            tables: snapshot.tables.into_values().collect(),
        }
    }
}

impl SchemaSnapshot {
    /// Build and validate a snapshot.
    pub fn new(tables: impl IntoIterator<Item = Table>) -> SnapshotResult<Self> {
        let mut map = BTreeMap::new();
        for mut table in tables {
            table.normalize()?;
            let key = table.name.to_lowercase();
            if map.contains_key(&key) {
                return Err(SnapshotError::DuplicateTable(table.name));
            }
            map.insert(key, table);
        }

        let mut snapshot = Self { tables: map };
        snapshot.resolve_references()?;
        Ok(snapshot)
    }

    /// Parse a JSON snapshot document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check every declared foreign key and rewrite it to canonical names.
    fn resolve_references(&mut self) -> SnapshotResult<()> {
        let mut resolved: Vec<(String, usize, ColumnRef)> = Vec::new();

        for (key, table) in &self.tables {
            for (idx, column) in table.columns.iter().enumerate() {
                let Some(reference) = &column.references else {
                    continue;
                };
                let target = self.table(&reference.table).ok_or_else(|| {
                    SnapshotError::UnknownReferenceTable {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        target_table: reference.table.clone(),
                    }
                })?;
                let target_column = target.get_column(&reference.column).ok_or_else(|| {
                    SnapshotError::UnknownReferenceColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        target_table: reference.table.clone(),
                        target_column: reference.column.clone(),
                    }
                })?;
                resolved.push((
                    key.clone(),
                    idx,
                    ColumnRef::new(target.name.clone(), target_column.name.clone()),
                ));
            }
        }

        for (key, idx, reference) in resolved {
            if let Some(table) = self.tables.get_mut(&key) {
                table.columns[idx].references = Some(reference);
            }
        }

        Ok(())
    }

    /// Look up a table case-insensitively.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    /// Look up a column case-insensitively.
    pub fn column(&self, table: &str, column: &str) -> Option<&Column> {
        self.table(table).and_then(|t| t.get_column(column))
    }

    /// Tables in sorted (lowercase name) order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the snapshot holds no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// All declared foreign keys as `(table, column, reference)`.
    pub fn declared_foreign_keys(&self) -> impl Iterator<Item = (&Table, &Column, &ColumnRef)> {
        self.tables().flat_map(|table| {
            table
                .columns
                .iter()
                .filter_map(move |c| c.references.as_ref().map(|r| (table, c, r)))
        })
    }
}
