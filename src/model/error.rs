//! Structural validation errors for schema snapshots.

use thiserror::Error;

/// Result type for snapshot construction.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// A snapshot that references tables or columns inconsistently.
///
/// These are the only errors that abort a detection run: everything
/// downstream assumes every name it sees resolves in the snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("table name must not be empty")]
    EmptyTableName,

    #[error("table '{table}' has a column with an empty name")]
    EmptyColumnName { table: String },

    #[error("duplicate table '{0}'")]
    DuplicateTable(String),

    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("primary key of '{table}' names unknown column '{column}'")]
    UnknownPrimaryKeyColumn { table: String, column: String },

    #[error("foreign key {table}.{column} references unknown table '{target_table}'")]
    UnknownReferenceTable {
        table: String,
        column: String,
        target_table: String,
    },

    #[error(
        "foreign key {table}.{column} references unknown column '{target_table}.{target_column}'"
    )]
    UnknownReferenceColumn {
        table: String,
        column: String,
        target_table: String,
        target_column: String,
    },
}
