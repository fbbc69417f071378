//! Column type categories.
//!
//! Declared SQL types are normalized into a small set of categories. The
//! detection components never look at the raw type string again, only at the
//! category, so a `bigint` FK pointing at an `integer` PK compares cleanly.

use serde::{Deserialize, Serialize};

/// Normalized category of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Integer,
    Decimal,
    Text,
    Timestamp,
    Boolean,
    #[default]
    Other,
}

impl TypeCategory {
    /// Parse a declared SQL type into its category.
    ///
    /// Supports the common spellings across Postgres, MySQL, SQL Server,
    /// SQLite and DuckDB:
    /// - `smallint`, `int`, `integer`, `bigint`, `serial`, `int4`, ...
    /// - `decimal(p,s)`, `numeric(p,s)`, `real`, `double precision`, `money`
    /// - `text`, `varchar(n)`, `char(n)`, `nvarchar(n)`, `uuid`, `citext`
    /// - `date`, `time`, `timestamp`, `timestamptz`, `datetime2`
    /// - `bool`, `boolean`, `bit`
    ///
    /// Anything else (json, blobs, arrays, user-defined types) is `Other`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use relscout::model::TypeCategory;
    ///
    /// assert_eq!(TypeCategory::parse("BIGINT"), TypeCategory::Integer);
    /// assert_eq!(TypeCategory::parse("varchar(255)"), TypeCategory::Text);
    /// assert_eq!(TypeCategory::parse("numeric(10, 2)"), TypeCategory::Decimal);
    /// ```
    pub fn parse(declared: &str) -> Self {
        let lower = declared.trim().to_lowercase();

        // Strip length/precision parameters and array markers
        let base = match lower.find('(') {
            Some(idx) => lower[..idx].trim_end(),
            None => lower.as_str(),
        };
        let base = base.trim_end_matches("[]").trim();

        // "unsigned", "identity" and friends don't change the category
        let base = base
            .strip_suffix(" unsigned")
            .or_else(|| base.strip_suffix(" identity"))
            .unwrap_or(base);

        match base {
            "bool" | "boolean" | "bit" => Self::Boolean,

            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2"
            | "int4" | "int8" | "int16" | "int32" | "int64" | "serial" | "smallserial"
            | "bigserial" | "hugeint" | "ubigint" | "uinteger" => Self::Integer,

            "decimal" | "numeric" | "number" | "real" | "float" | "float4" | "float8"
            | "float32" | "float64" | "double" | "double precision" | "money"
            | "smallmoney" => Self::Decimal,

            "text" | "string" | "varchar" | "nvarchar" | "char" | "nchar" | "character"
            | "character varying" | "bpchar" | "clob" | "ntext" | "citext" | "uuid" | "guid"
            | "uniqueidentifier" | "tinytext" | "mediumtext" | "longtext" => Self::Text,

            "date" | "time" | "timetz" | "timestamp" | "timestamptz" | "datetime"
            | "datetime2" | "smalldatetime" | "datetimeoffset" => Self::Timestamp,

            _ if base.starts_with("timestamp") || base.starts_with("time with") => {
                Self::Timestamp
            }

            _ => Self::Other,
        }
    }

    /// Whether values of these two categories can sensibly be compared for a
    /// key relationship.
    pub fn is_compatible_with(self, other: TypeCategory) -> bool {
        use TypeCategory::*;

        match (self, other) {
            (a, b) if a == b => true,
            (Integer, Decimal) | (Decimal, Integer) => true,
            // Unknown types only conflict with the strongly-shaped categories
            (Other, Boolean) | (Boolean, Other) => false,
            (Other, Timestamp) | (Timestamp, Other) => false,
            (Other, _) | (_, Other) => true,
            _ => false,
        }
    }

    /// Short lowercase label, used in evidence strings and reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Boolean => "boolean",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
