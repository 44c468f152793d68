//! Column metadata returned by [`crate::Adapter::describe_table`].

use std::fmt;

use indexmap::IndexMap;

use crate::value::SqlValue;

/// The columns of one table, in declaration order.
pub type TableSchema = IndexMap<String, ColumnDescriptor>;

/// Logical column types the ORM knows how to validate and create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Bounded character string (`VARCHAR`, `CHAR`).
    String,
    /// Unbounded text.
    Text,
    /// Integer of any width.
    Integer,
    /// Exact decimal.
    Decimal,
    /// Floating point.
    Float,
    /// Boolean, stored as 0/1.
    Boolean,
    /// `YYYY-MM-DD`.
    Date,
    /// `HH:MM:SS`.
    Time,
    /// `YYYY-MM-DD HH:MM:SS`.
    DateTime,
    /// Binary data.
    Blob,
    /// A type this crate does not understand, kept verbatim.
    Other(String),
}

impl ColumnType {
    /// Maps a bare SQL type name (no size suffix) to a column type.
    #[must_use]
    pub fn from_sql_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "VARCHAR" | "CHAR" | "CHARACTER" | "NVARCHAR" | "NCHAR" | "CHARACTER VARYING" => {
                Self::String
            }
            "TEXT" | "CLOB" => Self::Text,
            "INT" | "INTEGER" | "SMALLINT" | "BIGINT" | "TINYINT" | "MEDIUMINT" => Self::Integer,
            "DECIMAL" | "NUMERIC" => Self::Decimal,
            "REAL" | "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" => Self::Float,
            "BOOLEAN" | "BOOL" => Self::Boolean,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" | "TIMESTAMP" => Self::DateTime,
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" => Self::Blob,
            other => Self::Other(String::from(other)),
        }
    }

    /// Returns the SQL type name used in `CREATE TABLE`, or `None` for
    /// [`ColumnType::Other`].
    #[must_use]
    pub const fn sql_name(&self) -> Option<&'static str> {
        match self {
            Self::String => Some("VARCHAR"),
            Self::Text => Some("TEXT"),
            Self::Integer => Some("INTEGER"),
            Self::Decimal => Some("DECIMAL"),
            Self::Float => Some("REAL"),
            Self::Boolean => Some("BOOLEAN"),
            Self::Date => Some("DATE"),
            Self::Time => Some("TIME"),
            Self::DateTime => Some("DATETIME"),
            Self::Blob => Some("BLOB"),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(name) => f.write_str(name),
            known => f.write_str(known.sql_name().unwrap_or_default()),
        }
    }
}

/// Metadata for a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Logical type.
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Maximum length for strings, precision for decimals.
    pub size: Option<u32>,
    /// Digits after the decimal point.
    pub scale: Option<u32>,
    /// Whether a unique constraint covers exactly this column.
    pub unique: bool,
    /// Whether this column is the primary key.
    pub primary_key: bool,
    /// Literal default, already converted to a value.
    pub default: Option<SqlValue>,
    /// Whether the database fills the column when an INSERT omits it, even
    /// if the default is an expression with no literal value.
    pub db_default: bool,
}

impl ColumnDescriptor {
    /// Creates a nullable column with no size, default or constraints.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            size: None,
            scale: None,
            unique: false,
            primary_key: false,
            default: None,
            db_default: false,
        }
    }

    /// Shorthand for the conventional `id INTEGER PRIMARY KEY` column.
    pub fn id() -> Self {
        Self::new("id", ColumnType::Integer).primary_key()
    }

    /// Sets the maximum length (or decimal precision).
    #[must_use]
    pub const fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the decimal scale.
    #[must_use]
    pub const fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the column as the primary key (implies NOT NULL).
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Sets the literal default.
    #[must_use]
    pub fn default_value(mut self, value: SqlValue) -> Self {
        self.default = Some(value);
        self.db_default = true;
        self
    }

    /// Marks the column as filled by a database-side default expression.
    #[must_use]
    pub const fn db_default(mut self) -> Self {
        self.db_default = true;
        self
    }
}

/// Collects descriptors into a [`TableSchema`] keyed by column name.
pub fn table_schema(columns: impl IntoIterator<Item = ColumnDescriptor>) -> TableSchema {
    columns
        .into_iter()
        .map(|column| (column.name.clone(), column))
        .collect()
}

/// Splits a declared type such as `VARCHAR(50)` or `DECIMAL(10, 2)` into
/// its base name and numeric arguments.
#[must_use]
pub fn split_declared_type(declared: &str) -> (&str, Option<u32>, Option<u32>) {
    let declared = declared.trim();
    let Some(open) = declared.find('(') else {
        return (declared, None, None);
    };
    let base = declared[..open].trim();
    let args = declared[open + 1..].trim_end_matches(')');
    let mut numbers = args.split(',').map(|part| part.trim().parse::<u32>().ok());
    let size = numbers.next().flatten();
    let scale = numbers.next().flatten();
    (base, size, scale)
}

/// Converts a raw default clause as reported by the database into a value.
///
/// Returns `None` for NULL and for expressions such as `CURRENT_TIMESTAMP`,
/// which are left for the database to evaluate.
#[must_use]
pub fn parse_default_literal(raw: &str, column_type: &ColumnType) -> Option<SqlValue> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("NULL") {
        return None;
    }

    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        let inner = raw[1..raw.len() - 1].replace("''", "'");
        return Some(SqlValue::Text(inner));
    }

    if raw.eq_ignore_ascii_case("TRUE") {
        return Some(SqlValue::Int(1));
    }
    if raw.eq_ignore_ascii_case("FALSE") {
        return Some(SqlValue::Int(0));
    }

    if matches!(column_type, ColumnType::String | ColumnType::Text) {
        return raw
            .parse::<f64>()
            .is_ok()
            .then(|| SqlValue::Text(String::from(raw)));
    }

    if let Ok(n) = raw.parse::<i64>() {
        return Some(SqlValue::Int(n));
    }
    if let Ok(x) = raw.parse::<f64>() {
        return Some(SqlValue::Float(x));
    }

    None
}
