//! Error types for the ORM.

use std::fmt;

use indexmap::IndexMap;
use oxide_record_core::AdapterError;
use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// One or more columns failed validation; nothing was written.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The adapter failed.
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// The ORM is not set up to handle the request.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The name is neither a column nor a writable attribute of the record.
    #[error("unknown field `{field}` on `{model}`")]
    UnknownField {
        /// Model name.
        model: String,
        /// Requested field.
        field: String,
    },

    /// The model declares no relation with this name.
    #[error("unknown relation `{relation}` on `{model}`")]
    UnknownRelation {
        /// Model name.
        model: String,
        /// Requested relation.
        relation: String,
    },

    /// The query could not be compiled.
    #[error("query error: {0}")]
    Query(String),
}

/// Setup problems that cannot be recovered from at runtime.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Neither a per-model nor a default adapter is registered.
    #[error("no adapter registered for `{0}` and no default adapter set")]
    NoAdapter(String),

    /// The model name was never registered.
    #[error("model `{0}` is not registered")]
    UnknownModel(String),

    /// A column type that cannot be validated or created.
    #[error("column `{table}.{column}` has unsupported type `{column_type}`")]
    UnknownColumnType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// The type as reported by the database.
        column_type: String,
    },
}

/// Column name to failure reason, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(IndexMap<String, String>);

impl ValidationErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `column`, keeping the first reason.
    pub fn add(&mut self, column: impl Into<String>, reason: impl Into<String>) {
        self.0.entry(column.into()).or_insert_with(|| reason.into());
    }

    /// Returns the reason recorded for `column`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Returns whether `column` failed.
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Returns whether no column failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of failing columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterates over `(column, reason)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(column, reason)| format!("{column}: {reason}"))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
