//! The contract between the ORM and a database driver.
//!
//! Everything that talks to a live database goes through [`Adapter`]. The
//! ORM never opens connections, escapes literals or reads catalog tables
//! itself.

use std::collections::VecDeque;
use std::error::Error as StdError;

use thiserror::Error;

use crate::column::TableSchema;
use crate::dialect::Dialect;
use crate::value::{EmptyString, Row, SqlValue};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A failure reported by the execution layer.
///
/// The ORM propagates these unchanged and never retries.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The driver returned an error.
    #[error("{context}: {source}")]
    Driver {
        /// What the adapter was doing.
        context: String,
        /// The driver error.
        #[source]
        source: BoxError,
    },

    /// The adapter could not produce a result it promised.
    #[error("{0}")]
    Message(String),
}

impl AdapterError {
    /// Wraps a driver error with a short description of the operation.
    pub fn driver(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Driver {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Creates an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// A forward-only cursor over the rows of one statement.
pub trait RowCursor: Send {
    /// Returns the next row, or `None` once the result set is exhausted.
    fn fetch(&mut self) -> Result<Option<Row>, AdapterError>;
}

/// A cursor over rows that were already read from the driver.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: VecDeque<Row>,
}

impl BufferedCursor {
    /// Creates a cursor yielding `rows` in order.
    pub fn new(rows: impl IntoIterator<Item = Row>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }
}

impl RowCursor for BufferedCursor {
    fn fetch(&mut self) -> Result<Option<Row>, AdapterError> {
        Ok(self.rows.pop_front())
    }
}

/// A synchronous database adapter.
///
/// Statements use `?` placeholders; `params` are bound in order.
///
/// # Example
///
/// ```ignore
/// let rows = adapter.fetch_all("SELECT * FROM \"users\" WHERE \"age\" >= ?", &[18.into()])?;
/// ```
pub trait Adapter: Send + Sync {
    /// Returns the quoting rules of this database.
    fn dialect(&self) -> &dyn Dialect;

    /// Runs a statement that returns no rows; returns the affected row count.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, AdapterError>;

    /// Runs a statement and returns a cursor over its rows.
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn RowCursor>, AdapterError>;

    /// Reads the column metadata of `table`.
    fn describe_table(&self, table: &str) -> Result<TableSchema, AdapterError>;

    /// Returns the id generated by the last INSERT on this adapter.
    fn last_insert_id(&self) -> Result<SqlValue, AdapterError>;

    /// Returns how empty strings are written.
    fn empty_string(&self) -> EmptyString {
        EmptyString::Keep
    }

    /// Returns the first row of a statement.
    fn fetch_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>, AdapterError> {
        self.query(sql, params)?.fetch()
    }

    /// Returns every row of a statement.
    fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, AdapterError> {
        let mut cursor = self.query(sql, params)?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.fetch()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Returns the first column of the first row, or NULL when there is none.
    fn fetch_scalar(&self, sql: &str, params: &[SqlValue]) -> Result<SqlValue, AdapterError> {
        Ok(self
            .fetch_row(sql, params)?
            .and_then(|row| row.into_iter().next().map(|(_, value)| value))
            .unwrap_or(SqlValue::Null))
    }

    /// Renders a value as a SQL literal, honouring [`Adapter::empty_string`].
    fn quote(&self, value: &SqlValue) -> String {
        self.empty_string().apply(value.clone()).to_sql_inline()
    }

    /// Quotes a (possibly table-qualified) identifier.
    fn quote_identifier(&self, name: &str) -> String {
        self.dialect().quote_qualified(name)
    }
}
