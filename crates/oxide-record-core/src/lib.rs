//! # oxide-record-core
//!
//! The pieces of oxide-record that drivers implement against:
//!
//! - [`SqlValue`] and [`ToSqlValue`] for values and bound parameters
//! - [`Dialect`] for identifier quoting
//! - [`Adapter`] and [`RowCursor`], the execution contract
//! - [`ColumnDescriptor`] and [`TableSchema`], the result of introspection
//!
//! A driver crate (such as `oxide-record-sqlite`) implements [`Adapter`];
//! the ORM in `oxide-record` only ever calls through it.
//!
//! ## SQL Injection Prevention
//!
//! Values are bound, never interpolated, and literal quoting escapes single
//! quotes:
//!
//! ```rust
//! use oxide_record_core::SqlValue;
//!
//! let value = SqlValue::Text(String::from("'; DROP TABLE users; --"));
//! assert_eq!(value.to_sql_inline(), "'''; DROP TABLE users; --'");
//! ```

pub mod adapter;
pub mod column;
pub mod dialect;
pub mod value;

pub use adapter::{Adapter, AdapterError, BufferedCursor, RowCursor};
pub use column::{
    parse_default_literal, split_declared_type, table_schema, ColumnDescriptor, ColumnType,
    TableSchema,
};
pub use dialect::{Dialect, GenericDialect};
pub use value::{EmptyString, Params, Row, SqlValue, ToSqlValue};
