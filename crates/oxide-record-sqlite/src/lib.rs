//! # oxide-record-sqlite
//!
//! SQLite adapter for `oxide-record`, built on [sqlx].
//!
//! # How SQLite differs from other backends
//!
//! - **[Type affinity]**: any column can hold any value. Values are decoded
//!   by their storage class, and declared types the ORM does not know map
//!   to an affinity via [`column_type_for`].
//! - **Introspection**: `PRAGMA table_info` reports columns, and unique
//!   constraints are read from single-column unique indexes.
//! - **[AUTOINCREMENT]**: integer primary keys created through
//!   `create_table_sql` use `AUTOINCREMENT` so deleted ids are never
//!   handed out again.
//! - **In-memory databases** exist per connection, so the pool is pinned
//!   to a single long-lived connection for `:memory:` URLs.
//!
//! [sqlx]: https://docs.rs/sqlx
//! [Type affinity]: https://www.sqlite.org/datatype3.html
//! [AUTOINCREMENT]: https://www.sqlite.org/autoinc.html
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use oxide_record::Orm;
//! use oxide_record_sqlite::{EmptyStringPolicy, SqliteConfig};
//!
//! let adapter = SqliteConfig::new("sqlite:app.db")
//!     .empty_string(EmptyStringPolicy::Null)
//!     .connect()
//!     .unwrap();
//! Orm::global().set_default_adapter(Arc::new(adapter));
//! ```

pub mod adapter;
pub mod config;
pub mod dialect;

pub use adapter::{column_type_for, SqliteAdapter, StreamCursor, CURSOR_BUFFER};
pub use config::{ConfigError, EmptyStringPolicy, SqliteConfig, DATABASE_URL};
pub use dialect::SqliteDialect;
