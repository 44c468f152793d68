//! # oxide-record
//!
//! An active-record ORM on top of the [`Adapter`] contract from
//! `oxide-record-core`.
//!
//! This crate provides:
//! - [`Record`] with attribute storage, dirty tracking and a
//!   validate / save / delete lifecycle
//! - [`Relation`] declarations (`belongs_to`, `has_one`, `has_many`,
//!   `has_and_belongs_to_many`) resolved lazily and cached per record
//! - [`Query`], a lazy chainable SELECT builder
//! - [`SchemaRegistry`], memoized table introspection
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use oxide_record::{Model, ModelDef, Orm, ToSqlValue};
//! use oxide_record_sqlite::SqliteAdapter;
//!
//! struct User;
//!
//! impl Model for User {
//!     const NAME: &'static str = "User";
//!
//!     fn definition() -> ModelDef {
//!         ModelDef::new(Self::NAME).has_many("posts", "Post")
//!     }
//! }
//!
//! fn example() -> oxide_record::Result<()> {
//!     let orm = Orm::global();
//!     orm.set_default_adapter(Arc::new(SqliteAdapter::connect("sqlite:app.db")?));
//!
//!     let mut user = User::create(&orm, [("name", "Ann".to_sql_value())])?;
//!     user.set("age", 31)?;
//!     user.save()?;
//!
//!     let adults = User::select(&orm)?
//!         .filter("age >= ?", 18)
//!         .order_by("-age")
//!         .get_all()?;
//!
//!     let count = User::select(&orm)?.count()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Queries
//!
//! Queries are lazy. Builder methods consume and return the query; forks
//! are made with `clone()` (or [`Query::copy`]):
//!
//! ```ignore
//! let base = orm.select("User")?.filter("active = ?", true);
//! let newest = base.clone().order_by("-created_at").limit(5);
//! let total = base.count()?;
//! ```
//!
//! ## Relations
//!
//! ```ignore
//! let mut post = orm.find("Post", 7)?.expect("post 7");
//! let author = post.get("user")?.one();
//! let recent_comments = post.relation_query("comments")?.order_by("-id").limit(3).get_all()?;
//! ```

pub mod error;
pub mod model;
pub mod orm;
pub mod query;
pub mod record;
pub mod relation;
pub mod schema;
mod validation;

pub use error::{ConfigurationError, OrmError, Result, ValidationErrors};
pub use model::{default_table_name, join_table_name, key_column, Model, ModelDef};
pub use orm::Orm;
pub use query::{Direction, Iter, Materialize, OrderBy, Query, Records, Rows, Select, SelectRows};
pub use record::{Field, Record};
pub use relation::{Related, Relation, RelationKind};
pub use schema::{create_table_sql, SchemaRegistry};

pub use oxide_record_core::{
    Adapter, AdapterError, ColumnDescriptor, ColumnType, Dialect, EmptyString, Params, Row,
    RowCursor, SqlValue, TableSchema, ToSqlValue,
};
