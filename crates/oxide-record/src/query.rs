//! Lazy, chainable queries.
//!
//! A [`Query`] accumulates joins, filters, ordering and a window without
//! touching the database. SQL runs only in the terminal methods
//! ([`get_one`](Query::get_one), [`get_all`](Query::get_all),
//! [`count`](Query::count), [`exists`](Query::exists)) or when the query is
//! iterated.
//!
//! # Example
//!
//! ```ignore
//! let adults = orm
//!     .select("User")?
//!     .filter("age >= ?", 18)
//!     .order_by("-created_at")
//!     .limit(10);
//!
//! for user in &adults {
//!     let user = user?;
//!     println!("{}", user.attr("name").unwrap_or(&SqlValue::Null));
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use oxide_record_core::{Adapter, Params, Row, RowCursor, SqlValue, ToSqlValue};
use tracing::debug;

use crate::error::{OrmError, Result};
use crate::model::ModelDef;
use crate::orm::Orm;
use crate::record::Record;

/// Turns fetched rows into query results.
pub trait Materialize: Clone {
    /// The item type produced for each row.
    type Output;

    /// Converts one row.
    fn materialize(&self, row: Row) -> Result<Self::Output>;

    /// Runs once before the statement, while no cursor is open.
    fn prepare(&self) -> Result<()> {
        Ok(())
    }
}

/// Yields rows unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rows;

impl Materialize for Rows {
    type Output = Row;

    fn materialize(&self, row: Row) -> Result<Row> {
        Ok(row)
    }
}

/// Wraps rows into persisted [`Record`]s of one type.
#[derive(Clone)]
pub struct Records {
    orm: Orm,
    model: Arc<ModelDef>,
}

impl Records {
    pub(crate) fn new(orm: Orm, model: Arc<ModelDef>) -> Self {
        Self { orm, model }
    }
}

impl Materialize for Records {
    type Output = Record;

    fn prepare(&self) -> Result<()> {
        self.orm.schema(self.model.name()).map(drop)
    }

    fn materialize(&self, row: Row) -> Result<Record> {
        let schema = self.orm.schema(self.model.name())?;
        Ok(Record::from_row(
            self.orm.clone(),
            Arc::clone(&self.model),
            schema,
            row,
        ))
    }
}

/// A query producing [`Record`]s.
pub type Select = Query<Records>;

/// A query producing raw rows.
pub type SelectRows = Query<Rows>;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    expression: String,
    direction: Direction,
}

impl OrderBy {
    /// Parses `name`, `-name`, `name DESC` or `name ASC`.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if let Some(rest) = spec.strip_prefix('-') {
            return Self {
                expression: rest.trim().to_string(),
                direction: Direction::Desc,
            };
        }
        if let Some((expression, keyword)) = spec.rsplit_once(char::is_whitespace) {
            let direction = if keyword.eq_ignore_ascii_case("desc") {
                Some(Direction::Desc)
            } else if keyword.eq_ignore_ascii_case("asc") {
                Some(Direction::Asc)
            } else {
                None
            };
            if let Some(direction) = direction {
                return Self {
                    expression: expression.trim().to_string(),
                    direction,
                };
            }
        }
        Self {
            expression: spec.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn to_sql(&self, adapter: &dyn Adapter) -> String {
        let expression = if is_plain_identifier(&self.expression) {
            adapter.quote_identifier(&self.expression)
        } else {
            self.expression.clone()
        };
        let direction = match self.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        format!("{expression} {direction}")
    }
}

/// Column names, optionally table-qualified, are quoted; anything else is
/// passed through as an expression.
fn is_plain_identifier(expression: &str) -> bool {
    !expression.is_empty()
        && expression
            .split('.')
            .all(|part| {
                !part.is_empty()
                    && !part.starts_with(|c: char| c.is_ascii_digit())
                    && part.chars().all(|c| c.is_alphanumeric() || c == '_')
            })
}

#[derive(Debug, Clone)]
struct Predicate {
    sql: String,
    params: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
struct Join {
    table: String,
    on: String,
}

/// A lazy query over one table.
///
/// Every builder method consumes the query and returns it, so a query can be
/// forked with [`Clone`] and refined independently.
#[derive(Clone)]
pub struct Query<M: Materialize> {
    adapter: Arc<dyn Adapter>,
    table: String,
    joins: Vec<Join>,
    filters: Vec<Predicate>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    empty: bool,
    materializer: M,
}

impl<M: Materialize> fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.table)
            .field("joins", &self.joins)
            .field("filters", &self.filters)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("empty", &self.empty)
            .finish_non_exhaustive()
    }
}

impl<M: Materialize> Query<M> {
    pub(crate) fn new(adapter: Arc<dyn Adapter>, table: impl Into<String>, materializer: M) -> Self {
        Self {
            adapter,
            table: table.into(),
            joins: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            empty: false,
            materializer,
        }
    }

    /// Returns the base table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Quotes an identifier the way this query's adapter does.
    pub fn quote_identifier(&self, name: &str) -> String {
        self.adapter.quote_identifier(name)
    }

    /// Adds a WHERE condition. Each `?` in `template` is bound to the next
    /// parameter; conditions are combined with AND.
    ///
    /// ```ignore
    /// orm.select("User")?.filter("age >= ? AND name LIKE ?", (18, "A%"));
    /// ```
    #[must_use]
    pub fn filter(mut self, template: &str, params: impl Params) -> Self {
        self.filters.push(Predicate {
            sql: template.to_string(),
            params: params.into_params(),
        });
        self
    }

    /// Adds `column = ?` with the column quoted.
    #[must_use]
    pub fn filter_eq(self, column: &str, value: impl ToSqlValue) -> Self {
        let template = format!("{} = ?", self.adapter.quote_identifier(column));
        self.filter(&template, value.to_sql_value())
    }

    /// Adds an INNER JOIN. `on` is emitted verbatim.
    #[must_use]
    pub fn join(mut self, table: &str, on: &str) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            on: on.to_string(),
        });
        self
    }

    /// Adds an ordering term. See [`OrderBy::parse`] for the syntax.
    #[must_use]
    pub fn order_by(mut self, spec: &str) -> Self {
        self.order_by.push(OrderBy::parse(spec));
        self
    }

    /// Limits the number of rows returned.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` rows.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Marks the query as matching nothing. Terminals return without
    /// running any SQL.
    #[must_use]
    pub fn none(mut self) -> Self {
        self.empty = true;
        self
    }

    /// Returns whether the query was marked with [`Query::none`].
    pub fn is_none(&self) -> bool {
        self.empty
    }

    /// Returns a copy of the query, equivalent to [`Clone::clone`].
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Builds the SELECT statement and its parameters.
    pub fn build_select(&self) -> Result<(String, Vec<SqlValue>)> {
        let mut sql = format!(
            "SELECT {}.* FROM {}",
            self.adapter.quote_identifier(&self.table),
            self.adapter.quote_identifier(&self.table)
        );
        let params = self.push_joins_and_where(&mut sql)?;

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|term| term.to_sql(self.adapter.as_ref()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite and MySQL reject OFFSET without LIMIT.
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        Ok((sql, params))
    }

    /// Builds the COUNT statement: same joins and filters, no ordering or
    /// window.
    pub fn build_count(&self) -> Result<(String, Vec<SqlValue>)> {
        let mut sql = format!(
            "SELECT COUNT(*) FROM {}",
            self.adapter.quote_identifier(&self.table)
        );
        let params = self.push_joins_and_where(&mut sql)?;
        Ok((sql, params))
    }

    fn push_joins_and_where(&self, sql: &mut String) -> Result<Vec<SqlValue>> {
        for join in &self.joins {
            sql.push_str(&format!(
                " INNER JOIN {} ON {}",
                self.adapter.quote_identifier(&join.table),
                join.on
            ));
        }

        let mut params = Vec::new();
        if self.filters.is_empty() {
            return Ok(params);
        }

        let wrap = self.filters.len() > 1;
        let mut conditions = Vec::with_capacity(self.filters.len());
        for predicate in &self.filters {
            let placeholders = predicate.sql.matches('?').count();
            if placeholders != predicate.params.len() {
                return Err(OrmError::Query(format!(
                    "`{}` has {placeholders} placeholder(s) but {} parameter(s) were given",
                    predicate.sql,
                    predicate.params.len()
                )));
            }
            params.extend(predicate.params.iter().cloned());
            if wrap {
                conditions.push(format!("({})", predicate.sql));
            } else {
                conditions.push(predicate.sql.clone());
            }
        }
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
        Ok(params)
    }

    /// Returns the first match. Adds `LIMIT 1` unless a limit is set.
    pub fn get_one(&self) -> Result<Option<M::Output>> {
        if self.empty {
            return Ok(None);
        }
        let query = if self.limit.is_some() {
            self.clone()
        } else {
            self.clone().limit(1)
        };
        query.iter().next().transpose()
    }

    /// Returns every match.
    pub fn get_all(&self) -> Result<Vec<M::Output>> {
        self.iter().collect()
    }

    /// Counts the matching rows.
    pub fn count(&self) -> Result<u64> {
        if self.empty {
            return Ok(0);
        }
        let (sql, params) = self.build_count()?;
        debug!(sql = %sql, params = params.len(), "Executing count");
        let value = self.adapter.fetch_scalar(&sql, &params)?;
        value
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| OrmError::Query(format!("COUNT(*) returned {value}")))
    }

    /// Returns whether at least one row matches.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Returns a lazy iterator over the matches. The statement runs on the
    /// first call to `next`.
    pub fn iter(&self) -> Iter<M> {
        let statement = if self.empty {
            None
        } else {
            Some(self.build_select())
        };
        Iter {
            adapter: Arc::clone(&self.adapter),
            statement,
            cursor: None,
            materializer: self.materializer.clone(),
            done: false,
        }
    }
}

impl<M: Materialize> IntoIterator for Query<M> {
    type Item = Result<M::Output>;
    type IntoIter = Iter<M>;

    fn into_iter(self) -> Iter<M> {
        self.iter()
    }
}

impl<M: Materialize> IntoIterator for &Query<M> {
    type Item = Result<M::Output>;
    type IntoIter = Iter<M>;

    fn into_iter(self) -> Iter<M> {
        self.iter()
    }
}

/// Iterator returned by [`Query::iter`].
///
/// Pulls one row at a time from the adapter's cursor. After the first error
/// the iterator is fused.
pub struct Iter<M: Materialize> {
    adapter: Arc<dyn Adapter>,
    statement: Option<Result<(String, Vec<SqlValue>)>>,
    cursor: Option<Box<dyn RowCursor>>,
    materializer: M,
    done: bool,
}

impl<M: Materialize> Iter<M> {
    fn fail(&mut self, err: OrmError) -> Option<Result<M::Output>> {
        self.done = true;
        self.cursor = None;
        Some(Err(err))
    }
}

impl<M: Materialize> Iterator for Iter<M> {
    type Item = Result<M::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.cursor.is_none() {
            let Some(statement) = self.statement.take() else {
                self.done = true;
                return None;
            };
            let (sql, params) = match statement {
                Ok(statement) => statement,
                Err(err) => return self.fail(err),
            };
            // A cursor may hold the adapter's only connection.
            if let Err(err) = self.materializer.prepare() {
                return self.fail(err);
            }
            debug!(sql = %sql, params = params.len(), "Executing query");
            match self.adapter.query(&sql, &params) {
                Ok(cursor) => self.cursor = Some(cursor),
                Err(err) => return self.fail(err.into()),
            }
        }

        let fetched = self.cursor.as_mut()?.fetch();
        match fetched {
            Ok(Some(row)) => match self.materializer.materialize(row) {
                Ok(item) => Some(Ok(item)),
                Err(err) => self.fail(err),
            },
            Ok(None) => {
                self.done = true;
                self.cursor = None;
                None
            }
            Err(err) => self.fail(err.into()),
        }
    }
}

impl<M: Materialize> std::iter::FusedIterator for Iter<M> {}
