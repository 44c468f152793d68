//! The sqlx-backed adapter.
//!
//! sqlx is async; [`SqliteAdapter`] owns a current-thread tokio runtime and
//! blocks on it for every call, so it must not be used from inside another
//! async runtime.
//!
//! Query results are streamed. A task on the adapter's runtime reads rows
//! from the driver into a bounded channel and [`StreamCursor`] drains it, so
//! at most [`CURSOR_BUFFER`] rows are held in memory at a time.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use oxide_record_core::{
    parse_default_literal, split_declared_type, Adapter, AdapterError, ColumnDescriptor, ColumnType, Dialect, EmptyString, Row, RowCursor, SqlValue, TableSchema,
};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use futures::TryStreamExt;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SqliteConfig;
use crate::dialect::SqliteDialect;

/// An [`Adapter`] for SQLite.
///
/// # Example
///
/// ```no_run
/// use oxide_record_core::{Adapter, SqlValue};
/// use oxide_record_sqlite::SqliteAdapter;
///
/// let adapter = SqliteAdapter::connect("sqlite::memory:").unwrap();
/// adapter
///     .execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", &[])
///     .unwrap();
/// adapter
///     .execute("INSERT INTO notes (body) VALUES (?)", &[SqlValue::Text("hi".into())])
///     .unwrap();
/// assert_eq!(adapter.last_insert_id().unwrap(), SqlValue::Int(1));
/// ```
pub struct SqliteAdapter {
    // Declared before the runtime so connections close first.
    pool: SqlitePool,
    runtime: Arc<Runtime>,
    dialect: SqliteDialect,
    empty_string: EmptyString,
    last_insert_id: Mutex<Option<i64>>,
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("pool_size", &self.pool.size())
            .field("empty_string", &self.empty_string)
            .finish_non_exhaustive()
    }
}

impl SqliteAdapter {
    /// Connects with default settings.
    pub fn connect(url: &str) -> Result<Self, AdapterError> {
        Self::from_config(&SqliteConfig::new(url))
    }

    /// Connects with the given settings. File databases are created when
    /// missing.
    pub fn from_config(config: &SqliteConfig) -> Result<Self, AdapterError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AdapterError::driver("starting the tokio runtime", e))?;

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AdapterError::driver(format!("parsing `{}`", config.url), e))?
            .create_if_missing(true);

        let pool_size = config.pool_size();
        let mut pool_options = SqlitePoolOptions::new().max_connections(pool_size);
        if config.is_memory() {
            // The database lives exactly as long as its only connection.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }
        let pool = runtime
            .block_on(pool_options.connect_with(options))
            .map_err(|e| AdapterError::driver(format!("connecting to `{}`", config.url), e))?;

        info!(url = %config.url, pool_size, "Connected to SQLite");
        Ok(Self {
            pool,
            runtime: Arc::new(runtime),
            dialect: SqliteDialect::new(),
            empty_string: config.empty_string.into(),
            last_insert_id: Mutex::new(None),
        })
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn unique_columns(&self, quoted_table: &str) -> Result<HashSet<String>, AdapterError> {
        let mut unique = HashSet::new();
        for index in self.fetch_all(&format!("PRAGMA index_list({quoted_table})"), &[])? {
            if index.get("unique").and_then(SqlValue::as_i64) != Some(1) {
                continue;
            }
            let Some(name) = index.get("name").and_then(SqlValue::as_str) else {
                continue;
            };
            let columns = self.fetch_all(
                &format!("PRAGMA index_info({})", self.dialect.quote_identifier(name)),
                &[],
            )?;
            if let [only] = columns.as_slice() {
                if let Some(column) = only.get("name").and_then(SqlValue::as_str) {
                    unique.insert(column.to_string());
                }
            }
        }
        Ok(unique)
    }
}

impl Adapter for SqliteAdapter {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, AdapterError> {
        debug!(sql = %sql, params = params.len(), "Executing SQL");
        let result = self
            .runtime
            .block_on(bind_params(sql, params).execute(&self.pool))
            .map_err(|e| AdapterError::driver(format!("executing `{sql}`"), e))?;

        if is_insert(sql) {
            *self
                .last_insert_id
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(result.last_insert_rowid());
        }
        Ok(result.rows_affected())
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn RowCursor>, AdapterError> {
        debug!(sql = %sql, params = params.len(), "Running query");
        let mut cursor = StreamCursor::spawn(
            Arc::clone(&self.runtime),
            self.pool.clone(),
            sql.to_string(),
            params.to_vec(),
        );
        // Statement errors surface here rather than on the first fetch.
        let first = cursor.receive()?;
        cursor.peeked = first;
        Ok(Box::new(cursor))
    }

    fn describe_table(&self, table: &str) -> Result<TableSchema, AdapterError> {
        let quoted = self.dialect.quote_identifier(table);
        let infos = self.fetch_all(&format!("PRAGMA table_info({quoted})"), &[])?;
        if infos.is_empty() {
            return Err(AdapterError::msg(format!("table `{table}` does not exist")));
        }
        let unique = self.unique_columns(&quoted)?;

        let mut schema = TableSchema::new();
        for info in infos {
            let name = info
                .get("name")
                .and_then(SqlValue::as_str)
                .ok_or_else(|| AdapterError::msg(format!("unnamed column in `{table}`")))?
                .to_string();
            let declared = info.get("type").and_then(SqlValue::as_str).unwrap_or("");
            let (column_type, size, scale) = column_type_for(declared);

            let mut column = ColumnDescriptor::new(name.as_str(), column_type);
            column.size = size;
            column.scale = scale;
            column.nullable = info.get("notnull").and_then(SqlValue::as_i64) != Some(1);
            column.unique = unique.contains(&name);
            column.default = info
                .get("dflt_value")
                .and_then(SqlValue::as_str)
                .and_then(|raw| parse_default_literal(raw, &column.column_type));
            column.db_default = info.get("dflt_value").is_some_and(|v| !v.is_null());
            if info.get("pk").and_then(SqlValue::as_i64).unwrap_or(0) > 0 {
                column = column.primary_key();
            }
            schema.insert(name, column);
        }
        debug!(table, columns = schema.len(), "Described table");
        Ok(schema)
    }

    fn last_insert_id(&self) -> Result<SqlValue, AdapterError> {
        Ok(self
            .last_insert_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map_or(SqlValue::Null, SqlValue::Int))
    }

    fn empty_string(&self) -> EmptyString {
        self.empty_string
    }
}

/// How many decoded rows a [`StreamCursor`] buffers ahead of the caller.
pub const CURSOR_BUFFER: usize = 64;

/// A [`RowCursor`] fed by a driver stream running on the adapter's runtime.
///
/// Dropping the cursor stops the stream and hands the connection back to
/// the pool.
pub struct StreamCursor {
    rows: mpsc::Receiver<Result<Row, AdapterError>>,
    task: JoinHandle<()>,
    peeked: Option<Row>,
    done: bool,
    runtime: Arc<Runtime>,
}

impl StreamCursor {
    fn spawn(runtime: Arc<Runtime>, pool: SqlitePool, sql: String, params: Vec<SqlValue>) -> Self {
        let (tx, rows) = mpsc::channel(CURSOR_BUFFER);
        let task = runtime.spawn(async move {
            let mut stream = bind_params(&sql, &params).fetch(&pool);
            loop {
                let item = match stream.try_next().await {
                    Ok(Some(row)) => decode_row(&row),
                    Ok(None) => break,
                    Err(e) => Err(AdapterError::driver(format!("running `{sql}`"), e)),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });
        Self {
            rows,
            task,
            peeked: None,
            done: false,
            runtime,
        }
    }

    fn receive(&mut self) -> Result<Option<Row>, AdapterError> {
        if self.done {
            return Ok(None);
        }
        match self.runtime.block_on(self.rows.recv()) {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => {
                self.done = true;
                Err(err)
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

impl RowCursor for StreamCursor {
    fn fetch(&mut self) -> Result<Option<Row>, AdapterError> {
        match self.peeked.take() {
            Some(row) => Ok(Some(row)),
            None => self.receive(),
        }
    }
}

impl Drop for StreamCursor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for StreamCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCursor")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

fn is_insert(sql: &str) -> bool {
    let sql = sql.trim_start();
    ["INSERT", "REPLACE"].iter().any(|keyword| {
        sql.get(..keyword.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword))
    })
}

fn bind_params<'q>(sql: &'q str, params: &'q [SqlValue]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, value| match value {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Bool(b) => query.bind(i64::from(*b)),
            SqlValue::Int(n) => query.bind(*n),
            SqlValue::Float(x) => query.bind(*x),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Blob(bytes) => query.bind(bytes.as_slice()),
        })
}

fn decode_row(row: &SqliteRow) -> Result<Row, AdapterError> {
    let mut decoded = Row::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_value(row, column.ordinal()).map_err(|e| {
            AdapterError::driver(format!("decoding column `{}`", column.name()), e)
        })?;
        decoded.insert(column.name().to_string(), value);
    }
    Ok(decoded)
}

/// Decodes by storage class, which SQLite tracks per value rather than per
/// column.
fn decode_value(row: &SqliteRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    Ok(match storage.as_str() {
        "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked(index)?),
        "REAL" => SqlValue::Float(row.try_get_unchecked(index)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked(index)?),
        _ => SqlValue::Text(row.try_get_unchecked(index)?),
    })
}

/// Maps a declared column type to a [`ColumnType`], falling back to
/// SQLite's type affinity rules for names it does not know.
#[must_use]
pub fn column_type_for(declared: &str) -> (ColumnType, Option<u32>, Option<u32>) {
    let (base, size, scale) = split_declared_type(declared);
    let column_type = match ColumnType::from_sql_name(base) {
        ColumnType::Other(name) => affinity(&name),
        known => known,
    };
    (column_type, size, scale)
}

fn affinity(name: &str) -> ColumnType {
    let name = name.to_ascii_uppercase();
    if name.contains("INT") {
        ColumnType::Integer
    } else if ["CHAR", "CLOB", "TEXT"].iter().any(|k| name.contains(k)) {
        ColumnType::Text
    } else if name.is_empty() || name.contains("BLOB") {
        ColumnType::Blob
    } else if ["REAL", "FLOA", "DOUB"].iter().any(|k| name.contains(k)) {
        ColumnType::Float
    } else {
        ColumnType::Decimal
    }
}
