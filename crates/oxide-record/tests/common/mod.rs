#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use oxide_record::{
    Adapter, AdapterError, ColumnDescriptor, ColumnType, Dialect, EmptyString, ModelDef, Orm,
    Relation, Row, RowCursor, SqlValue, TableSchema,
};
use oxide_record_core::{table_schema, BufferedCursor, GenericDialect};

/// An adapter that records every statement and answers queries from a
/// script of result sets.
#[derive(Default)]
pub struct MockAdapter {
    log: Mutex<Vec<(String, Vec<SqlValue>)>>,
    results: Mutex<VecDeque<Vec<Row>>>,
    schemas: HashMap<String, TableSchema>,
    describes: Mutex<Vec<String>>,
    next_id: Mutex<i64>,
    last_id: Mutex<Option<i64>>,
    empty: EmptyString,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty_string_policy(mut self, policy: EmptyString) -> Self {
        self.empty = policy;
        self
    }

    pub fn table(mut self, name: &str, columns: impl IntoIterator<Item = ColumnDescriptor>) -> Self {
        self.schemas.insert(name.to_string(), table_schema(columns));
        self
    }

    /// Queues the rows returned by the next `query` call.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.results.lock().unwrap().push_back(rows);
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn last(&self) -> (String, Vec<SqlValue>) {
        self.log.lock().unwrap().last().cloned().expect("no statement ran")
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn describe_calls(&self) -> Vec<String> {
        self.describes.lock().unwrap().clone()
    }
}

impl Adapter for MockAdapter {
    fn dialect(&self) -> &dyn Dialect {
        &GenericDialect
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, AdapterError> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        if sql.starts_with("INSERT") {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *self.last_id.lock().unwrap() = Some(*next);
        }
        Ok(1)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Box<dyn RowCursor>, AdapterError> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        let rows = self.results.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(BufferedCursor::new(rows)))
    }

    fn describe_table(&self, table: &str) -> Result<TableSchema, AdapterError> {
        self.describes.lock().unwrap().push(table.to_string());
        self.schemas
            .get(table)
            .cloned()
            .ok_or_else(|| AdapterError::msg(format!("no such table: {table}")))
    }

    fn last_insert_id(&self) -> Result<SqlValue, AdapterError> {
        Ok(self
            .last_id
            .lock()
            .unwrap()
            .map_or(SqlValue::Null, SqlValue::Int))
    }

    fn empty_string(&self) -> EmptyString {
        self.empty
    }
}

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

pub fn row(pairs: &[(&str, SqlValue)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

pub fn count_row(n: i64) -> Row {
    row(&[("COUNT(*)", SqlValue::Int(n))])
}

/// A blog schema: users with posts, a profile and groups.
pub fn blog_adapter() -> MockAdapter {
    MockAdapter::new()
        .table(
            "users",
            [
                ColumnDescriptor::id(),
                ColumnDescriptor::new("name", ColumnType::String)
                    .size(20)
                    .not_null(),
                ColumnDescriptor::new("email", ColumnType::String).size(50),
                ColumnDescriptor::new("age", ColumnType::Integer),
                ColumnDescriptor::new("active", ColumnType::Boolean)
                    .default_value(SqlValue::Int(1)),
                ColumnDescriptor::new("created_at", ColumnType::DateTime),
            ],
        )
        .table(
            "posts",
            [
                ColumnDescriptor::id(),
                ColumnDescriptor::new("user_id", ColumnType::Integer),
                ColumnDescriptor::new("title", ColumnType::String)
                    .size(100)
                    .not_null(),
                ColumnDescriptor::new("body", ColumnType::Text),
            ],
        )
        .table(
            "profiles",
            [
                ColumnDescriptor::id(),
                ColumnDescriptor::new("user_id", ColumnType::Integer),
                ColumnDescriptor::new("bio", ColumnType::Text),
            ],
        )
        .table(
            "groups",
            [
                ColumnDescriptor::id(),
                ColumnDescriptor::new("name", ColumnType::String).size(30),
            ],
        )
}

pub fn register_blog(orm: &Orm) {
    orm.register(
        ModelDef::new("User")
            .with("posts", Relation::has_many("Post").order_by("-id"))
            .has_one("profile", "Profile")
            .has_and_belongs_to_many("groups", "Group"),
    );
    orm.register(ModelDef::new("Post").belongs_to("user", "User"));
    orm.register(ModelDef::new("Profile").belongs_to("user", "User"));
    orm.register(ModelDef::new("Group").has_and_belongs_to_many("users", "User"));
}

pub fn setup() -> (Orm, Arc<MockAdapter>) {
    setup_with(blog_adapter())
}

pub fn setup_with(adapter: MockAdapter) -> (Orm, Arc<MockAdapter>) {
    let adapter = Arc::new(adapter);
    let orm = Orm::new();
    orm.set_default_adapter(adapter.clone());
    register_blog(&orm);
    (orm, adapter)
}
