mod common;

use std::sync::Arc;

use common::{memory_adapter, run, text};
use oxide_record::{
    create_table_sql, Adapter, ColumnDescriptor, ColumnType, Model, ModelDef, Orm, OrmError,
    Relation, SqlValue, ToSqlValue,
};
use oxide_record_core::table_schema;
use oxide_record_sqlite::{EmptyStringPolicy, SqliteAdapter, SqliteConfig};

struct User;

impl Model for User {
    const NAME: &'static str = "User";

    fn definition() -> ModelDef {
        ModelDef::new(Self::NAME)
            .with("posts", Relation::has_many("Post").order_by("-id"))
            .has_and_belongs_to_many("groups", "Group")
    }
}

struct Post;

impl Model for Post {
    const NAME: &'static str = "Post";

    fn definition() -> ModelDef {
        ModelDef::new(Self::NAME).belongs_to("user", "User")
    }
}

struct Group;

struct Event;

impl Model for Event {
    const NAME: &'static str = "Event";

    fn definition() -> ModelDef {
        ModelDef::new(Self::NAME)
    }
}

impl Model for Group {
    const NAME: &'static str = "Group";

    fn definition() -> ModelDef {
        ModelDef::new(Self::NAME).has_and_belongs_to_many("users", "User")
    }
}

fn create_tables(adapter: &SqliteAdapter) {
    let users = table_schema([
        ColumnDescriptor::id(),
        ColumnDescriptor::new("name", ColumnType::String)
            .size(20)
            .not_null(),
        ColumnDescriptor::new("email", ColumnType::String).size(50).unique(),
        ColumnDescriptor::new("age", ColumnType::Integer),
        ColumnDescriptor::new("active", ColumnType::Boolean).default_value(SqlValue::Int(1)),
    ]);
    let posts = table_schema([
        ColumnDescriptor::id(),
        ColumnDescriptor::new("user_id", ColumnType::Integer),
        ColumnDescriptor::new("title", ColumnType::String)
            .size(100)
            .not_null(),
    ]);
    let groups = table_schema([
        ColumnDescriptor::id(),
        ColumnDescriptor::new("name", ColumnType::String).size(30),
    ]);
    for (table, columns) in [("users", users), ("posts", posts), ("groups", groups)] {
        let sql = create_table_sql(adapter, table, &columns).unwrap();
        run(adapter, &sql);
    }
    run(adapter, "CREATE TABLE groups_users (group_id INTEGER, user_id INTEGER)");
}

fn setup_with(adapter: SqliteAdapter) -> Orm {
    create_tables(&adapter);
    let orm = Orm::new();
    orm.set_default_adapter(Arc::new(adapter));
    orm
}

fn setup() -> Orm {
    setup_with(memory_adapter())
}

fn user(orm: &Orm, name: &str, age: i64) -> oxide_record::Record {
    let mut user = User::create(
        orm,
        [("name", name.to_sql_value()), ("age", age.to_sql_value())],
    )
    .unwrap();
    user.save().unwrap();
    user
}

#[test]
fn test_record_lifecycle() {
    let orm = setup();

    let mut ann = User::create(&orm, [("name", text("Ann"))]).unwrap();
    assert!(ann.is_new());
    assert_eq!(ann.attr("active"), Some(&SqlValue::Int(1)));
    ann.save().unwrap();
    assert_eq!(ann.id(), &SqlValue::Int(1));
    assert!(!ann.has_changes());

    ann.set("age", 31).unwrap();
    ann.set("email", "ann@example.com").unwrap();
    ann.save().unwrap();

    let mut loaded = User::find(&orm, 1).unwrap().unwrap();
    assert_eq!(loaded.attr("age"), Some(&SqlValue::Int(31)));
    assert_eq!(loaded.attr("email"), Some(&text("ann@example.com")));
    assert_eq!(loaded.attr("active"), Some(&SqlValue::Int(1)));
    assert!(!loaded.has_changes());

    assert!(loaded.delete().unwrap());
    assert!(loaded.is_new());
    assert!(User::find(&orm, 1).unwrap().is_none());

    // Re-saving a deleted record inserts it under a fresh id.
    loaded.save().unwrap();
    assert_eq!(loaded.id(), &SqlValue::Int(2));
    assert_eq!(User::select(&orm).unwrap().count().unwrap(), 1);
}

#[test]
fn test_validation_blocks_the_write() {
    let orm = setup();

    let mut user = User::create(&orm, [("name", text("A name well over twenty characters"))])
        .unwrap();
    user.set("age", "thirty").unwrap();

    let err = user.save().unwrap_err();
    let OrmError::Validation(errors) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(errors.get("name"), Some("may not be longer than 20 characters"));
    assert_eq!(errors.get("age"), Some("must be an integer"));
    assert!(user.is_new());
    assert_eq!(User::select(&orm).unwrap().count().unwrap(), 0);

    user.set("name", "Bo").unwrap();
    user.set("age", "30").unwrap();
    user.save().unwrap();
    assert!(user.errors().is_empty());
    assert_eq!(
        User::find(&orm, user.id().clone()).unwrap().unwrap().attr("age"),
        Some(&SqlValue::Int(30))
    );
}

#[test]
fn test_database_errors_propagate() {
    let orm = setup();
    let mut first = User::create(&orm, [("name", text("A")), ("email", text("same@x"))]).unwrap();
    first.save().unwrap();

    let mut second = User::create(&orm, [("name", text("B")), ("email", text("same@x"))]).unwrap();
    assert!(matches!(second.save(), Err(OrmError::Adapter(_))));
    assert!(second.is_new());
}

#[test]
fn test_query_builder_against_sqlite() {
    let orm = setup();
    for (name, age) in [("ann", 31), ("bob", 17), ("cy", 45), ("di", 22)] {
        user(&orm, name, age);
    }

    let adults = User::select(&orm).unwrap().filter("age >= ?", 18);
    let names: Vec<_> = adults
        .clone()
        .order_by("-age")
        .limit(2)
        .get_all()
        .unwrap()
        .into_iter()
        .map(|u| u.attr("name").cloned().unwrap())
        .collect();
    assert_eq!(names, [text("cy"), text("ann")]);

    assert_eq!(adults.clone().limit(1).count().unwrap(), 3);
    assert!(adults.exists().unwrap());

    let skipped = User::select(&orm)
        .unwrap()
        .order_by("name")
        .offset(3)
        .get_all()
        .unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].attr("name"), Some(&text("di")));

    let mut seen = 0;
    for record in &User::select(&orm).unwrap().filter_eq("name", "bob") {
        assert_eq!(record.unwrap().attr("age"), Some(&SqlValue::Int(17)));
        seen += 1;
    }
    assert_eq!(seen, 1);

    let rows = orm
        .select_rows("User")
        .unwrap()
        .filter("age BETWEEN ? AND ?", (20, 40))
        .order_by("age")
        .get_all()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name"), Some(&text("di")));
}

#[test]
fn test_relations_against_sqlite() {
    let orm = setup();
    let mut ann = user(&orm, "ann", 31);
    let bob = user(&orm, "bob", 40);

    for title in ["first", "second"] {
        let mut post = Post::create(
            &orm,
            [("user_id", ann.id().clone()), ("title", title.to_sql_value())],
        )
        .unwrap();
        post.save().unwrap();
    }

    let titles: Vec<_> = ann
        .get("posts")
        .unwrap()
        .many()
        .iter()
        .map(|p| p.attr("title").cloned().unwrap())
        .collect();
    assert_eq!(titles, [text("second"), text("first")]);

    let mut post = Post::find(&orm, 1).unwrap().unwrap();
    let author = post.get("user").unwrap().one().unwrap();
    assert_eq!(author.attr("name"), Some(&text("ann")));

    let mut admins = Group::create(&orm, [("name", text("admins"))]).unwrap();
    admins.save().unwrap();
    let adapter = orm.adapter_for("User").unwrap();
    for member in [&ann, &bob] {
        adapter
            .execute(
                "INSERT INTO groups_users (group_id, user_id) VALUES (?, ?)",
                &[admins.id().clone(), member.id().clone()],
            )
            .unwrap();
    }

    assert_eq!(ann.related("groups").unwrap().len(), 1);
    assert_eq!(admins.related("users").unwrap().len(), 2);
    let older = admins
        .relation_query("users")
        .unwrap()
        .filter("age > ?", 35)
        .get_all()
        .unwrap();
    assert_eq!(older.len(), 1);
    assert_eq!(older[0].attr("name"), Some(&text("bob")));
}

#[test]
fn test_empty_strings_become_null_when_configured() {
    let adapter = SqliteConfig::default()
        .empty_string(EmptyStringPolicy::Null)
        .connect()
        .unwrap();
    let orm = setup_with(adapter);

    let mut user = User::create(&orm, [("name", text("Eve")), ("email", text(""))]).unwrap();
    user.set("email", "").unwrap();
    user.save().unwrap();

    let loaded = User::find(&orm, user.id().clone()).unwrap().unwrap();
    assert_eq!(loaded.attr("email"), Some(&SqlValue::Null));
}

#[test]
fn test_schema_comes_from_the_live_table() {
    let orm = setup();
    orm.register_model::<User>();
    let schema = orm.schema("User").unwrap();
    assert!(schema["id"].primary_key);
    assert!(schema["email"].unique);
    assert_eq!(schema["name"].size, Some(20));
    assert_eq!(schema["active"].default, Some(SqlValue::Int(1)));
    assert!(Arc::ptr_eq(&schema, &orm.schema("User").unwrap()));
}

#[test]
fn test_database_default_fills_not_null_column() {
    let orm = setup();
    let adapter = orm.adapter_for("User").unwrap();
    adapter
        .execute(
            "CREATE TABLE events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            &[],
        )
        .unwrap();
    orm.register_model::<Event>();

    let mut event = Event::create(&orm, [("title", text("launch"))]).unwrap();
    event.save().unwrap();

    let loaded = Event::find(&orm, event.id().clone()).unwrap().unwrap();
    assert!(matches!(loaded.attr("created_at"), Some(SqlValue::Text(stamp)) if !stamp.is_empty()));
}
