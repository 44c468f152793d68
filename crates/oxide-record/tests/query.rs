mod common;

use common::{count_row, row, setup, text};
use oxide_record::{Model, ModelDef, Orm, OrmError, SqlValue};

fn users(n: i64) -> Vec<oxide_record::Row> {
    (1..=n)
        .map(|id| row(&[("id", SqlValue::Int(id)), ("name", text(&format!("user{id}")))]))
        .collect()
}

#[test]
fn test_builder_runs_nothing_until_a_terminal() {
    let (orm, adapter) = setup();
    let query = orm
        .select("User")
        .unwrap()
        .filter("age >= ?", 18)
        .order_by("-age")
        .limit(10)
        .offset(20);
    let _fork = query.clone().filter("active = ?", 1);

    assert!(adapter.statements().is_empty());
    assert!(adapter.describe_calls().is_empty());

    query.get_all().unwrap();
    assert_eq!(
        adapter.last(),
        (
            String::from(
                "SELECT \"users\".* FROM \"users\" WHERE age >= ? ORDER BY \"age\" DESC LIMIT 10 OFFSET 20"
            ),
            vec![SqlValue::Int(18)]
        )
    );
}

#[test]
fn test_iteration_yields_persisted_records_lazily() {
    let (orm, adapter) = setup();
    adapter.push_rows(users(3));

    let mut iter = orm.select("User").unwrap().into_iter();
    assert!(adapter.statements().is_empty());

    let first = iter.next().unwrap().unwrap();
    assert_eq!(first.id(), &SqlValue::Int(1));
    assert!(!first.has_changes());
    assert_eq!(adapter.statements().len(), 1);

    let rest: Vec<_> = iter.collect::<Result<_, _>>().unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(adapter.statements().len(), 1);
}

#[test]
fn test_schema_is_described_once_for_many_records() {
    let (orm, adapter) = setup();
    adapter.push_rows(users(5));
    adapter.push_rows(users(2));

    assert_eq!(orm.select("User").unwrap().get_all().unwrap().len(), 5);
    orm.create("User", [("name", text("Zed"))]).unwrap();
    assert_eq!(orm.select("User").unwrap().get_all().unwrap().len(), 2);

    assert_eq!(adapter.describe_calls(), vec!["users"]);
}

#[test]
fn test_count_and_exists() {
    let (orm, adapter) = setup();
    adapter.push_rows(vec![count_row(3)]);
    adapter.push_rows(vec![count_row(0)]);

    let active = orm.select("User").unwrap().filter("active = ?", true);
    assert_eq!(active.count().unwrap(), 3);
    assert!(!active.exists().unwrap());
    assert_eq!(
        adapter.statements(),
        vec![
            "SELECT COUNT(*) FROM \"users\" WHERE active = ?",
            "SELECT COUNT(*) FROM \"users\" WHERE active = ?",
        ]
    );
}

#[test]
fn test_none_short_circuits() {
    let (orm, adapter) = setup();
    let nothing = orm.select("User").unwrap().none();
    assert!(nothing.get_all().unwrap().is_empty());
    assert!(nothing.get_one().unwrap().is_none());
    assert_eq!(nothing.count().unwrap(), 0);
    assert!(adapter.statements().is_empty());
}

#[test]
fn test_select_rows_returns_plain_maps() {
    let (orm, adapter) = setup();
    adapter.push_rows(users(2));

    let rows = orm
        .select_rows("User")
        .unwrap()
        .order_by("name")
        .get_all()
        .unwrap();
    assert_eq!(rows[1].get("name"), Some(&text("user2")));
    assert_eq!(
        adapter.statements(),
        vec!["SELECT \"users\".* FROM \"users\" ORDER BY \"name\" ASC"]
    );
    assert!(adapter.describe_calls().is_empty());
}

#[test]
fn test_placeholder_mismatch_is_reported_before_sql_runs() {
    let (orm, adapter) = setup();
    let err = orm
        .select("User")
        .unwrap()
        .filter("name = ? OR email = ?", "ann")
        .get_all()
        .unwrap_err();
    assert!(matches!(err, OrmError::Query(_)));
    assert!(adapter.statements().is_empty());
}

#[test]
fn test_non_integer_count_is_an_error() {
    let (orm, adapter) = setup();
    adapter.push_rows(vec![row(&[("COUNT(*)", text("many"))])]);
    let err = orm.select("User").unwrap().count().unwrap_err();
    assert!(matches!(err, OrmError::Query(_)));
}

struct Member;

impl Model for Member {
    const NAME: &'static str = "Member";

    fn definition() -> ModelDef {
        ModelDef::new(Self::NAME).table("users")
    }
}

#[test]
fn test_model_trait_forwards_to_orm() {
    let (orm, adapter) = setup();
    adapter.push_rows(vec![count_row(2)]);
    assert_eq!(Member::select(&orm).unwrap().count().unwrap(), 2);

    let mut member = Member::create(&orm, [("name", text("Kim"))]).unwrap();
    member.save().unwrap();
    assert!(adapter.last().0.starts_with("INSERT INTO \"users\""));
}

#[test]
fn test_global_instance_is_shared() {
    let first = Orm::global();
    let second = Orm::global();
    first.register(ModelDef::new("GlobalMarker"));
    assert!(second.model("GlobalMarker").is_ok());
}
