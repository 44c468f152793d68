//! Column-type validation of record attributes.
//!
//! Each column yields a list of rules derived from its descriptor. A column
//! reports only its first failing rule.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use oxide_record_core::{ColumnDescriptor, ColumnType, Row, SqlValue, TableSchema};
use regex::Regex;

use crate::error::{ConfigurationError, ValidationErrors};

static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("integer pattern is valid"));

static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("decimal pattern is valid")
});

static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("float pattern is valid")
});

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static NULL: SqlValue = SqlValue::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    NotNull,
    MaxLength(u32),
    Integer,
    Decimal,
    Float,
    Boolean,
    Date,
    Time,
    DateTime,
}

impl Rule {
    /// Returns the failure reason, or `None` when `value` passes.
    fn check(self, value: &SqlValue) -> Option<String> {
        if value.is_null() {
            return (self == Self::NotNull).then(|| String::from("may not be NULL"));
        }
        match self {
            Self::NotNull => None,
            Self::MaxLength(max) => {
                let length = match value {
                    SqlValue::Text(text) => text.chars().count(),
                    SqlValue::Blob(bytes) => bytes.len(),
                    other => other.to_string().chars().count(),
                };
                (length > max as usize)
                    .then(|| format!("may not be longer than {max} characters"))
            }
            Self::Integer => {
                (!lexical(value, &INTEGER)).then(|| String::from("must be an integer"))
            }
            Self::Decimal => {
                (!lexical(value, &DECIMAL)).then(|| String::from("must be a decimal number"))
            }
            Self::Float => (!lexical(value, &FLOAT)).then(|| String::from("must be a number")),
            Self::Boolean => {
                let valid = match value {
                    SqlValue::Bool(_) => true,
                    SqlValue::Int(n) => *n == 0 || *n == 1,
                    SqlValue::Text(text) => text == "0" || text == "1",
                    _ => false,
                };
                (!valid).then(|| String::from("must be 0 or 1"))
            }
            Self::Date => (!parses(value, |s| NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()))
                .then(|| String::from("must be a date (YYYY-MM-DD)")),
            Self::Time => (!parses(value, |s| NaiveTime::parse_from_str(s, TIME_FORMAT).is_ok()))
                .then(|| String::from("must be a time (HH:MM:SS)")),
            Self::DateTime => (!parses(value, |s| {
                NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).is_ok()
            }))
            .then(|| String::from("must be a datetime (YYYY-MM-DD HH:MM:SS)")),
        }
    }
}

/// Numbers are checked through their textual form, so `Float(2.0)` is a
/// valid integer and `Text("12abc")` is not.
fn lexical(value: &SqlValue, pattern: &Regex) -> bool {
    match value {
        SqlValue::Int(_) | SqlValue::Bool(_) => true,
        SqlValue::Float(f) => pattern.is_match(&f.to_string()),
        SqlValue::Text(text) => pattern.is_match(text),
        SqlValue::Null | SqlValue::Blob(_) => false,
    }
}

fn parses(value: &SqlValue, parse: impl Fn(&str) -> bool) -> bool {
    value.as_str().is_some_and(parse)
}

fn rules_for(table: &str, column: &ColumnDescriptor) -> Result<Vec<Rule>, ConfigurationError> {
    let mut rules = Vec::with_capacity(2);
    if !column.nullable && !column.primary_key {
        rules.push(Rule::NotNull);
    }
    match &column.column_type {
        ColumnType::String | ColumnType::Text => {
            if let Some(size) = column.size {
                rules.push(Rule::MaxLength(size));
            }
        }
        ColumnType::Integer => rules.push(Rule::Integer),
        ColumnType::Decimal => rules.push(Rule::Decimal),
        ColumnType::Float => rules.push(Rule::Float),
        ColumnType::Boolean => rules.push(Rule::Boolean),
        ColumnType::Date => rules.push(Rule::Date),
        ColumnType::Time => rules.push(Rule::Time),
        ColumnType::DateTime => rules.push(Rule::DateTime),
        ColumnType::Blob => {}
        ColumnType::Other(name) => {
            return Err(ConfigurationError::UnknownColumnType {
                table: table.to_string(),
                column: column.name.clone(),
                column_type: name.clone(),
            })
        }
    }
    Ok(rules)
}

/// Checks every column of `schema` against `attributes`.
///
/// A primary key may be NULL: it is assigned by the database on insert. So
/// may any column for which `filled_by_database` holds.
pub(crate) fn validate(
    table: &str,
    schema: &TableSchema,
    attributes: &Row,
    filled_by_database: impl Fn(&ColumnDescriptor) -> bool,
) -> Result<ValidationErrors, ConfigurationError> {
    let mut errors = ValidationErrors::new();
    for column in schema.values() {
        let value = attributes.get(&column.name).unwrap_or(&NULL);
        for rule in rules_for(table, column)? {
            if rule == Rule::NotNull && value.is_null() && filled_by_database(column) {
                continue;
            }
            if let Some(reason) = rule.check(value) {
                errors.add(&column.name, reason);
                break;
            }
        }
    }
    Ok(errors)
}
