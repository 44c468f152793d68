//! SQL values, bound parameters and result rows.
//!
//! Values never get spliced into SQL text by the ORM. They travel next to
//! the statement as bound parameters, or go through [`crate::Adapter::quote`]
//! when a literal is unavoidable (column defaults in `CREATE TABLE`).

use std::fmt;

use indexmap::IndexMap;

/// One result row: column name to value, in select order.
pub type Row = IndexMap<String, SqlValue>;

/// A SQL value that can be bound as a parameter or stored in a record.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns `true` for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload, parsing text that holds an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the text payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Booleans are stored as `0`/`1` integers; every other value is kept.
    #[must_use]
    pub fn normalize_bool(self) -> Self {
        match self {
            Self::Bool(b) => Self::Int(i64::from(b)),
            other => other,
        }
    }

    /// Returns the SQL literal for inline use, escaping single quotes.
    ///
    /// Prefer bound parameters; this exists for contexts that cannot take
    /// parameters, such as column defaults.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// How empty strings are persisted.
///
/// Some databases treat `''` as NULL. Each adapter reports which behaviour
/// it wants for written values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyString {
    /// Store `''` as an empty string.
    #[default]
    Keep,
    /// Store `''` as NULL.
    Null,
}

impl EmptyString {
    /// Applies the policy to a value about to be written.
    #[must_use]
    pub fn apply(self, value: SqlValue) -> SqlValue {
        match (self, value) {
            (Self::Null, SqlValue::Text(s)) if s.is_empty() => SqlValue::Null,
            (_, value) => value,
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for &SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self.clone()
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! impl_to_sql_int {
    ($($t:ty),+) => {
        $(
            impl ToSqlValue for $t {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )+
    };
}

impl_to_sql_int!(i64, i32, i16, i8, u32, u16, u8);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for &String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

/// Values bound to the `?` placeholders of one predicate.
///
/// Implemented for `()`, single values, tuples of up to six values and
/// `Vec<SqlValue>`, so `filter("age >= ?", 18)` and
/// `filter("a = ? AND b = ?", (1, "x"))` both read naturally.
pub trait Params {
    /// Converts into the ordered parameter list.
    fn into_params(self) -> Vec<SqlValue>;
}

impl Params for () {
    fn into_params(self) -> Vec<SqlValue> {
        Vec::new()
    }
}

impl Params for Vec<SqlValue> {
    fn into_params(self) -> Vec<SqlValue> {
        self
    }
}

impl<T: ToSqlValue> Params for Option<T> {
    fn into_params(self) -> Vec<SqlValue> {
        vec![self.to_sql_value()]
    }
}

macro_rules! impl_params_scalar {
    ($($t:ty),+) => {
        $(
            impl Params for $t {
                fn into_params(self) -> Vec<SqlValue> {
                    vec![self.to_sql_value()]
                }
            }
        )+
    };
}

impl_params_scalar!(
    SqlValue, &SqlValue, bool, i64, i32, i16, i8, u32, u16, u8, f64, f32, String, &String, &str
);

macro_rules! impl_params_tuple {
    ($($name:ident),+) => {
        impl<$($name: ToSqlValue),+> Params for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_params(self) -> Vec<SqlValue> {
                let ($($name,)+) = self;
                vec![$($name.to_sql_value()),+]
            }
        }
    };
}

impl_params_tuple!(A);
impl_params_tuple!(A, B);
impl_params_tuple!(A, B, C);
impl_params_tuple!(A, B, C, D);
impl_params_tuple!(A, B, C, D, E);
impl_params_tuple!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_text_escaping() {
        assert_eq!(
            SqlValue::Text(String::from("O'Brien")).to_sql_inline(),
            "'O''Brien'"
        );
        let malicious = SqlValue::Text(String::from("'; DROP TABLE users; --"));
        assert_eq!(malicious.to_sql_inline(), "'''; DROP TABLE users; --'");
    }

    #[test]
    fn test_inline_blob_and_bool() {
        assert_eq!(SqlValue::Blob(vec![0xCA, 0xFE]).to_sql_inline(), "X'CAFE'");
        assert_eq!(SqlValue::Bool(true).to_sql_inline(), "1");
        assert_eq!(SqlValue::Null.to_sql_inline(), "NULL");
    }

    #[test]
    fn test_normalize_bool() {
        assert_eq!(SqlValue::Bool(true).normalize_bool(), SqlValue::Int(1));
        assert_eq!(SqlValue::Bool(false).normalize_bool(), SqlValue::Int(0));
        assert_eq!(
            SqlValue::Text(String::from("yes")).normalize_bool(),
            SqlValue::Text(String::from("yes"))
        );
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(SqlValue::Int(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Text(String::from(" 12 ")).as_i64(), Some(12));
        assert_eq!(SqlValue::Text(String::from("x")).as_i64(), None);
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn test_empty_string_policy() {
        let empty = SqlValue::Text(String::new());
        assert_eq!(EmptyString::Keep.apply(empty.clone()), empty);
        assert_eq!(EmptyString::Null.apply(empty), SqlValue::Null);
        assert_eq!(
            EmptyString::Null.apply(SqlValue::Text(String::from("a"))),
            SqlValue::Text(String::from("a"))
        );
    }

    #[test]
    fn test_params() {
        assert!(().into_params().is_empty());
        assert_eq!(18_i64.into_params(), vec![SqlValue::Int(18)]);
        assert_eq!(
            (1_i64, "x", None::<i64>).into_params(),
            vec![
                SqlValue::Int(1),
                SqlValue::Text(String::from("x")),
                SqlValue::Null
            ]
        );
    }
}
