//! Identifier quoting rules.
//!
//! Adapters own a [`Dialect`] and delegate [`crate::Adapter::quote_identifier`]
//! to it. Only quoting lives here; the ORM emits one flavour of SQL.

/// Dialect-specific quoting behavior.
pub trait Dialect: Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character (`"` for standard SQL, `` ` `` for MySQL).
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the keyword appended to an integer primary key so ids are
    /// never reused after a delete.
    fn autoincrement_keyword(&self) -> &'static str {
        ""
    }

    /// Quotes a single identifier, doubling any embedded quote character.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Quotes a possibly table-qualified identifier such as `posts.author_id`.
    fn quote_qualified(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// A generic dialect using ANSI double-quoted identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericDialect;

impl GenericDialect {
    /// Creates a new generic dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }
}
