//! SQLite dialect implementation.

use oxide_record_core::Dialect;

/// SQLite dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn autoincrement_keyword(&self) -> &'static str {
        // Without it SQLite hands out max(rowid) + 1 and reuses deleted ids.
        " AUTOINCREMENT"
    }
}
