#![allow(dead_code)]

use std::path::Path;

use oxide_record_core::{Adapter, SqlValue};
use oxide_record_sqlite::{SqliteAdapter, SqliteConfig};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .without_time()
        .with_test_writer()
        .finish();
    // Every test binary shares one global subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn memory_adapter() -> SqliteAdapter {
    init_tracing();
    SqliteAdapter::connect("sqlite::memory:").expect("in-memory database")
}

pub fn file_config(path: &Path) -> SqliteConfig {
    SqliteConfig::new(format!("sqlite://{}", path.display())).max_connections(2)
}

pub fn run(adapter: &SqliteAdapter, sql: &str) {
    adapter.execute(sql, &[]).unwrap_or_else(|e| panic!("{sql}: {e}"));
}

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}
