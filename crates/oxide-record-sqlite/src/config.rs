//! Connection settings.

use oxide_record_core::{AdapterError, EmptyString};
use serde::Deserialize;
use thiserror::Error;

use crate::adapter::SqliteAdapter;

/// Environment variable read by [`SqliteConfig::from_env`].
pub const DATABASE_URL: &str = "DATABASE_URL";

/// Errors while loading a [`SqliteConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document is malformed or has fields of the wrong type.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A required environment variable is unset or not unicode.
    #[error("environment variable `{0}` is not set")]
    MissingEnv(String),
}

/// How empty strings are written, as spelled in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyStringPolicy {
    #[default]
    Keep,
    Null,
}

impl From<EmptyStringPolicy> for EmptyString {
    fn from(policy: EmptyStringPolicy) -> Self {
        match policy {
            EmptyStringPolicy::Keep => Self::Keep,
            EmptyStringPolicy::Null => Self::Null,
        }
    }
}

/// Settings for [`SqliteAdapter`].
///
/// ```
/// use oxide_record_sqlite::SqliteConfig;
///
/// let config = SqliteConfig::from_json(r#"{ "url": "sqlite:app.db", "empty_string": "null" }"#)
///     .unwrap();
/// assert_eq!(config.url, "sqlite:app.db");
/// assert_eq!(config.max_connections, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// sqlx connection URL, e.g. `sqlite:app.db` or `sqlite::memory:`.
    pub url: String,
    /// Pool size. In-memory databases always use one connection.
    pub max_connections: u32,
    /// Whether empty strings are stored as NULL.
    pub empty_string: EmptyStringPolicy,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: String::from("sqlite::memory:"),
            max_connections: 5,
            empty_string: EmptyStringPolicy::Keep,
        }
    }
}

impl SqliteConfig {
    /// Creates a configuration for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the URL from `DATABASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        std::env::var(DATABASE_URL)
            .map(Self::new)
            .map_err(|_| ConfigError::MissingEnv(DATABASE_URL.to_string()))
    }

    #[must_use]
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn empty_string(mut self, policy: EmptyStringPolicy) -> Self {
        self.empty_string = policy;
        self
    }

    /// Returns whether the URL names an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Returns the pool size actually used.
    pub fn pool_size(&self) -> u32 {
        if self.is_memory() {
            1
        } else {
            self.max_connections.max(1)
        }
    }

    /// Opens an adapter with these settings.
    pub fn connect(&self) -> Result<SqliteAdapter, AdapterError> {
        SqliteAdapter::from_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SqliteConfig::default();
        assert!(config.is_memory());
        assert_eq!(config.pool_size(), 1);
        assert_eq!(EmptyString::from(config.empty_string), EmptyString::Keep);
    }

    #[test]
    fn test_from_json() {
        let config = SqliteConfig::from_json(
            r#"{ "url": "sqlite:data.db", "max_connections": 8, "empty_string": "null" }"#,
        )
        .unwrap();
        assert_eq!(config.url, "sqlite:data.db");
        assert_eq!(config.pool_size(), 8);
        assert_eq!(config.empty_string, EmptyStringPolicy::Null);

        let partial = SqliteConfig::from_json(r#"{ "max_connections": 0 }"#).unwrap();
        assert_eq!(partial.url, "sqlite::memory:");
        assert_eq!(SqliteConfig::new("sqlite:x.db").max_connections(0).pool_size(), 1);
    }

    #[test]
    fn test_from_json_rejects_bad_policy() {
        let err = SqliteConfig::from_json(r#"{ "empty_string": "sometimes" }"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(DATABASE_URL, "sqlite:env.db");
        let config = SqliteConfig::from_env().unwrap();
        assert_eq!(config.url, "sqlite:env.db");
        assert!(!config.is_memory());

        std::env::remove_var(DATABASE_URL);
        assert!(matches!(
            SqliteConfig::from_env(),
            Err(ConfigError::MissingEnv(_))
        ));
    }
}
