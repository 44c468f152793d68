//! Memoized table introspection.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use oxide_record_core::{Adapter, ColumnType, TableSchema};
use tracing::info;

use crate::error::{ConfigurationError, Result};
use crate::model::ModelDef;

/// Caches [`Adapter::describe_table`] results per record type.
///
/// Each type is introspected at most once per registry, even when several
/// threads ask for it at the same time.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    cache: RwLock<HashMap<String, Arc<TableSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the columns of `model`'s table, introspecting on first use.
    pub fn describe(&self, model: &ModelDef, adapter: &dyn Adapter) -> Result<Arc<TableSchema>> {
        if let Some(schema) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model.name())
        {
            return Ok(Arc::clone(schema));
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(schema) = cache.get(model.name()) {
            return Ok(Arc::clone(schema));
        }

        info!(
            model = model.name(),
            table = model.table_name(),
            "Introspecting table"
        );
        let schema = Arc::new(adapter.describe_table(model.table_name())?);
        cache.insert(model.name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Returns the cached schema without introspecting.
    pub fn cached(&self, model: &str) -> Option<Arc<TableSchema>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .cloned()
    }

    /// Forgets one record type, so the next lookup introspects again.
    pub(crate) fn invalidate(&self, model: &str) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(model);
    }

    /// Forgets everything.
    pub(crate) fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders a `CREATE TABLE` statement for `columns`.
///
/// Integer primary keys get the dialect's autoincrement keyword. Defaults
/// are inlined with [`Adapter::quote`].
///
/// # Errors
///
/// Returns [`ConfigurationError::UnknownColumnType`] for
/// [`ColumnType::Other`] columns.
pub fn create_table_sql(adapter: &dyn Adapter, table: &str, columns: &TableSchema) -> Result<String> {
    let mut definitions = Vec::with_capacity(columns.len());
    for column in columns.values() {
        let type_name =
            column
                .column_type
                .sql_name()
                .ok_or_else(|| ConfigurationError::UnknownColumnType {
                    table: table.to_string(),
                    column: column.name.clone(),
                    column_type: column.column_type.to_string(),
                })?;

        let mut definition = format!("{} {type_name}", adapter.quote_identifier(&column.name));
        match (column.size, column.scale) {
            (Some(size), Some(scale)) => definition.push_str(&format!("({size}, {scale})")),
            (Some(size), None) => definition.push_str(&format!("({size})")),
            _ => {}
        }

        if column.primary_key {
            definition.push_str(" PRIMARY KEY");
            if column.column_type == ColumnType::Integer {
                definition.push_str(adapter.dialect().autoincrement_keyword());
            }
        } else {
            if !column.nullable {
                definition.push_str(" NOT NULL");
            }
            if column.unique {
                definition.push_str(" UNIQUE");
            }
        }

        if let Some(default) = &column.default {
            definition.push_str(" DEFAULT ");
            definition.push_str(&adapter.quote(default));
        }
        definitions.push(definition);
    }

    Ok(format!(
        "CREATE TABLE {} ({})",
        adapter.quote_identifier(table),
        definitions.join(", ")
    ))
}
