//! The adapter, model and schema registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use oxide_record_core::{Adapter, SqlValue, TableSchema, ToSqlValue};
use tracing::{debug, info};

use crate::error::{ConfigurationError, Result};
use crate::model::{Model, ModelDef};
use crate::query::{Query, Records, Rows, Select, SelectRows};
use crate::record::Record;
use crate::relation::Relation;
use crate::schema::SchemaRegistry;

static GLOBAL: Lazy<Orm> = Lazy::new(Orm::new);

#[derive(Default)]
struct Inner {
    default_adapter: RwLock<Option<Arc<dyn Adapter>>>,
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
    models: RwLock<HashMap<String, Arc<ModelDef>>>,
    schemas: SchemaRegistry,
}

/// Entry point: holds adapters, record type definitions and the schema
/// cache.
///
/// `Orm` is a cheap handle; clones share state. Most programs use
/// [`Orm::global`], tests usually build their own with [`Orm::new`].
///
/// ```ignore
/// let orm = Orm::new();
/// orm.set_default_adapter(Arc::new(SqliteAdapter::connect("sqlite::memory:")?));
/// orm.register(ModelDef::new("User").has_many("posts", "Post"));
/// orm.register(ModelDef::new("Post").belongs_to("user", "User"));
///
/// let mut user = orm.create("User", [("name", "Ann".to_sql_value())])?;
/// user.save()?;
/// ```
#[derive(Clone, Default)]
pub struct Orm {
    inner: Arc<Inner>,
}

impl fmt::Debug for Orm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let models = self.inner.models.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Orm")
            .field("models", &models.keys().collect::<Vec<_>>())
            .field("schemas", &self.inner.schemas.len())
            .finish_non_exhaustive()
    }
}

impl Orm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide instance.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Sets the adapter used by record types without their own.
    pub fn set_default_adapter(&self, adapter: Arc<dyn Adapter>) {
        info!(dialect = adapter.dialect().name(), "Default adapter set");
        *self
            .inner
            .default_adapter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(adapter);
    }

    /// Routes one record type to its own adapter.
    pub fn register_adapter(&self, model: &str, adapter: Arc<dyn Adapter>) {
        info!(model, dialect = adapter.dialect().name(), "Adapter registered");
        self.inner
            .adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.to_string(), adapter);
        self.inner.schemas.invalidate(model);
    }

    /// Returns the adapter for `model`: its own, else the default.
    pub fn adapter_for(&self, model: &str) -> Result<Arc<dyn Adapter>> {
        if let Some(adapter) = self
            .inner
            .adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
        {
            return Ok(Arc::clone(adapter));
        }
        self.inner
            .default_adapter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ConfigurationError::NoAdapter(model.to_string()).into())
    }

    /// Registers (or replaces) a record type definition.
    pub fn register(&self, definition: ModelDef) -> Arc<ModelDef> {
        debug!(model = definition.name(), table = definition.table_name(), "Registering model");
        let definition = Arc::new(definition);
        self.inner
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition.name().to_string(), Arc::clone(&definition));
        definition
    }

    /// Registers `M` unless a definition with its name already exists.
    pub fn register_model<M: Model>(&self) -> Arc<ModelDef> {
        self.register_with(M::NAME, M::definition)
    }

    fn register_with(&self, name: &str, definition: impl FnOnce() -> ModelDef) -> Arc<ModelDef> {
        let mut models = self
            .inner
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            models
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(definition())),
        )
    }

    /// Returns the definition registered under `name`.
    pub fn model(&self, name: &str) -> Result<Arc<ModelDef>> {
        self.inner
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownModel(name.to_string()).into())
    }

    pub(crate) fn related_model(&self, relation: &Relation) -> Result<Arc<ModelDef>> {
        match relation.definition() {
            Some(definition) => Ok(self.register_with(relation.related(), definition)),
            None => self.model(relation.related()),
        }
    }

    /// Returns the columns of `model`'s table, introspecting once.
    pub fn schema(&self, model: &str) -> Result<Arc<TableSchema>> {
        let definition = self.model(model)?;
        if let Some(schema) = self.inner.schemas.cached(model) {
            return Ok(schema);
        }
        let adapter = self.adapter_for(model)?;
        self.inner.schemas.describe(&definition, adapter.as_ref())
    }

    /// Starts a query over all records of `model`. Runs no SQL.
    pub fn select(&self, model: &str) -> Result<Select> {
        let definition = self.model(model)?;
        let adapter = self.adapter_for(model)?;
        let table = definition.table_name().to_string();
        Ok(Query::new(adapter, table, Records::new(self.clone(), definition)))
    }

    /// Starts a query over `model`'s table that yields raw rows.
    pub fn select_rows(&self, model: &str) -> Result<SelectRows> {
        let definition = self.model(model)?;
        let adapter = self.adapter_for(model)?;
        Ok(Query::new(adapter, definition.table_name(), Rows))
    }

    /// Builds an unsaved record of `model`.
    pub fn create<K, I>(&self, model: &str, attributes: I) -> Result<Record>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SqlValue)>,
    {
        let definition = self.model(model)?;
        let schema = self.schema(model)?;
        Ok(Record::new(self.clone(), definition, schema, attributes))
    }

    /// Loads the record of `model` whose id is `id`.
    pub fn find(&self, model: &str, id: impl ToSqlValue) -> Result<Option<Record>> {
        let select = self.select(model)?;
        let column = format!("{}.id", select.table());
        select.filter_eq(&column, id).get_one()
    }

    /// Forgets adapters, definitions and cached schemas.
    pub fn reset(&self) {
        *self
            .inner
            .default_adapter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.inner
            .adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner.schemas.clear();
    }
}
