//! Persistent records.
//!
//! A [`Record`] holds one row of a table as an ordered attribute map, tracks
//! which columns changed since it was loaded or last saved, and caches the
//! relations it has resolved.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use oxide_record_core::{Adapter, Row, SqlValue, TableSchema, ToSqlValue};
use tracing::{debug, warn};

use crate::error::{OrmError, Result, ValidationErrors};
use crate::model::ModelDef;
use crate::orm::Orm;
use crate::query::Select;
use crate::relation::{self, Related};
use crate::validation;

const ID: &str = "id";

static NULL: SqlValue = SqlValue::Null;

/// What [`Record::get`] returns for a name.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    /// A column value. Unknown names read as NULL.
    Value(&'a SqlValue),
    /// A resolved `belongs_to` or `has_one` relation.
    One(Option<&'a Record>),
    /// A resolved `has_many` or `has_and_belongs_to_many` relation.
    Many(&'a [Record]),
}

impl<'a> Field<'a> {
    /// Returns the column value, or `None` for relations.
    pub fn value(self) -> Option<&'a SqlValue> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the related record of a to-one relation.
    pub fn one(self) -> Option<&'a Record> {
        match self {
            Self::One(record) => record,
            _ => None,
        }
    }

    /// Returns the related records of a to-many relation.
    pub fn many(self) -> &'a [Record] {
        match self {
            Self::Many(records) => records,
            _ => &[],
        }
    }
}

/// One row of a table, bound to its record type.
///
/// # Example
///
/// ```ignore
/// let mut user = orm.create("User", [("name", "Ann".to_sql_value())])?;
/// user.set("age", 30)?;
/// user.save()?;
/// assert!(!user.is_new());
///
/// let posts = user.get("posts")?.many();
/// ```
#[derive(Clone)]
pub struct Record {
    orm: Orm,
    model: Arc<ModelDef>,
    schema: Arc<TableSchema>,
    attributes: Row,
    dirty: IndexSet<String>,
    relations: HashMap<String, Related>,
    errors: ValidationErrors,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model.name())
            .field("attributes", &self.attributes)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl Record {
    /// Builds an unsaved record: column defaults first, then `initial`.
    ///
    /// Keys that are not columns (including relation names) are ignored.
    /// Nothing starts dirty.
    pub(crate) fn new<K, I>(
        orm: Orm,
        model: Arc<ModelDef>,
        schema: Arc<TableSchema>,
        initial: I,
    ) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SqlValue)>,
    {
        let mut attributes: Row = schema
            .values()
            .map(|column| {
                let default = column.default.clone().unwrap_or(SqlValue::Null);
                (column.name.clone(), default)
            })
            .collect();

        for (key, value) in initial {
            let key = key.into();
            if model.relation(&key).is_some() || !schema.contains_key(&key) {
                debug!(model = model.name(), key = %key, "Ignoring non-column attribute");
                continue;
            }
            attributes.insert(key, value.normalize_bool());
        }

        Self {
            orm,
            model,
            schema,
            attributes,
            dirty: IndexSet::new(),
            relations: HashMap::new(),
            errors: ValidationErrors::new(),
        }
    }

    /// Wraps a fetched row.
    pub(crate) fn from_row(orm: Orm, model: Arc<ModelDef>, schema: Arc<TableSchema>, row: Row) -> Self {
        Self::new(orm, model, schema, row)
    }

    /// Returns the record type.
    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    /// Returns the table's column metadata.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns the primary key, NULL for unsaved records.
    pub fn id(&self) -> &SqlValue {
        self.attributes.get(ID).unwrap_or(&NULL)
    }

    /// Returns whether the record has never been saved (or was deleted).
    pub fn is_new(&self) -> bool {
        self.id().is_null()
    }

    /// Reads a column, or resolves and caches a relation.
    ///
    /// # Errors
    ///
    /// Only relation resolution can fail; unknown names read as NULL.
    pub fn get(&mut self, name: &str) -> Result<Field<'_>> {
        if self.model.relation(name).is_some() {
            return Ok(match self.related(name)? {
                Related::One(record) => Field::One(record.as_deref()),
                Related::Many(records) => Field::Many(records),
            });
        }
        Ok(Field::Value(self.attributes.get(name).unwrap_or(&NULL)))
    }

    /// Reads a column without touching relations.
    pub fn attr(&self, name: &str) -> Option<&SqlValue> {
        self.attributes.get(name)
    }

    /// Resolves relation `name`, caching the result for the lifetime of
    /// this record.
    pub fn related(&mut self, name: &str) -> Result<&Related> {
        match self.relations.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let resolved = relation::resolve(&self.orm, &self.model, &self.attributes, name)?;
                Ok(entry.insert(resolved))
            }
        }
    }

    /// Returns a query for relation `name`, to refine before running.
    pub fn relation_query(&self, name: &str) -> Result<Select> {
        relation::query_for(&self.orm, &self.model, &self.attributes, name)
    }

    /// Writes a column and marks it dirty.
    ///
    /// # Errors
    ///
    /// [`OrmError::UnknownField`] when `name` is a relation or not a column.
    pub fn set(&mut self, name: &str, value: impl ToSqlValue) -> Result<()> {
        if self.model.relation(name).is_some() || !self.schema.contains_key(name) {
            return Err(OrmError::UnknownField {
                model: self.model.name().to_string(),
                field: name.to_string(),
            });
        }
        self.attributes
            .insert(name.to_string(), value.to_sql_value().normalize_bool());
        self.dirty.insert(name.to_string());
        Ok(())
    }

    /// Returns the columns written since the last load or save, in write
    /// order.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Returns whether `name` was written since the last load or save.
    pub fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    /// Returns whether any column was written since the last load or save.
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Checks every column. Replaces the previous errors on every call.
    ///
    /// # Errors
    ///
    /// A column type that cannot be validated is a configuration error.
    pub fn validate(&mut self) -> Result<bool> {
        self.errors.clear();
        // A new record leaves untouched NULL columns out of the INSERT, so
        // database defaults fill them.
        let is_new = self.is_new();
        let errors = validation::validate(
            self.model.table_name(),
            &self.schema,
            &self.attributes,
            |column| is_new && column.db_default && !self.dirty.contains(&column.name),
        )?;
        self.errors = errors;
        Ok(self.errors.is_empty())
    }

    /// Returns the errors of the last [`Record::validate`].
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Validates, then inserts a new record or updates the dirty columns of
    /// a persisted one.
    ///
    /// Saving a persisted record with no dirty columns runs no SQL.
    pub fn save(&mut self) -> Result<()> {
        if !self.validate()? {
            debug!(model = self.model.name(), errors = %self.errors, "Validation failed");
            return Err(OrmError::Validation(self.errors.clone()));
        }

        let adapter = self.orm.adapter_for(self.model.name())?;
        if self.is_new() {
            self.insert(adapter.as_ref())?;
        } else if self.dirty.is_empty() {
            debug!(model = self.model.name(), id = %self.id(), "Nothing to save");
        } else {
            self.update(adapter.as_ref())?;
        }
        self.dirty.clear();
        Ok(())
    }

    fn insert(&mut self, adapter: &dyn Adapter) -> Result<()> {
        let policy = adapter.empty_string();
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for (name, value) in &self.attributes {
            // Omitted columns fall back to the database default.
            if value.is_null() && (name == ID || !self.dirty.contains(name)) {
                continue;
            }
            columns.push(adapter.quote_identifier(name));
            params.push(policy.apply(value.clone()));
        }

        let table = adapter.quote_identifier(self.model.table_name());
        let sql = if columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };
        debug!(sql = %sql, params = params.len(), "Inserting record");
        adapter.execute(&sql, &params)?;

        let id = adapter.last_insert_id()?;
        if id.is_null() {
            warn!(model = self.model.name(), "Adapter returned no id after INSERT");
        }
        self.attributes.insert(ID.to_string(), id);
        Ok(())
    }

    fn update(&mut self, adapter: &dyn Adapter) -> Result<()> {
        let policy = adapter.empty_string();
        let mut assignments = Vec::with_capacity(self.dirty.len());
        let mut params = Vec::with_capacity(self.dirty.len() + 1);
        for name in &self.dirty {
            assignments.push(format!("{} = ?", adapter.quote_identifier(name)));
            let value = self.attributes.get(name).unwrap_or(&NULL);
            params.push(policy.apply(value.clone()));
        }
        params.push(self.id().clone());

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            adapter.quote_identifier(self.model.table_name()),
            assignments.join(", "),
            adapter.quote_identifier(ID)
        );
        debug!(sql = %sql, params = params.len(), "Updating record");
        adapter.execute(&sql, &params)?;
        Ok(())
    }

    /// Deletes the row. Returns `false` without running SQL when the record
    /// was never saved.
    ///
    /// Afterwards the id is NULL and every column is dirty, so a following
    /// [`Record::save`] inserts the record again.
    pub fn delete(&mut self) -> Result<bool> {
        if self.is_new() {
            return Ok(false);
        }
        let adapter = self.orm.adapter_for(self.model.name())?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            adapter.quote_identifier(self.model.table_name()),
            adapter.quote_identifier(ID)
        );
        debug!(sql = %sql, id = %self.id(), "Deleting record");
        adapter.execute(&sql, &[self.id().clone()])?;

        self.attributes.insert(ID.to_string(), SqlValue::Null);
        self.dirty = self.attributes.keys().cloned().collect();
        self.relations.clear();
        Ok(true)
    }

    /// Returns the attributes as an ordered map.
    pub fn to_map(&self) -> &Row {
        &self.attributes
    }

    /// Consumes the record, returning its attributes.
    pub fn into_map(self) -> Row {
        self.attributes
    }
}
