//! Relations between record types.
//!
//! A [`Relation`] is declared on the owning [`ModelDef`] and resolved lazily
//! by [`Record::get`](crate::Record::get). Key columns and join tables
//! default to naming conventions:
//!
//! | kind | local key | foreign key |
//! |------|-----------|-------------|
//! | `belongs_to` | `<related>_id` | `id` |
//! | `has_one` / `has_many` | `id` | `<owner>_id` |
//! | `has_and_belongs_to_many` | `<owner>_id` in the join table | `<related>_id` in the join table |
//!
//! Type names are lowercased, never snake_cased.

use oxide_record_core::{Row, SqlValue};
use tracing::debug;

use crate::error::{OrmError, Result};
use crate::model::{join_table_name, key_column, Model, ModelDef};
use crate::orm::Orm;
use crate::query::Select;
use crate::record::Record;

const ID: &str = "id";

/// The kind of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// This record holds a key to at most one related record.
    BelongsTo,
    /// At most one related record holds a key to this record.
    HasOne,
    /// Any number of related records hold a key to this record.
    HasMany,
    /// Records on both sides are linked through a join table.
    HasAndBelongsToMany,
}

impl RelationKind {
    /// Returns whether the relation resolves to a collection.
    pub const fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::HasAndBelongsToMany)
    }
}

/// A declared relation.
#[derive(Debug, Clone)]
pub struct Relation {
    kind: RelationKind,
    related: String,
    definition: Option<fn() -> ModelDef>,
    local_key: Option<String>,
    foreign_key: Option<String>,
    join_table: Option<String>,
    order_by: Option<String>,
}

impl Relation {
    /// Creates a relation to the record type named `related`.
    pub fn new(kind: RelationKind, related: impl Into<String>) -> Self {
        Self {
            kind,
            related: related.into(),
            definition: None,
            local_key: None,
            foreign_key: None,
            join_table: None,
            order_by: None,
        }
    }

    /// Creates a relation to a Rust-declared record type. The related type
    /// is registered on first resolution.
    pub fn to<M: Model>(kind: RelationKind) -> Self {
        let mut relation = Self::new(kind, M::NAME);
        relation.definition = Some(M::definition);
        relation
    }

    /// Shorthand for [`RelationKind::BelongsTo`].
    pub fn belongs_to(related: impl Into<String>) -> Self {
        Self::new(RelationKind::BelongsTo, related)
    }

    /// Shorthand for [`RelationKind::HasOne`].
    pub fn has_one(related: impl Into<String>) -> Self {
        Self::new(RelationKind::HasOne, related)
    }

    /// Shorthand for [`RelationKind::HasMany`].
    pub fn has_many(related: impl Into<String>) -> Self {
        Self::new(RelationKind::HasMany, related)
    }

    /// Shorthand for [`RelationKind::HasAndBelongsToMany`].
    pub fn has_and_belongs_to_many(related: impl Into<String>) -> Self {
        Self::new(RelationKind::HasAndBelongsToMany, related)
    }

    /// Overrides the local key column.
    #[must_use]
    pub fn local_key(mut self, column: impl Into<String>) -> Self {
        self.local_key = Some(column.into());
        self
    }

    /// Overrides the foreign key column.
    #[must_use]
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    /// Overrides the join table of a many-to-many relation.
    #[must_use]
    pub fn join_table(mut self, table: impl Into<String>) -> Self {
        self.join_table = Some(table.into());
        self
    }

    /// Sets the ordering of a collection, using the same syntax as
    /// [`Query::order_by`](crate::Query::order_by).
    #[must_use]
    pub fn order_by(mut self, spec: impl Into<String>) -> Self {
        self.order_by = Some(spec.into());
        self
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Returns the related type name.
    pub fn related(&self) -> &str {
        &self.related
    }

    pub(crate) fn definition(&self) -> Option<fn() -> ModelDef> {
        self.definition
    }

    /// Returns the local key column, applying the naming convention.
    pub fn local_key_for(&self, owner: &ModelDef) -> String {
        if let Some(column) = &self.local_key {
            return column.clone();
        }
        match self.kind {
            RelationKind::BelongsTo => key_column(&self.related),
            RelationKind::HasOne | RelationKind::HasMany => String::from(ID),
            RelationKind::HasAndBelongsToMany => key_column(owner.name()),
        }
    }

    /// Returns the foreign key column, applying the naming convention.
    pub fn foreign_key_for(&self, owner: &ModelDef) -> String {
        if let Some(column) = &self.foreign_key {
            return column.clone();
        }
        match self.kind {
            RelationKind::BelongsTo => String::from(ID),
            RelationKind::HasOne | RelationKind::HasMany => key_column(owner.name()),
            RelationKind::HasAndBelongsToMany => key_column(&self.related),
        }
    }

    /// Returns the join table, applying the naming convention.
    pub fn join_table_for(&self, owner: &ModelDef, related: &ModelDef) -> String {
        self.join_table
            .clone()
            .unwrap_or_else(|| join_table_name(owner.table_name(), related.table_name()))
    }
}

/// A resolved relation value.
#[derive(Debug, Clone)]
pub enum Related {
    /// Result of `belongs_to` and `has_one`.
    One(Option<Box<Record>>),
    /// Result of `has_many` and `has_and_belongs_to_many`.
    Many(Vec<Record>),
}

impl Related {
    /// Returns the single record, if this is a to-one relation that matched.
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Self::One(record) => record.as_deref(),
            Self::Many(_) => None,
        }
    }

    /// Returns the records of a to-many relation, or an empty slice.
    pub fn as_many(&self) -> &[Record] {
        match self {
            Self::Many(records) => records,
            Self::One(_) => &[],
        }
    }

    /// Returns the number of related records.
    pub fn len(&self) -> usize {
        match self {
            Self::One(record) => usize::from(record.is_some()),
            Self::Many(records) => records.len(),
        }
    }

    /// Returns whether nothing is related.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the query that loads relation `name` of a record.
pub(crate) fn query_for(
    orm: &Orm,
    owner: &ModelDef,
    attributes: &Row,
    name: &str,
) -> Result<Select> {
    let relation = owner
        .relation(name)
        .ok_or_else(|| OrmError::UnknownRelation {
            model: owner.name().to_string(),
            relation: name.to_string(),
        })?;
    let related = orm.related_model(relation)?;
    let select = orm.select(related.name())?;

    let local = relation.local_key_for(owner);
    let foreign = relation.foreign_key_for(owner);

    match relation.kind {
        RelationKind::BelongsTo | RelationKind::HasOne | RelationKind::HasMany => {
            let Some(value) = key_value(attributes, &local) else {
                debug!(model = owner.name(), relation = name, key = %local, "Relation key is NULL");
                return Ok(select.none());
            };
            let column = format!("{}.{}", related.table_name(), foreign);
            let mut select = select.filter_eq(&column, value.clone());
            if let Some(order) = &relation.order_by {
                select = select.order_by(order);
            }
            Ok(select)
        }
        RelationKind::HasAndBelongsToMany => {
            let Some(id) = key_value(attributes, ID) else {
                return Ok(select.none());
            };
            let join_table = relation.join_table_for(owner, &related);
            let on = format!(
                "{} = {}",
                select.quote_identifier(&format!("{join_table}.{foreign}")),
                select.quote_identifier(&format!("{}.{ID}", related.table_name())),
            );
            let mut select = select
                .join(&join_table, &on)
                .filter_eq(&format!("{join_table}.{local}"), id.clone());
            if let Some(order) = &relation.order_by {
                select = select.order_by(order);
            }
            Ok(select)
        }
    }
}

/// Loads relation `name` of a record.
pub(crate) fn resolve(
    orm: &Orm,
    owner: &ModelDef,
    attributes: &Row,
    name: &str,
) -> Result<Related> {
    let query = query_for(orm, owner, attributes, name)?;
    let kind = owner
        .relation(name)
        .map_or(RelationKind::HasMany, Relation::kind);
    debug!(model = owner.name(), relation = name, kind = ?kind, "Resolving relation");
    if kind.is_collection() {
        Ok(Related::Many(query.get_all()?))
    } else {
        Ok(Related::One(query.get_one()?.map(Box::new)))
    }
}

/// Returns a non-NULL key column value.
fn key_value<'a>(attributes: &'a Row, column: &str) -> Option<&'a SqlValue> {
    attributes.get(column).filter(|value| !value.is_null())
}
