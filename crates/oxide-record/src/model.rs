//! Record type declarations.
//!
//! A [`ModelDef`] is the static configuration of one record type: its name,
//! its table and its relations. Definitions are registered in an
//! [`Orm`](crate::Orm) and looked up by name, so related types can refer to
//! each other before either is registered.

use indexmap::IndexMap;
use oxide_record_core::{Row, SqlValue, ToSqlValue};

use crate::error::Result;
use crate::orm::Orm;
use crate::query::Select;
use crate::record::Record;
use crate::relation::{Relation, RelationKind};

/// Static configuration of one record type.
///
/// # Example
///
/// ```
/// use oxide_record::{ModelDef, Relation};
///
/// let order = ModelDef::new("Order")
///     .belongs_to("customer", "Customer")
///     .with("lines", Relation::has_many("OrderLine").order_by("position"));
///
/// assert_eq!(order.table_name(), "orders");
/// assert!(order.relation("customer").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ModelDef {
    name: String,
    table: String,
    relations: IndexMap<String, Relation>,
}

impl ModelDef {
    /// Creates a definition using the conventional table name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table = default_table_name(&name);
        Self {
            name,
            table,
            relations: IndexMap::new(),
        }
    }

    /// Overrides the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Declares a relation.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    /// Declares a `belongs_to` relation with conventional keys.
    #[must_use]
    pub fn belongs_to(self, name: impl Into<String>, related: &str) -> Self {
        self.with(name, Relation::belongs_to(related))
    }

    /// Declares a `has_one` relation with conventional keys.
    #[must_use]
    pub fn has_one(self, name: impl Into<String>, related: &str) -> Self {
        self.with(name, Relation::has_one(related))
    }

    /// Declares a `has_many` relation with conventional keys.
    #[must_use]
    pub fn has_many(self, name: impl Into<String>, related: &str) -> Self {
        self.with(name, Relation::has_many(related))
    }

    /// Declares a `has_and_belongs_to_many` relation with conventional keys.
    #[must_use]
    pub fn has_and_belongs_to_many(self, name: impl Into<String>, related: &str) -> Self {
        self.with(name, Relation::has_and_belongs_to_many(related))
    }

    /// Returns the record type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Returns the relation declared under `name`.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Iterates over the declared relations in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.relations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the names of relations of the given kind.
    pub fn relations_of(&self, kind: RelationKind) -> Vec<&str> {
        self.relations
            .iter()
            .filter(|(_, relation)| relation.kind() == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// A record type declared in Rust.
///
/// Implementors name the type and describe it; the provided methods register
/// the definition on first use and forward to the [`Orm`].
///
/// ```
/// use oxide_record::{Model, ModelDef, Relation};
///
/// struct Customer;
/// struct Order;
///
/// impl Model for Customer {
///     const NAME: &'static str = "Customer";
/// }
///
/// impl Model for Order {
///     const NAME: &'static str = "Order";
///
///     fn definition() -> ModelDef {
///         ModelDef::new(Self::NAME).with("customer", Relation::to::<Customer>(
///             oxide_record::RelationKind::BelongsTo,
///         ))
///     }
/// }
///
/// assert_eq!(Order::definition().table_name(), "orders");
/// ```
pub trait Model: Sized {
    /// Stable type name used as the registry key.
    const NAME: &'static str;

    /// Returns the static configuration for this type.
    fn definition() -> ModelDef {
        ModelDef::new(Self::NAME)
    }

    /// Returns a query over all records of this type.
    fn select(orm: &Orm) -> Result<Select> {
        orm.register_model::<Self>();
        orm.select(Self::NAME)
    }

    /// Loads the record with the given id.
    fn find(orm: &Orm, id: impl ToSqlValue) -> Result<Option<Record>> {
        orm.register_model::<Self>();
        orm.find(Self::NAME, id)
    }

    /// Constructs a new, unsaved record.
    fn create<K, I>(orm: &Orm, attributes: I) -> Result<Record>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SqlValue)>,
    {
        orm.register_model::<Self>();
        orm.create(Self::NAME, attributes)
    }

    /// Constructs a record from a previously built attribute map.
    fn from_map(orm: &Orm, attributes: Row) -> Result<Record> {
        Self::create(orm, attributes)
    }
}

/// Lowercases the type name and pluralizes it with `s`, or `es` when the
/// name already ends in `s`.
pub fn default_table_name(type_name: &str) -> String {
    let mut table = type_name.to_lowercase();
    if table.ends_with('s') {
        table.push_str("es");
    } else {
        table.push('s');
    }
    table
}

/// Returns the conventional key column referring to `type_name`.
pub fn key_column(type_name: &str) -> String {
    format!("{}_id", type_name.to_lowercase())
}

/// Returns the conventional join table for two tables: both names in
/// lexicographic order, joined with `_`.
pub fn join_table_name(left: &str, right: &str) -> String {
    if left <= right {
        format!("{left}_{right}")
    } else {
        format!("{right}_{left}")
    }
}
