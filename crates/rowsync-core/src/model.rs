//! Model trait and entity metadata.
//!
//! The `Model` trait is the contract between caller-owned entity structs and
//! the reconciler. Entities are never replaced: generated values are written
//! back field by field through [`Model::set_field`].
//!
//! [`EntityMetadata`] is the metadata provider view over a model type: primary
//! key fields, column lookup and id extraction.

use crate::Result;
use crate::field::FieldInfo;
use crate::row::Row;
use crate::value::Value;
use std::collections::BTreeMap;

/// Property-name keyed values.
///
/// Used for generated maps, identifier maps, locally generated overrides and
/// rows recovered by supplemental reads.
pub type ValueMap = BTreeMap<String, Value>;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// impl Model for Post {
///     const TABLE_NAME: &'static str = "posts";
///     const PRIMARY_KEY: &'static [&'static str] = &["id"];
///
///     fn fields() -> &'static [FieldInfo] {
///         static FIELDS: &[FieldInfo] = &[
///             FieldInfo::new("id", "id")
///                 .primary_key(true)
///                 .generated(GenerationStrategy::Increment),
///             FieldInfo::new("title", "title"),
///         ];
///         FIELDS
///     }
///
///     fn to_row(&self) -> Vec<(&'static str, Value)> {
///         vec![("id", self.id.into()), ("title", self.title.clone().into())]
///     }
///
///     fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
///         match name {
///             "id" => self.id = FromValue::from_value(&value)?,
///             "title" => self.title = FromValue::from_value(&value)?,
///             _ => {}
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Model: Sized + Send + Sync {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key field name(s).
    const PRIMARY_KEY: &'static [&'static str];

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Current field values keyed by field name.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Overwrite a single field with a reconciled value.
    ///
    /// Only called with names present in [`Model::fields`].
    #[allow(clippy::result_large_err)]
    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;

    /// Get the value of the primary key field(s), in `PRIMARY_KEY` order.
    fn primary_key_value(&self) -> Vec<Value> {
        let row = self.to_row();
        Self::PRIMARY_KEY
            .iter()
            .map(|pk| {
                row.iter()
                    .find(|(name, _)| name == pk)
                    .map_or(Value::Null, |(_, v)| v.clone())
            })
            .collect()
    }

    /// Check if this is a new record (some primary key part is unset).
    fn is_new(&self) -> bool {
        let pk = self.primary_key_value();
        pk.is_empty() || pk.iter().any(Value::is_null)
    }

    /// Metadata view for this model type.
    fn metadata() -> EntityMetadata {
        EntityMetadata::new(Self::TABLE_NAME, Self::PRIMARY_KEY, Self::fields())
    }
}

/// Static metadata for one entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntityMetadata {
    table: &'static str,
    primary_key: &'static [&'static str],
    fields: &'static [FieldInfo],
}

impl EntityMetadata {
    /// Create metadata from raw parts.
    pub const fn new(
        table: &'static str,
        primary_key: &'static [&'static str],
        fields: &'static [FieldInfo],
    ) -> Self {
        Self {
            table,
            primary_key,
            fields,
        }
    }

    /// Table name.
    pub const fn table(&self) -> &'static str {
        self.table
    }

    /// All fields in declaration order.
    pub const fn fields(&self) -> &'static [FieldInfo] {
        self.fields
    }

    /// Look up a field by property name.
    pub fn field(&self, name: &str) -> Option<&'static FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by database column name.
    pub fn field_by_column(&self, column: &str) -> Option<&'static FieldInfo> {
        self.fields.iter().find(|f| f.column_name == column)
    }

    /// Primary key fields, in `PRIMARY_KEY` order.
    pub fn primary_fields(&self) -> Vec<&'static FieldInfo> {
        self.primary_key
            .iter()
            .filter_map(|name| self.field(name))
            .collect()
    }

    /// The soft-delete timestamp field, if the entity has one.
    pub fn delete_date_field(&self) -> Option<&'static FieldInfo> {
        self.fields.iter().find(|f| f.delete_date)
    }

    /// Fields whose value the database may produce on INSERT.
    pub fn insertion_returning_fields(&self) -> Vec<&'static FieldInfo> {
        self.fields
            .iter()
            .filter(|f| f.is_insertion_returning())
            .collect()
    }

    /// Convert a column-keyed row into a property-keyed map.
    ///
    /// Columns that do not belong to this entity are dropped.
    pub fn value_map_from_row(&self, row: &Row) -> ValueMap {
        row.iter()
            .filter_map(|(column, value)| {
                self.field_by_column(column)
                    .map(|f| (f.name.to_string(), value.clone()))
            })
            .collect()
    }

    /// Extract the primary-key map from a property-keyed map.
    ///
    /// Returns `None` when the entity has no primary key or any key part is
    /// missing or NULL.
    pub fn id_map_from(&self, values: &ValueMap) -> Option<ValueMap> {
        if self.primary_key.is_empty() {
            return None;
        }
        let mut id = ValueMap::new();
        for pk in self.primary_key {
            match values.get(*pk) {
                Some(v) if !v.is_null() => {
                    id.insert((*pk).to_string(), v.clone());
                }
                _ => return None,
            }
        }
        Some(id)
    }
}

/// Current values of an entity as a property-keyed map.
pub fn entity_values<M: Model>(entity: &M) -> ValueMap {
    entity
        .to_row()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Primary-key map of an entity, or `None` if it cannot be computed.
pub fn entity_id_map<M: Model>(entity: &M) -> Option<ValueMap> {
    M::metadata().id_map_from(&entity_values(entity))
}
