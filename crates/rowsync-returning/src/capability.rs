//! Backend capabilities and generated-value extraction.

use crate::normalize::RawRow;
use rowsync_core::{EntityMetadata, Value, ValueMap};
use rowsync_query::Dialect;

/// Statement kind a RETURNING capability is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturningOperation {
    Insert,
    Update,
    Delete,
}

/// Answers what a backend can return and turns its raw output into values.
pub trait CapabilityOracle: Send + Sync {
    /// Whether the backend returns values inline for this operation.
    fn supports_returning(&self, operation: ReturningOperation) -> bool;

    /// The backend kind, used to pick a result normalizer.
    fn backend(&self) -> Dialect;

    /// Extract the generated values of one entity from its raw row.
    ///
    /// Returns `None` when the raw row carries nothing for this entity.
    /// Must be deterministic for the same inputs.
    fn create_generated_map(
        &self,
        meta: &EntityMetadata,
        raw: RawRow<'_>,
        entity_index: usize,
        entity_count: usize,
    ) -> Option<ValueMap>;
}

/// [`CapabilityOracle`] driven by the dialect's known behavior.
///
/// | dialect  | inline RETURNING | insert id reports |
/// |----------|------------------|-------------------|
/// | Postgres | yes              | -                 |
/// | Sqlite   | no               | last row          |
/// | Mysql    | no               | first row         |
/// | Mssql    | yes (OUTPUT)     | -                 |
/// | Oracle   | yes (out-binds)  | -                 |
/// | Spanner  | yes (THEN RETURN)| -                 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    dialect: Dialect,
    insert: bool,
    update: bool,
    delete: bool,
}

impl DialectCapabilities {
    pub fn new(dialect: Dialect) -> Self {
        let inline = matches!(
            dialect,
            Dialect::Postgres | Dialect::Mssql | Dialect::Oracle | Dialect::Spanner
        );
        Self {
            dialect,
            insert: inline,
            update: inline,
            delete: inline,
        }
    }

    /// Override inline RETURNING support for one operation.
    ///
    /// Useful for SQLite 3.35+ and MariaDB 10.5+, which do support it.
    pub fn with_returning(mut self, operation: ReturningOperation, supported: bool) -> Self {
        match operation {
            ReturningOperation::Insert => self.insert = supported,
            ReturningOperation::Update => self.update = supported,
            ReturningOperation::Delete => self.delete = supported,
        }
        self
    }

    /// Generated id for the entity at `index` given the driver's insert id.
    fn insert_id_for(&self, id: i64, index: usize, count: usize) -> Option<i64> {
        let index = i64::try_from(index).ok()?;
        let count = i64::try_from(count).ok()?;
        match self.dialect {
            // 0 means the statement did not generate a value.
            Dialect::Mysql if id == 0 => None,
            Dialect::Mysql => id.checked_add(index),
            Dialect::Sqlite => id.checked_sub(count)?.checked_add(index + 1),
            _ if index == 0 => Some(id),
            _ => None,
        }
    }
}

impl CapabilityOracle for DialectCapabilities {
    fn supports_returning(&self, operation: ReturningOperation) -> bool {
        match operation {
            ReturningOperation::Insert => self.insert,
            ReturningOperation::Update => self.update,
            ReturningOperation::Delete => self.delete,
        }
    }

    fn backend(&self) -> Dialect {
        self.dialect
    }

    fn create_generated_map(
        &self,
        meta: &EntityMetadata,
        raw: RawRow<'_>,
        entity_index: usize,
        entity_count: usize,
    ) -> Option<ValueMap> {
        match raw {
            RawRow::Missing => None,
            RawRow::Row(row) => {
                let map = meta.value_map_from_row(row);
                (!map.is_empty()).then_some(map)
            }
            RawRow::InsertId(id) => {
                let id = self.insert_id_for(id, entity_index, entity_count)?;
                let map: ValueMap = meta
                    .fields()
                    .iter()
                    .filter(|f| f.generated.is_some_and(|g| g.uses_insert_id()))
                    .map(|f| (f.name.to_string(), Value::BigInt(id)))
                    .collect();
                (!map.is_empty()).then_some(map)
            }
        }
    }
}
