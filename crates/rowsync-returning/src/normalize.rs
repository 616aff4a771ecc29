//! Raw driver results and backend-shape normalization.

use rowsync_core::{Row, Value};
use rowsync_query::Dialect;

/// What a driver handed back after a mutating statement.
#[derive(Debug, Clone, Default)]
pub enum RawResult {
    /// Nothing came back.
    #[default]
    Empty,
    /// One object shared by every entity of the statement.
    Object(Row),
    /// One row per entity, in input order.
    Rows(Vec<Row>),
    /// Oracle out-binds: one array per extra returning column.
    OutBinds(Vec<Vec<Value>>),
    /// Spanner-style result sets wrapped in an outer array.
    Batches(Vec<Vec<Row>>),
    /// Last (or first) generated id reported by the driver.
    LastInsertId(i64),
}

/// The slice of a [`RawResult`] belonging to one entity.
#[derive(Debug, Clone, Copy)]
pub enum RawRow<'a> {
    Row(&'a Row),
    InsertId(i64),
    Missing,
}

impl RawResult {
    /// Whether the driver returned anything at all.
    pub fn is_empty(&self) -> bool {
        match self {
            RawResult::Empty => true,
            RawResult::Object(row) => row.is_empty(),
            RawResult::Rows(rows) => rows.is_empty(),
            RawResult::OutBinds(columns) => columns.iter().all(Vec::is_empty),
            RawResult::Batches(batches) => batches.iter().all(Vec::is_empty),
            RawResult::LastInsertId(_) => false,
        }
    }

    /// Raw data for the entity at `index`.
    ///
    /// A shared object or insert id is handed to every entity; out-binds
    /// have to be normalized before they can be addressed.
    pub fn row_for(&self, index: usize) -> RawRow<'_> {
        match self {
            RawResult::Empty | RawResult::OutBinds(_) => RawRow::Missing,
            RawResult::Object(row) => RawRow::Row(row),
            RawResult::Rows(rows) => rows.get(index).map_or(RawRow::Missing, RawRow::Row),
            RawResult::Batches(batches) => batches
                .first()
                .and_then(|rows| rows.get(index))
                .map_or(RawRow::Missing, RawRow::Row),
            RawResult::LastInsertId(id) => RawRow::InsertId(*id),
        }
    }
}

/// Per-backend rewrite of a [`RawResult`] into an addressable shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultNormalizer {
    /// Result is already one row per entity (or a shared object).
    Passthrough,
    /// Zip out-bind arrays with their column names, first element of each.
    OutBinds { columns: Vec<String> },
    /// Unwrap a one-element outer array.
    UnwrapBatch,
}

impl ResultNormalizer {
    /// Select the normalizer for a backend.
    ///
    /// `extra_returning_columns` names the out-bind arrays, in order.
    pub fn for_backend(backend: Dialect, extra_returning_columns: &[String]) -> Self {
        match backend {
            Dialect::Oracle => ResultNormalizer::OutBinds {
                columns: extra_returning_columns.to_vec(),
            },
            Dialect::Spanner => ResultNormalizer::UnwrapBatch,
            Dialect::Postgres | Dialect::Sqlite | Dialect::Mysql | Dialect::Mssql => {
                ResultNormalizer::Passthrough
            }
        }
    }

    /// Rewrite `raw` in place.
    pub fn normalize(&self, raw: &mut RawResult) {
        match self {
            ResultNormalizer::Passthrough => {}
            ResultNormalizer::OutBinds { columns } => {
                let RawResult::OutBinds(arrays) = raw else {
                    return;
                };
                let (names, values): (Vec<String>, Vec<Value>) = columns
                    .iter()
                    .zip(arrays.iter())
                    .filter_map(|(name, values)| {
                        values.first().map(|v| (name.clone(), v.clone()))
                    })
                    .unzip();
                *raw = if names.is_empty() {
                    RawResult::Empty
                } else {
                    RawResult::Object(Row::new(names, values))
                };
            }
            ResultNormalizer::UnwrapBatch => {
                if let RawResult::Batches(batches) = raw {
                    if batches.len() == 1 {
                        let rows = batches.pop().unwrap_or_default();
                        *raw = RawResult::Rows(rows);
                    }
                }
            }
        }
    }
}
