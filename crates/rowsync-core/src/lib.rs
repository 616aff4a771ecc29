//! Core types and traits for rowsync.
//!
//! This crate provides the shared vocabulary of the reconciler:
//!
//! - `Model` trait and `EntityMetadata` for entity field metadata
//! - `Value` and `Row` for driver-level data
//! - `Connection` trait for the supplemental reads
//! - `Error` for every failure the reconciler can surface
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod field;
pub mod model;
pub mod row;
pub mod value;

pub use connection::Connection;
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind,
    ReconcileError, ReconcileErrorKind, Result, TypeError,
};
pub use field::{FieldInfo, GenerationStrategy};
pub use model::{EntityMetadata, Model, ValueMap, entity_id_map, entity_values};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
