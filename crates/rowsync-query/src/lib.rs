//! Supplemental read queries for rowsync.
//!
//! `rowsync-query` is the **read layer** of the reconciler. When a backend
//! cannot return generated values inline, the reconciler re-selects them:
//!
//! - **`ReadQuery`**: a SELECT over one entity table filtered by property-keyed
//!   equality maps, optionally including soft-deleted rows.
//! - **`Dialect`**: placeholder and identifier quoting rules per backend.
//! - **`QueryService`**: the seam the reconciler reads through;
//!   `ConnectionQueryService` implements it on top of any `Connection`.

pub mod dialect;
pub mod read;
pub mod service;

pub use dialect::Dialect;
pub use read::{Filter, ReadQuery};
pub use service::{ConnectionQueryService, QueryService};
