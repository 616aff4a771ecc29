//! Reconciles entities with database-generated values.
//!
//! `rowsync-returning` runs after the statement layer has executed an INSERT,
//! UPDATE, upsert, soft-delete or restore. It recovers auto-increment ids,
//! defaults, computed columns, timestamps and version counters, and writes
//! them back into the caller's entities.
//!
//! # Role In The Architecture
//!
//! - **Capability oracle**: what the backend returns inline, and how to read it.
//! - **Normalizers**: backend-specific result shapes turned into one row per entity.
//! - **Selectors**: which columns an UPDATE or soft-delete may change.
//! - **Conflict resolver**: upsert conflict target names mapped to fields.
//! - **Reconciler**: the update and insert paths, issuing supplemental reads
//!   through `rowsync-query` when the backend has no RETURNING.
//!
//! # Example
//!
//! ```ignore
//! let reconciler = Reconciler::new(
//!     DialectCapabilities::new(Dialect::Mysql),
//!     ConnectionQueryService::new(conn, Dialect::Mysql),
//! );
//! let ctx = MutationContext::new().conflict_target(["slug"]);
//! let mut result = MutationResult::new(RawResult::LastInsertId(41));
//! reconciler.reconcile_insert(&cx, &ctx, &mut result, &mut posts).await?;
//! ```

pub mod capability;
pub mod columns;
pub mod config;
pub mod merge;
pub mod normalize;
pub mod reconciler;
pub mod result;

pub use capability::{CapabilityOracle, DialectCapabilities, ReturningOperation};
pub use columns::{
    ConflictTarget, resolve_conflict_fields, soft_delete_returning_fields,
    update_returning_fields,
};
pub use config::{ReconcilerConfig, UnresolvedConflictPolicy};
pub use merge::{merge_into, overlay};
pub use normalize::{RawResult, RawRow, ResultNormalizer};
pub use reconciler::Reconciler;
pub use result::{MutationContext, MutationResult, UpdateFamily};
