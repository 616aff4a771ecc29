//! Mutation results and per-statement context.

use crate::columns::ConflictTarget;
use crate::normalize::RawResult;
use rowsync_core::ValueMap;
use std::collections::BTreeMap;

/// Outcome of a mutating statement, filled in by the reconciler.
///
/// After reconciliation `generated_maps` (and, for inserts, `identifiers`)
/// hold exactly one entry per input entity, in input order.
#[derive(Debug, Clone, Default)]
pub struct MutationResult {
    /// Driver output.
    pub raw: RawResult,
    /// Rows affected, when the driver reports it.
    pub affected: Option<u64>,
    /// Generated values ledger.
    pub generated_maps: Vec<ValueMap>,
    /// Primary-key map per entity; `None` when it could not be recovered.
    pub identifiers: Vec<Option<ValueMap>>,
}

impl MutationResult {
    pub fn new(raw: RawResult) -> Self {
        Self {
            raw,
            ..Self::default()
        }
    }

    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = Some(affected);
        self
    }

    /// Identifier of the entity at `index`, if recovered.
    pub fn identifier(&self, index: usize) -> Option<&ValueMap> {
        self.identifiers.get(index).and_then(Option::as_ref)
    }
}

/// Statement family of the update path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateFamily {
    #[default]
    Update,
    SoftDelete,
    Restore,
}

/// What the statement layer knows about the mutation being reconciled.
#[derive(Debug, Clone, Default)]
pub struct MutationContext {
    /// Which update-path statement ran.
    pub family: UpdateFamily,
    /// Database columns requested through an explicit RETURNING list.
    pub extra_returning_columns: Vec<String>,
    /// Client-side generated values (e.g. UUIDs) by entity position.
    pub locally_generated: BTreeMap<usize, ValueMap>,
    /// Upsert conflict target, if the insert was an upsert.
    pub conflict_target: Option<ConflictTarget>,
}

impl MutationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn family(mut self, family: UpdateFamily) -> Self {
        self.family = family;
        self
    }

    pub fn extra_returning_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.extra_returning_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Record client-generated values for the entity at `index`.
    pub fn locally_generated(mut self, index: usize, values: ValueMap) -> Self {
        self.locally_generated.insert(index, values);
        self
    }

    pub fn conflict_target(mut self, target: impl Into<ConflictTarget>) -> Self {
        self.conflict_target = Some(target.into());
        self
    }
}
