//! The result reconciler.
//!
//! After a mutating statement runs, [`Reconciler`] writes database-produced
//! values back into the caller's entities and records them in the
//! [`MutationResult`] ledger:
//!
//! - with inline RETURNING, values come straight from the driver result;
//! - without it, they are re-selected through the [`QueryService`];
//! - upsert rows whose insert turned into an update of an existing row get
//!   their identifier back through a lookup on the conflict columns.
//!
//! Work for different entities runs concurrently. Each entity only ever
//! touches its own slot of the output vectors.

use crate::capability::{CapabilityOracle, ReturningOperation};
use crate::columns::{
    resolve_conflict_fields, soft_delete_returning_fields, update_returning_fields,
};
use crate::config::{ReconcilerConfig, UnresolvedConflictPolicy};
use crate::merge::{merge_into, overlay};
use crate::normalize::ResultNormalizer;
use crate::result::{MutationContext, MutationResult, UpdateFamily};
use asupersync::{Cx, Outcome};
use futures::future::{join, join_all};
use rowsync_core::{
    EntityMetadata, Error, FieldInfo, Model, ReconcileError, Value, ValueMap, entity_id_map,
    entity_values,
};
use rowsync_query::{QueryService, ReadQuery};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Reconciles entities with the values a mutating statement produced.
#[derive(Debug)]
pub struct Reconciler<O, Q> {
    oracle: O,
    queries: Q,
    config: ReconcilerConfig,
}

/// Rows recovered by supplemental reads, by entity position.
struct Recovery {
    rows: Vec<Option<ValueMap>>,
    /// Entities that went through a conflict-column lookup.
    conflict_attempted: Vec<usize>,
}

impl<O: CapabilityOracle, Q: QueryService> Reconciler<O, Q> {
    /// Create a reconciler with the default configuration.
    pub fn new(oracle: O, queries: Q) -> Self {
        Self {
            oracle,
            queries,
            config: ReconcilerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn queries(&self) -> &Q {
        &self.queries
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    fn normalizer(&self, ctx: &MutationContext) -> ResultNormalizer {
        ResultNormalizer::for_backend(self.oracle.backend(), &ctx.extra_returning_columns)
    }

    /// Reconcile entities after an UPDATE, soft-delete or restore.
    ///
    /// On success `result.generated_maps` holds one entry per entity; an entity
    /// with nothing to reconcile gets an empty map.
    ///
    /// # Errors
    ///
    /// `IdentifierMissing` when an entity has to be re-selected but its primary
    /// key is not set. Query failures are returned unchanged.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, ctx, result, entities),
        fields(table = M::TABLE_NAME, entities = entities.len(), family = ?ctx.family)
    )]
    pub async fn reconcile_update<M: Model>(
        &self,
        cx: &Cx,
        ctx: &MutationContext,
        result: &mut MutationResult,
        entities: &mut [M],
    ) -> Outcome<(), Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        let meta = M::metadata();
        let count = entities.len();
        let inline = self.oracle.supports_returning(ReturningOperation::Update);
        let returning = match ctx.family {
            UpdateFamily::Update => update_returning_fields(&meta),
            UpdateFamily::SoftDelete | UpdateFamily::Restore => {
                soft_delete_returning_fields(&meta)
            }
        };
        tracing::debug!(inline, returning = returning.len(), "Reconciling update");

        if inline {
            self.normalizer(ctx).normalize(&mut result.raw);
        }

        let raw = &result.raw;
        let returning = returning.as_slice();
        let tasks = entities
            .iter_mut()
            .enumerate()
            .map(move |(index, entity)| async move {
                if inline {
                    let generated = self
                        .oracle
                        .create_generated_map(&meta, raw.row_for(index), index, count)
                        .unwrap_or_default();
                    if let Err(e) = merge_into(entity, &generated) {
                        return Outcome::Err(e);
                    }
                    return Outcome::Ok(generated);
                }
                if returning.is_empty() {
                    return Outcome::Ok(ValueMap::new());
                }
                self.reload(cx, &meta, returning, index, entity).await
            });

        let ledger = match collect_outcomes(join_all(tasks).await) {
            Outcome::Ok(ledger) => ledger,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        result.generated_maps = ledger;
        Outcome::Ok(())
    }

    /// Re-select the returning columns of one entity by primary key.
    async fn reload<M: Model>(
        &self,
        cx: &Cx,
        meta: &EntityMetadata,
        returning: &[&'static FieldInfo],
        index: usize,
        entity: &mut M,
    ) -> Outcome<ValueMap, Error> {
        let Some(id) = entity_id_map(entity) else {
            return Outcome::Err(ReconcileError::identifier_missing(M::TABLE_NAME, index).into());
        };

        let query = ReadQuery::new(*meta)
            .select(&meta.primary_fields())
            .select(returning)
            .with_deleted()
            .where_eq(&id);

        let row = match self.queries.fetch_one(cx, &query).await {
            Outcome::Ok(row) => row,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let Some(row) = row else {
            tracing::debug!(index, "Reloaded row not found");
            return Outcome::Ok(ValueMap::new());
        };

        let recovered = meta.value_map_from_row(&row);
        if let Err(e) = merge_into(entity, &recovered) {
            return Outcome::Err(e);
        }
        Outcome::Ok(recovered)
    }

    /// Reconcile entities after an INSERT or upsert.
    ///
    /// On success `result.generated_maps` and `result.identifiers` hold one
    /// entry per entity. An identifier that could not be recovered is `None`
    /// unless the configured [`UnresolvedConflictPolicy`] turns it into an error.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, ctx, result, entities),
        fields(table = M::TABLE_NAME, entities = entities.len())
    )]
    pub async fn reconcile_insert<M: Model>(
        &self,
        cx: &Cx,
        ctx: &MutationContext,
        result: &mut MutationResult,
        entities: &mut [M],
    ) -> Outcome<(), Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        let meta = M::metadata();
        let count = entities.len();
        let inline = self.oracle.supports_returning(ReturningOperation::Insert);

        self.normalizer(ctx).normalize(&mut result.raw);

        // Driver-reported values, with client-generated ones on top.
        let mut ledger = Vec::with_capacity(count);
        for (index, entity) in entities.iter_mut().enumerate() {
            let mut generated = self
                .oracle
                .create_generated_map(&meta, result.raw.row_for(index), index, count)
                .unwrap_or_default();
            if let Some(local) = ctx.locally_generated.get(&index) {
                overlay(&mut generated, local);
            }
            if let Err(e) = merge_into(entity, &generated) {
                return Outcome::Err(e);
            }
            ledger.push(generated);
        }

        // A driver that never returns generated keys inline won't return them
        // on a re-select either.
        let returning: Vec<&'static FieldInfo> = meta
            .insertion_returning_fields()
            .into_iter()
            .filter(|f| inline || f.generated.is_none())
            .collect();
        tracing::debug!(inline, returning = returning.len(), "Reconciling insert");

        let mut conflict_attempted = Vec::new();
        if !inline {
            let recovery = match self.recover(cx, ctx, &meta, &returning, entities).await {
                Outcome::Ok(recovery) => recovery,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            for (index, values) in recovery.rows.into_iter().enumerate() {
                let Some(values) = values else {
                    continue;
                };
                if let Err(e) = merge_into(&mut entities[index], &values) {
                    return Outcome::Err(e);
                }
                overlay(&mut ledger[index], &values);
            }
            conflict_attempted = recovery.conflict_attempted;
        }

        let identifiers: Vec<Option<ValueMap>> = entities.iter().map(entity_id_map).collect();
        for index in conflict_attempted {
            if identifiers[index].is_some() {
                continue;
            }
            match self.config.unresolved_conflict {
                UnresolvedConflictPolicy::Ignore => {}
                UnresolvedConflictPolicy::Warn => {
                    tracing::warn!(
                        table = M::TABLE_NAME,
                        index,
                        "Upsert row has no identifier after conflict lookup"
                    );
                }
                UnresolvedConflictPolicy::Error => {
                    return Outcome::Err(
                        ReconcileError::unresolved_conflict(M::TABLE_NAME, index).into(),
                    );
                }
            }
        }

        result.generated_maps = ledger;
        result.identifiers = identifiers;
        Outcome::Ok(())
    }

    /// Supplemental reads for a backend without inline RETURNING on INSERT.
    ///
    /// Entities with a known id are re-selected in one batched read; the rest
    /// are looked up one by one through the conflict columns. All reads are in
    /// flight at the same time.
    async fn recover<M: Model>(
        &self,
        cx: &Cx,
        ctx: &MutationContext,
        meta: &EntityMetadata,
        returning: &[&'static FieldInfo],
        entities: &[M],
    ) -> Outcome<Recovery, Error> {
        let mut known: Vec<(usize, ValueMap)> = Vec::new();
        let mut conflict_based = Vec::new();
        for (index, entity) in entities.iter().enumerate() {
            match entity_id_map(entity) {
                Some(id) => known.push((index, id)),
                None => conflict_based.push(index),
            }
        }

        let conflict_fields = ctx
            .conflict_target
            .as_ref()
            .map(|target| resolve_conflict_fields(meta, target))
            .unwrap_or_default();
        let primary = meta.primary_fields();
        // Nothing to read back; never fall through to a full-row select.
        let readable = !primary.is_empty() || !returning.is_empty();
        let conflict_enabled = readable && !conflict_fields.is_empty();
        if !readable && !conflict_fields.is_empty() {
            tracing::debug!("No primary key or returning columns to recover");
        }

        let lookups: Vec<(usize, ReadQuery)> = if !conflict_enabled {
            Vec::new()
        } else {
            conflict_based
                .iter()
                .filter_map(|&index| {
                    let values = entity_values(&entities[index]);
                    let filter: ValueMap = conflict_fields
                        .iter()
                        .filter_map(|f| {
                            values
                                .get(f.name)
                                .filter(|v| is_usable_key(v))
                                .map(|v| (f.name.to_string(), v.clone()))
                        })
                        .collect();
                    if filter.is_empty() {
                        tracing::debug!(index, "No usable conflict column value");
                        return None;
                    }
                    // A soft-deleted row still holds the unique key.
                    let query = ReadQuery::new(*meta)
                        .select(&primary)
                        .select(returning)
                        .with_deleted()
                        .where_eq(&filter);
                    Some((index, query))
                })
                .collect()
        };

        let batch = (!returning.is_empty() && !known.is_empty()).then(|| {
            let ids: Vec<ValueMap> = known.iter().map(|(_, id)| id.clone()).collect();
            ReadQuery::new(*meta)
                .select(&primary)
                .select(returning)
                .where_any(&ids)
        });

        tracing::debug!(
            known = known.len(),
            conflict_based = conflict_based.len(),
            lookups = lookups.len(),
            batched = batch.is_some(),
            "Recovering generated values"
        );

        let lookup_reads = join_all(
            lookups
                .iter()
                .map(|(_, query)| self.queries.fetch_one(cx, query)),
        );
        let batch_read = async {
            match &batch {
                Some(query) => self.queries.fetch_all(cx, query).await,
                None => Outcome::Ok(Vec::new()),
            }
        };
        let (lookup_outcomes, batch_outcome) = join(lookup_reads, batch_read).await;

        let mut rows: Vec<Option<ValueMap>> = vec![None; entities.len()];

        let lookup_rows = match collect_outcomes(lookup_outcomes) {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        for ((index, _), row) in lookups.iter().zip(lookup_rows) {
            rows[*index] = row.map(|row| meta.value_map_from_row(&row));
        }

        let batch_rows = match batch_outcome {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        // The batched read may come back in any order.
        let positions = IdentityIndex::new(&known);
        for row in batch_rows {
            let values = meta.value_map_from_row(&row);
            let Some(id) = meta.id_map_from(&values) else {
                continue;
            };
            let matched = positions.positions_of(&id);
            if matched.is_empty() {
                tracing::debug!("Batched read returned a row matching no entity");
            }
            for index in matched {
                rows[index] = Some(values.clone());
            }
        }

        Outcome::Ok(Recovery {
            rows,
            conflict_attempted: if !conflict_enabled {
                Vec::new()
            } else {
                conflict_based
            },
        })
    }
}

fn is_usable_key(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Default)
}

/// Collapse positional outcomes, keeping the first failure in position order.
fn collect_outcomes<T>(outcomes: Vec<Outcome<T, Error>>) -> Outcome<Vec<T>, Error> {
    let mut values = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Outcome::Ok(v) => values.push(v),
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }
    Outcome::Ok(values)
}

/// Entity positions keyed by identifier.
///
/// Integer key parts match regardless of width, so an `INTEGER` key read back
/// as `BIGINT` still finds its entity.
struct IdentityIndex<'a> {
    by_hash: HashMap<u64, Vec<(usize, &'a ValueMap)>>,
}

impl<'a> IdentityIndex<'a> {
    fn new(known: &'a [(usize, ValueMap)]) -> Self {
        let mut by_hash: HashMap<u64, Vec<(usize, &'a ValueMap)>> = HashMap::new();
        for (index, id) in known {
            by_hash
                .entry(identity_hash(id))
                .or_default()
                .push((*index, id));
        }
        Self { by_hash }
    }

    fn positions_of(&self, id: &ValueMap) -> Vec<usize> {
        self.by_hash
            .get(&identity_hash(id))
            .map(|candidates| {
                candidates
                    .iter()
                    .filter(|(_, candidate)| same_identity(candidate, id))
                    .map(|(index, _)| *index)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn identity_hash(id: &ValueMap) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (name, value) in id {
        name.hash(&mut hasher);
        value.hash_identity(&mut hasher);
    }
    hasher.finish()
}

fn same_identity(a: &ValueMap, b: &ValueMap) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(name, value)| b.get(name).is_some_and(|other| value.same_identity(other)))
}
