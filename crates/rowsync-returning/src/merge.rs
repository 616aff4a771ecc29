//! Typed overlay of value maps onto entities.

use rowsync_core::{Model, Result, ValueMap};

/// Write every known property of `values` into `entity`.
///
/// Keys that are not fields of `M` are ignored. Fields absent from `values`
/// keep their current value.
#[allow(clippy::result_large_err)]
pub fn merge_into<M: Model>(entity: &mut M, values: &ValueMap) -> Result<()> {
    let meta = M::metadata();
    for (name, value) in values {
        if meta.field(name).is_some() {
            entity.set_field(name, value.clone())?;
        }
    }
    Ok(())
}

/// Overlay `source` onto `target`, later values winning.
pub fn overlay(target: &mut ValueMap, source: &ValueMap) {
    for (name, value) in source {
        target.insert(name.clone(), value.clone());
    }
}
