//! Returning-column selectors and conflict-column resolution.

use rowsync_core::{EntityMetadata, FieldInfo};

/// Columns whose value may change as a side effect of an UPDATE.
pub fn update_returning_fields(meta: &EntityMetadata) -> Vec<&'static FieldInfo> {
    meta.fields()
        .iter()
        .filter(|f| f.generated_as.is_some() || f.update_date || f.version)
        .collect()
}

/// [`update_returning_fields`] plus the soft-delete timestamp.
pub fn soft_delete_returning_fields(meta: &EntityMetadata) -> Vec<&'static FieldInfo> {
    meta.fields()
        .iter()
        .filter(|f| f.generated_as.is_some() || f.update_date || f.version || f.delete_date)
        .collect()
}

/// Columns an upsert resolves conflicts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictTarget {
    Column(String),
    Columns(Vec<String>),
}

impl ConflictTarget {
    pub fn names(&self) -> &[String] {
        match self {
            ConflictTarget::Column(name) => std::slice::from_ref(name),
            ConflictTarget::Columns(names) => names,
        }
    }
}

impl From<&str> for ConflictTarget {
    fn from(name: &str) -> Self {
        ConflictTarget::Column(name.to_string())
    }
}

impl From<Vec<String>> for ConflictTarget {
    fn from(names: Vec<String>) -> Self {
        ConflictTarget::Columns(names)
    }
}

impl<const N: usize> From<[&str; N]> for ConflictTarget {
    fn from(names: [&str; N]) -> Self {
        ConflictTarget::Columns(names.iter().map(|n| (*n).to_string()).collect())
    }
}

/// Resolve conflict column names against the entity's fields.
///
/// A name matches a database column first, then a property. Names matching
/// neither are dropped so stale configuration does not abort a batch.
pub fn resolve_conflict_fields(
    meta: &EntityMetadata,
    target: &ConflictTarget,
) -> Vec<&'static FieldInfo> {
    let mut resolved: Vec<&'static FieldInfo> = Vec::new();
    for name in target.names() {
        match meta
            .field_by_column(name)
            .or_else(|| meta.field(name))
        {
            Some(field) if !resolved.iter().any(|f| f.name == field.name) => resolved.push(field),
            Some(_) => {}
            None => {
                tracing::debug!(
                    table = meta.table(),
                    column = %name,
                    "Dropping unknown conflict column"
                );
            }
        }
    }
    resolved
}
