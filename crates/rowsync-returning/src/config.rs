//! Reconciler configuration.

use rowsync_core::{ConfigError, Error, Result};
use serde::Deserialize;

/// What to do with an upsert entity that still has no identifier after the
/// conflict-column lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedConflictPolicy {
    /// Leave the identifier slot empty.
    #[default]
    Ignore,
    /// Leave the slot empty and log a warning.
    Warn,
    /// Fail the reconciliation with `UnresolvedConflict`.
    Error,
}

/// Configuration for a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub unresolved_conflict: UnresolvedConflictPolicy,
}

impl ReconcilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unresolved-conflict policy.
    pub fn unresolved_conflict(mut self, policy: UnresolvedConflictPolicy) -> Self {
        self.unresolved_conflict = policy;
        self
    }

    /// Parse a JSON configuration document. Missing keys take their defaults.
    #[allow(clippy::result_large_err)]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid reconciler config: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }
}
