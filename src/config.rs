//! Reconciler configuration
use crate::errors::Result;
use serde::{Deserialize, Serialize};

/// How a kept child whose position changed is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePolicy {
    /// Position changes of kept children produce no operations. A pure
    /// permutation of a child list is therefore a no-op.
    #[default]
    Ignore,
    /// Kept children outside the longest run that preserved its relative
    /// order are removed at their old index and inserted at their new one.
    Reinsert,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub move_policy: MovePolicy,
}

impl ReconcilerConfig {
    pub fn with_move_policy(move_policy: MovePolicy) -> Self {
        ReconcilerConfig { move_policy }
    }

    /// Missing fields fall back to their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
