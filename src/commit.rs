//! Per-surface commit sequencing.
//!
//! A [`SurfaceCommitter`] owns the last committed snapshot of one surface.
//! Each commit is reconciled against it, applied to the surface's view
//! hierarchy, and then replaces it, so the previous tree is released as soon
//! as the commit lands.
use crate::config::{MovePolicy, ReconcilerConfig};
use crate::diff_engine::reconcile_with;
use crate::errors::{ReconcilerError, Result};
use crate::sink::ManageChildrenQueue;
use crate::snapshot::{Snapshot, DEFAULT_COMPONENT};
use crate::surface::SurfaceMountingManager;
use crate::types::{ChildEdits, ReconcileStats, SurfaceId};
use log::debug;

#[derive(Debug, Clone)]
pub struct CommitReport {
    pub commit_number: u64,
    pub stats: ReconcileStats,
    pub edits: Vec<ChildEdits>,
}

pub struct SurfaceCommitter {
    surface_id: SurfaceId,
    committed: Snapshot,
    commit_number: u64,
    config: ReconcilerConfig,
}

impl SurfaceCommitter {
    /// Reorders are reinserted so the surface keeps the committed order.
    pub fn new(surface_id: SurfaceId) -> Self {
        Self::with_config(surface_id, ReconcilerConfig::with_move_policy(MovePolicy::Reinsert))
    }

    pub fn with_config(surface_id: SurfaceId, config: ReconcilerConfig) -> Self {
        SurfaceCommitter {
            surface_id,
            committed: Snapshot::empty(surface_id),
            commit_number: 0,
            config,
        }
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    /// Number of commits applied so far.
    pub fn commit_number(&self) -> u64 {
        self.commit_number
    }

    pub fn committed(&self) -> &Snapshot {
        &self.committed
    }

    /// Reconciles `new_tree` against the last commit and applies the edits
    /// to `surface`. On error the last committed snapshot is kept, but edits
    /// applied before the failure are not rolled back.
    pub fn commit(&mut self, new_tree: Snapshot, surface: &mut SurfaceMountingManager) -> Result<CommitReport> {
        if new_tree.root_tag() != self.surface_id {
            return Err(ReconcilerError::RootMismatch {
                expected: self.surface_id,
                actual: new_tree.root_tag(),
            });
        }
        if surface.surface_id() != self.surface_id {
            return Err(ReconcilerError::RootMismatch {
                expected: self.surface_id,
                actual: surface.surface_id(),
            });
        }

        let mut queue = ManageChildrenQueue::new();
        let stats = reconcile_with(&self.committed, &new_tree, &mut queue, &self.config);
        let edits = queue.into_batches();

        for added in edits.iter().flat_map(|batch| batch.added.iter()) {
            let component = new_tree
                .find(added.tag)
                .map_or(DEFAULT_COMPONENT, |id| new_tree.component(id));
            surface.preallocate(added.tag, component);
        }
        surface.apply_edits(&edits)?;

        self.committed = new_tree;
        self.commit_number += 1;
        debug!(
            "SurfaceCommitter: commit {} on surface [{}] applied {} edit groups",
            self.commit_number,
            self.surface_id,
            edits.len()
        );
        Ok(CommitReport {
            commit_number: self.commit_number,
            stats,
            edits,
        })
    }
}
