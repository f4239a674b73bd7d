//! Plain data shared by the reconciler, the batch codec and the view registry
use serde::{Deserialize, Serialize};

/// Identity of a view. Unique within one snapshot, stable across snapshots.
pub type Tag = i32;

/// Identity of a surface. The surface's root view uses the same number as its tag.
pub type SurfaceId = i32;

/// Opaque handle to a host-side event emitter.
pub type EventEmitterHandle = u64;

/// Child-list mutation produced by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    RemoveAt { parent_tag: Tag, index: usize },
    InsertAt { parent_tag: Tag, tag: Tag, index: usize },
    DeleteSubtree { tag: Tag },
}

impl Operation {
    /// Parent whose child list this operation edits, if any.
    pub fn parent_tag(&self) -> Option<Tag> {
        match self {
            Operation::RemoveAt { parent_tag, .. } | Operation::InsertAt { parent_tag, .. } => {
                Some(*parent_tag)
            }
            Operation::DeleteSubtree { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewAtIndex {
    pub tag: Tag,
    pub index: usize,
}

/// Every edit the reconciler emitted for one parent: removes against the old
/// child list, inserts against the final one, then subtree disposals.
/// Removes carry the child's tag so the applier can check the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEdits {
    pub parent_tag: Tag,
    pub removed: Vec<ViewAtIndex>,
    pub added: Vec<ViewAtIndex>,
    pub deleted: Vec<Tag>,
}

impl ChildEdits {
    pub fn new(parent_tag: Tag) -> Self {
        ChildEdits { parent_tag, ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Frame in physical pixels, already scaled by the producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutFrame {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Counters collected during one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub parents_visited: usize,
    pub removes: usize,
    pub inserts: usize,
    pub deletes: usize,
    pub reinserted: usize,
}

impl ReconcileStats {
    pub fn total_operations(&self) -> usize {
        self.removes + self.inserts + self.deletes
    }
}
