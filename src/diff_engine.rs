//! Tree reconciler: diffs two snapshots into per-parent child-list edits
use crate::config::{MovePolicy, ReconcilerConfig};
use crate::sink::OperationSink;
use crate::snapshot::{NodeId, Snapshot};
use crate::types::{Operation, ReconcileStats, Tag};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};

pub struct DiffEngine<'a, S: OperationSink + ?Sized> {
    old_tree: &'a Snapshot,
    new_tree: &'a Snapshot,
    sink: &'a mut S,
    config: ReconcilerConfig,
    stats: ReconcileStats,
}

impl<'a, S: OperationSink + ?Sized> DiffEngine<'a, S> {
    pub fn new(old_tree: &'a Snapshot, new_tree: &'a Snapshot, sink: &'a mut S) -> Self {
        Self::with_config(old_tree, new_tree, sink, ReconcilerConfig::default())
    }

    pub fn with_config(
        old_tree: &'a Snapshot,
        new_tree: &'a Snapshot,
        sink: &'a mut S,
        config: ReconcilerConfig,
    ) -> Self {
        DiffEngine {
            old_tree,
            new_tree,
            sink,
            config,
            stats: ReconcileStats::default(),
        }
    }

    /// Both snapshots must describe the same root tag.
    pub fn reconcile(mut self) -> ReconcileStats {
        let old_root = self.old_tree.root();
        let new_root = self.new_tree.root();
        debug_assert_eq!(
            self.old_tree.tag(old_root),
            self.new_tree.tag(new_root),
            "reconcile requires both snapshots to share the root tag"
        );

        if !self.old_tree.materializes(old_root) || !self.new_tree.materializes(new_root) {
            debug!(
                "DiffEngine: root [{}] is virtual, nothing to reconcile",
                self.new_tree.tag(new_root)
            );
            return self.stats;
        }

        self.diff_children(Some(old_root), new_root);
        debug!(
            "DiffEngine: reconciled root [{}]: parents={} removes={} inserts={} deletes={} reinserted={}",
            self.new_tree.tag(new_root),
            self.stats.parents_visited,
            self.stats.removes,
            self.stats.inserts,
            self.stats.deletes,
            self.stats.reinserted,
        );
        self.stats
    }

    /// Emits the edits turning the old parent's materializing children into
    /// the new parent's, then recurses into every materializing new child.
    /// `old_parent` is `None` when the new parent has no previous instance.
    fn diff_children(&mut self, old_parent: Option<NodeId>, new_parent: NodeId) {
        let parent_tag = self.new_tree.tag(new_parent);
        self.stats.parents_visited += 1;

        let old_children = old_parent
            .map(|id| self.old_tree.materialized_children(id))
            .unwrap_or_default();
        let new_children = self.new_tree.materialized_children(new_parent);
        debug_assert!(has_unique_tags(&old_children), "duplicate child tags under [{}] in old snapshot", parent_tag);
        debug_assert!(has_unique_tags(&new_children), "duplicate child tags under [{}] in new snapshot", parent_tag);

        if old_children.is_empty() && new_children.is_empty() {
            return;
        }

        let old_key_to_idx: HashMap<Tag, usize> = old_children
            .iter()
            .enumerate()
            .map(|(i, &(tag, _))| (tag, i))
            .collect();
        let new_key_to_idx: HashMap<Tag, usize> = new_children
            .iter()
            .enumerate()
            .map(|(i, &(tag, _))| (tag, i))
            .collect();

        // (old index, tag) of children leaving this parent
        let mut removed: Vec<(usize, Tag)> = Vec::new();
        let mut deleted_tags = Vec::new();
        for (index, &(tag, _)) in old_children.iter().enumerate() {
            if !new_key_to_idx.contains_key(&tag) {
                removed.push((index, tag));
                // Reparented views survive; only tags with no view in the new tree are disposed.
                if !self.new_tree.is_mounted(tag) {
                    deleted_tags.push(tag);
                }
            }
        }

        let mut inserted: Vec<(usize, Tag)> = new_children
            .iter()
            .enumerate()
            .filter(|(_, (tag, _))| !old_key_to_idx.contains_key(tag))
            .map(|(index, &(tag, _))| (index, tag))
            .collect();

        if self.config.move_policy == MovePolicy::Reinsert {
            // (old index, new index) of kept children, in new order
            let kept: Vec<(usize, usize)> = new_children
                .iter()
                .enumerate()
                .filter_map(|(new_idx, (tag, _))| old_key_to_idx.get(tag).map(|&old_idx| (old_idx, new_idx)))
                .collect();
            for (old_idx, new_idx) in moved_children(&kept) {
                removed.push((old_idx, old_children[old_idx].0));
                inserted.push((new_idx, new_children[new_idx].0));
                self.stats.reinserted += 1;
            }
            removed.sort_unstable_by_key(|&(index, _)| index);
            inserted.sort_unstable_by_key(|&(index, _)| index);
        }

        let emitted = !removed.is_empty() || !inserted.is_empty() || !deleted_tags.is_empty();
        for (index, tag) in removed {
            trace!("DiffEngine: remove [{}] from [{}] index {}", tag, parent_tag, index);
            self.sink.remove_at(parent_tag, tag, index);
            self.stats.removes += 1;
        }
        for (index, tag) in inserted {
            trace!("DiffEngine: insert [{}] -> [{}] index {}", tag, parent_tag, index);
            self.sink.insert_at(parent_tag, tag, index);
            self.stats.inserts += 1;
        }
        for tag in deleted_tags {
            trace!("DiffEngine: delete subtree [{}]", tag);
            self.sink.delete(tag);
            self.stats.deletes += 1;
        }
        if emitted {
            self.sink.end_parent(parent_tag);
        }

        for &(tag, new_child) in &new_children {
            let old_child = match old_key_to_idx.get(&tag) {
                Some(&old_idx) => Some(old_children[old_idx].1),
                // Added here: diff against its previous instance if that one
                // had a view (reparenting), otherwise against nothing.
                None => self.old_tree.find(tag).filter(|&id| self.old_tree.mounted(id)),
            };
            self.diff_children(old_child, new_child);
        }
    }
}

/// Kept children that left the longest run of children whose relative
/// order survived. Input and output pairs are `(old index, new index)`.
fn moved_children(kept: &[(usize, usize)]) -> Vec<(usize, usize)> {
    if kept.len() < 2 {
        return Vec::new();
    }
    let old_order: Vec<usize> = kept.iter().map(|&(old_idx, _)| old_idx).collect();
    let stable: HashSet<usize> = lis::longest_increasing_subsequence(&old_order).into_iter().collect();
    kept.iter()
        .enumerate()
        .filter(|(position, _)| !stable.contains(position))
        .map(|(_, &pair)| pair)
        .collect()
}

fn has_unique_tags(children: &[(Tag, NodeId)]) -> bool {
    let mut seen = HashSet::with_capacity(children.len());
    children.iter().all(|&(tag, _)| seen.insert(tag))
}

pub fn reconcile<S: OperationSink + ?Sized>(old_tree: &Snapshot, new_tree: &Snapshot, sink: &mut S) -> ReconcileStats {
    DiffEngine::new(old_tree, new_tree, sink).reconcile()
}

pub fn reconcile_with<S: OperationSink + ?Sized>(
    old_tree: &Snapshot,
    new_tree: &Snapshot,
    sink: &mut S,
    config: &ReconcilerConfig,
) -> ReconcileStats {
    DiffEngine::with_config(old_tree, new_tree, sink, config.clone()).reconcile()
}

/// Collects every operation into a vector.
pub fn diff(old_tree: &Snapshot, new_tree: &Snapshot, config: &ReconcilerConfig) -> Vec<Operation> {
    let mut operations = Vec::new();
    reconcile_with(old_tree, new_tree, &mut operations, config);
    operations
}
