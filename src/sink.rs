//! Consumers of reconciler output
use crate::types::{ChildEdits, Operation, Tag, ViewAtIndex};
use log::warn;

/// Receives the reconciler's operations as they are produced.
///
/// For one parent, every `remove_at` arrives before any `insert_at`, followed
/// by that parent's `delete` calls and a single `end_parent`. `remove_at`
/// names the child found at `index` in the old child list.
pub trait OperationSink {
    fn remove_at(&mut self, parent_tag: Tag, tag: Tag, index: usize);
    fn insert_at(&mut self, parent_tag: Tag, tag: Tag, index: usize);
    fn delete(&mut self, tag: Tag);

    /// Closes the group of operations for `parent_tag`.
    fn end_parent(&mut self, _parent_tag: Tag) {}
}

impl OperationSink for Vec<Operation> {
    fn remove_at(&mut self, parent_tag: Tag, _tag: Tag, index: usize) {
        self.push(Operation::RemoveAt { parent_tag, index });
    }

    fn insert_at(&mut self, parent_tag: Tag, tag: Tag, index: usize) {
        self.push(Operation::InsertAt { parent_tag, tag, index });
    }

    fn delete(&mut self, tag: Tag) {
        self.push(Operation::DeleteSubtree { tag });
    }
}

impl<S: OperationSink + ?Sized> OperationSink for &mut S {
    fn remove_at(&mut self, parent_tag: Tag, tag: Tag, index: usize) {
        (**self).remove_at(parent_tag, tag, index);
    }

    fn insert_at(&mut self, parent_tag: Tag, tag: Tag, index: usize) {
        (**self).insert_at(parent_tag, tag, index);
    }

    fn delete(&mut self, tag: Tag) {
        (**self).delete(tag);
    }

    fn end_parent(&mut self, parent_tag: Tag) {
        (**self).end_parent(parent_tag);
    }
}

/// Groups operations into one [`ChildEdits`] per parent, the shape a view
/// hierarchy applies in a single manage-children pass.
#[derive(Debug, Default)]
pub struct ManageChildrenQueue {
    pending: Option<ChildEdits>,
    batches: Vec<ChildEdits>,
}

impl ManageChildrenQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn edits_for(&mut self, parent_tag: Tag) -> &mut ChildEdits {
        if self.pending.as_ref().is_some_and(|edits| edits.parent_tag != parent_tag) {
            self.end_parent(parent_tag);
        }
        self.pending.get_or_insert_with(|| ChildEdits::new(parent_tag))
    }

    /// Closed groups, in emission order.
    pub fn into_batches(mut self) -> Vec<ChildEdits> {
        if let Some(edits) = self.pending.take() {
            self.batches.push(edits);
        }
        self.batches
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none() && self.batches.is_empty()
    }
}

impl OperationSink for ManageChildrenQueue {
    fn remove_at(&mut self, parent_tag: Tag, tag: Tag, index: usize) {
        self.edits_for(parent_tag).removed.push(ViewAtIndex { tag, index });
    }

    fn insert_at(&mut self, parent_tag: Tag, tag: Tag, index: usize) {
        self.edits_for(parent_tag).added.push(ViewAtIndex { tag, index });
    }

    fn delete(&mut self, tag: Tag) {
        // A delete always follows the remove that opened its parent's group.
        debug_assert!(self.pending.is_some(), "delete of [{}] outside of a parent group", tag);
        match self.pending.as_mut() {
            Some(edits) => edits.deleted.push(tag),
            None => warn!("ManageChildrenQueue: dropping delete of [{}] outside of a parent group", tag),
        }
    }

    fn end_parent(&mut self, _parent_tag: Tag) {
        if let Some(edits) = self.pending.take() {
            if !edits.is_empty() {
                self.batches.push(edits);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_records_in_order() {
        let mut ops: Vec<Operation> = Vec::new();
        ops.remove_at(0, 7, 1);
        ops.insert_at(0, 5, 0);
        ops.delete(3);
        assert_eq!(
            ops,
            vec![
                Operation::RemoveAt { parent_tag: 0, index: 1 },
                Operation::InsertAt { parent_tag: 0, tag: 5, index: 0 },
                Operation::DeleteSubtree { tag: 3 },
            ]
        );
    }

    #[test]
    fn queue_groups_by_parent() {
        let mut queue = ManageChildrenQueue::new();
        queue.remove_at(1, 3, 0);
        queue.insert_at(1, 9, 2);
        queue.delete(4);
        queue.end_parent(1);
        queue.insert_at(2, 10, 0);
        queue.end_parent(2);

        let batches = queue.into_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].parent_tag, 1);
        assert_eq!(batches[0].removed, vec![ViewAtIndex { tag: 3, index: 0 }]);
        assert_eq!(batches[0].added, vec![ViewAtIndex { tag: 9, index: 2 }]);
        assert_eq!(batches[0].deleted, vec![4]);
        assert_eq!(batches[1].parent_tag, 2);
        assert_eq!(batches[1].added, vec![ViewAtIndex { tag: 10, index: 0 }]);
    }

    #[test]
    fn queue_closes_group_on_parent_switch() {
        let mut queue = ManageChildrenQueue::new();
        queue.insert_at(1, 2, 0);
        queue.insert_at(3, 4, 0);
        let batches = queue.into_batches();
        assert_eq!(batches.iter().map(|b| b.parent_tag).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside of a parent group")]
    fn queue_rejects_delete_without_group() {
        let mut queue = ManageChildrenQueue::new();
        queue.delete(4);
    }
}
