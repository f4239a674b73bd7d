use mount_reconciler::{
    diff, MovePolicy, NodeSpec, Operation, ReconcilerConfig, Snapshot, SurfaceCommitter, SurfaceMountingManager, Tag,
};
use proptest::prelude::*;
use proptest::sample::Index;

const ROOT: Tag = 0;

/// Attaches `tags[i]` below the node picked by `parents[i]` among the root
/// and the nodes placed before it.
fn assemble(tags: &[Tag], parents: &[Index], materializes: &[bool]) -> NodeSpec {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); tags.len() + 1];
    for (i, parent) in parents.iter().enumerate() {
        children[parent.index(i + 1)].push(i + 1);
    }

    fn build(position: usize, tags: &[Tag], materializes: &[bool], children: &[Vec<usize>]) -> NodeSpec {
        let nested = children[position]
            .iter()
            .map(|&child| build(child, tags, materializes, children))
            .collect();
        if position == 0 {
            return NodeSpec::view(ROOT, nested);
        }
        let mut spec = NodeSpec::view(tags[position - 1], nested);
        spec.materializes = materializes[position - 1];
        spec
    }

    build(0, tags, materializes, &children)
}

fn arb_tree() -> impl Strategy<Value = NodeSpec> {
    prop::sample::subsequence((1..=16).collect::<Vec<Tag>>(), 0..=12)
        .prop_shuffle()
        .prop_flat_map(|tags| {
            let len = tags.len();
            (
                Just(tags),
                prop::collection::vec(any::<Index>(), len),
                prop::collection::vec(prop::bool::weighted(0.8), len),
            )
        })
        .prop_map(|(tags, parents, materializes)| assemble(&tags, &parents, &materializes))
}

fn snap(spec: &NodeSpec) -> Snapshot {
    Snapshot::build(spec).unwrap()
}

/// Parent/child pairs of a tree, in pre-order.
fn edges(spec: &NodeSpec) -> Vec<(Tag, Tag)> {
    fn walk(spec: &NodeSpec, out: &mut Vec<(Tag, Tag)>) {
        for child in &spec.children {
            out.push((spec.tag, child.tag));
            walk(child, out);
        }
    }
    let mut out = Vec::new();
    walk(spec, &mut out);
    out
}

/// Parent/child pairs of the views a tree mounts: virtual nodes and
/// everything below them are left out.
fn mounted_edges(spec: &NodeSpec) -> Vec<(Tag, Tag)> {
    fn walk(spec: &NodeSpec, out: &mut Vec<(Tag, Tag)>) {
        for child in spec.children.iter().filter(|child| child.materializes) {
            out.push((spec.tag, child.tag));
            walk(child, out);
        }
    }
    let mut out = Vec::new();
    walk(spec, &mut out);
    out
}

fn child_tags(snapshot: &Snapshot, tag: Tag) -> Option<Vec<Tag>> {
    let id = snapshot.find(tag).filter(|&id| snapshot.mounted(id))?;
    Some(snapshot.materialized_children(id).into_iter().map(|(tag, _)| tag).collect())
}

/// Splits a flat operation list into per-parent groups, keeping each
/// group's deletes with it.
fn group_by_parent(operations: &[Operation]) -> Vec<(Tag, Vec<Operation>)> {
    let mut groups: Vec<(Tag, Vec<Operation>)> = Vec::new();
    for &operation in operations {
        match operation.parent_tag() {
            Some(parent) if groups.last().is_some_and(|(current, _)| *current == parent) => {
                groups.last_mut().unwrap().1.push(operation)
            }
            Some(parent) => groups.push((parent, vec![operation])),
            None => groups.last_mut().expect("delete before any parent group").1.push(operation),
        }
    }
    groups
}

/// Applies one group to the old child list of its parent.
fn replay(old_children: Vec<Tag>, group: &[Operation]) -> Vec<Tag> {
    let mut removed: Vec<usize> = group
        .iter()
        .filter_map(|op| match op {
            Operation::RemoveAt { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    removed.sort_unstable_by(|a, b| b.cmp(a));
    let mut children = old_children;
    for index in removed {
        children.remove(index);
    }
    for op in group {
        if let Operation::InsertAt { tag, index, .. } = *op {
            children.insert(index, tag);
        }
    }
    children
}

fn sorted(mut tags: Vec<Tag>) -> Vec<Tag> {
    tags.sort_unstable();
    tags
}

fn reinsert() -> ReconcilerConfig {
    ReconcilerConfig::with_move_policy(MovePolicy::Reinsert)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn identical_trees_produce_nothing(tree in arb_tree()) {
        let snapshot = snap(&tree);
        prop_assert!(diff(&snapshot, &snapshot, &ReconcilerConfig::default()).is_empty());
        prop_assert!(diff(&snapshot, &snapshot, &reinsert()).is_empty());
    }

    #[test]
    fn operations_only_touch_mounted_views(old in arb_tree(), new in arb_tree()) {
        let (old, new) = (snap(&old), snap(&new));
        for operation in diff(&old, &new, &reinsert()) {
            match operation {
                Operation::RemoveAt { parent_tag, .. } => {
                    prop_assert!(old.is_mounted(parent_tag) && new.is_mounted(parent_tag));
                }
                Operation::InsertAt { parent_tag, tag, .. } => {
                    prop_assert!(new.is_mounted(parent_tag) && new.is_mounted(tag));
                }
                Operation::DeleteSubtree { tag } => {
                    prop_assert!(old.is_mounted(tag) && !new.is_mounted(tag));
                }
            }
        }
    }

    #[test]
    fn indices_address_the_right_child_lists(old in arb_tree(), new in arb_tree()) {
        let (old, new) = (snap(&old), snap(&new));
        for operation in diff(&old, &new, &ReconcilerConfig::default()) {
            match operation {
                Operation::RemoveAt { parent_tag, index } => {
                    let old_children = child_tags(&old, parent_tag).unwrap_or_default();
                    prop_assert!(index < old_children.len());
                    let removed_tag = old_children[index];
                    let still_child = child_tags(&new, parent_tag).unwrap_or_default().contains(&removed_tag);
                    prop_assert!(!still_child);
                }
                Operation::InsertAt { parent_tag, tag, index } => {
                    let new_children = child_tags(&new, parent_tag).unwrap_or_default();
                    prop_assert_eq!(new_children.get(index), Some(&tag));
                }
                Operation::DeleteSubtree { .. } => {}
            }
        }
    }

    #[test]
    fn each_parent_group_is_ordered(old in arb_tree(), new in arb_tree()) {
        let (old, new) = (snap(&old), snap(&new));
        let operations = diff(&old, &new, &reinsert());
        let groups = group_by_parent(&operations);
        let mut parents: Vec<Tag> = groups.iter().map(|(parent, _)| *parent).collect();
        parents.sort_unstable();
        parents.dedup();
        prop_assert_eq!(parents.len(), groups.len());

        for (_, group) in &groups {
            let rank = |op: &Operation| match op {
                Operation::RemoveAt { .. } => 0,
                Operation::InsertAt { .. } => 1,
                Operation::DeleteSubtree { .. } => 2,
            };
            prop_assert!(group.windows(2).all(|pair| rank(&pair[0]) <= rank(&pair[1])));
            let removes: Vec<usize> = group.iter().filter_map(|op| match op {
                Operation::RemoveAt { index, .. } => Some(*index),
                _ => None,
            }).collect();
            prop_assert!(removes.windows(2).all(|pair| pair[0] < pair[1]));
            let inserts: Vec<usize> = group.iter().filter_map(|op| match op {
                Operation::InsertAt { index, .. } => Some(*index),
                _ => None,
            }).collect();
            prop_assert!(inserts.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn replaying_groups_rebuilds_child_lists(old in arb_tree(), new in arb_tree()) {
        let (old, new) = (snap(&old), snap(&new));

        for (parent, group) in group_by_parent(&diff(&old, &new, &reinsert())) {
            let expected = child_tags(&new, parent).unwrap_or_default();
            let before = child_tags(&old, parent).unwrap_or_default();
            prop_assert_eq!(replay(before, &group), expected);
        }

        for (parent, group) in group_by_parent(&diff(&old, &new, &ReconcilerConfig::default())) {
            let expected = child_tags(&new, parent).unwrap_or_default();
            let before = child_tags(&old, parent).unwrap_or_default();
            prop_assert_eq!(sorted(replay(before, &group)), sorted(expected));
        }
    }

    #[test]
    fn committing_mounts_exactly_the_new_tree(old in arb_tree(), new in arb_tree()) {
        let mut surface = SurfaceMountingManager::new(ROOT);
        let mut committer = SurfaceCommitter::with_config(ROOT, reinsert());
        committer.commit(snap(&old), &mut surface).unwrap();
        prop_assert_eq!(edges(&surface.hierarchy().unwrap()), mounted_edges(&old));

        committer.commit(snap(&new), &mut surface).unwrap();
        let expected = mounted_edges(&new);
        prop_assert_eq!(edges(&surface.hierarchy().unwrap()), expected.clone());
        // no view outlives its place in the tree
        prop_assert_eq!(surface.view_count(), expected.len() + 1);
    }

    #[test]
    fn successive_commits_keep_the_surface_in_order(trees in prop::collection::vec(arb_tree(), 3..6)) {
        let mut surface = SurfaceMountingManager::new(ROOT);
        let mut committer = SurfaceCommitter::new(ROOT);
        for tree in &trees {
            committer.commit(snap(tree), &mut surface).unwrap();
            let expected = mounted_edges(tree);
            prop_assert_eq!(edges(&surface.hierarchy().unwrap()), expected.clone());
            prop_assert_eq!(surface.view_count(), expected.len() + 1);
        }
    }

    #[test]
    fn ignoring_reorders_still_mounts_the_same_views(trees in prop::collection::vec(arb_tree(), 3..6)) {
        let mut surface = SurfaceMountingManager::new(ROOT);
        let mut committer = SurfaceCommitter::with_config(ROOT, ReconcilerConfig::default());
        for tree in &trees {
            committer.commit(snap(tree), &mut surface).unwrap();
            let mut mounted = edges(&surface.hierarchy().unwrap());
            let mut expected = mounted_edges(tree);
            mounted.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(surface.view_count(), expected.len() + 1);
            prop_assert_eq!(mounted, expected);
        }
    }
}

#[test]
fn swapping_parent_and_child() {
    let old = snap(&NodeSpec::view(ROOT, vec![NodeSpec::view(1, vec![NodeSpec::leaf(2)])]));
    let new = snap(&NodeSpec::view(ROOT, vec![NodeSpec::view(2, vec![NodeSpec::leaf(1)])]));
    assert_eq!(
        diff(&old, &new, &ReconcilerConfig::default()),
        vec![
            Operation::RemoveAt { parent_tag: ROOT, index: 0 },
            Operation::InsertAt { parent_tag: ROOT, tag: 2, index: 0 },
            Operation::InsertAt { parent_tag: 2, tag: 1, index: 0 },
            Operation::RemoveAt { parent_tag: 1, index: 0 },
        ]
    );

    let mut surface = SurfaceMountingManager::new(ROOT);
    let mut committer = SurfaceCommitter::new(ROOT);
    committer.commit(old, &mut surface).unwrap();
    committer.commit(new, &mut surface).unwrap();
    assert_eq!(surface.children_of(ROOT), Some(&[2][..]));
    assert_eq!(surface.children_of(2), Some(&[1][..]));
    assert_eq!(surface.children_of(1), Some(&[][..]));
}

#[test]
fn view_hidden_under_a_virtual_parent_is_disposed() {
    let old = snap(&NodeSpec::view(ROOT, vec![NodeSpec::leaf(1), NodeSpec::leaf(2)]));
    let new = snap(&NodeSpec::view(ROOT, vec![NodeSpec::virtual_node(1, vec![NodeSpec::leaf(2)])]));
    assert_eq!(
        diff(&old, &new, &ReconcilerConfig::default()),
        vec![
            Operation::RemoveAt { parent_tag: ROOT, index: 0 },
            Operation::RemoveAt { parent_tag: ROOT, index: 1 },
            Operation::DeleteSubtree { tag: 1 },
            Operation::DeleteSubtree { tag: 2 },
        ]
    );
}

#[test]
fn view_leaving_a_virtual_parent_is_created_fresh() {
    // 2 never had a view, so 3 below it must be inserted too
    let old = snap(&NodeSpec::view(
        ROOT,
        vec![NodeSpec::virtual_node(1, vec![NodeSpec::view(2, vec![NodeSpec::leaf(3)])])],
    ));
    let new = snap(&NodeSpec::view(ROOT, vec![NodeSpec::view(2, vec![NodeSpec::leaf(3)])]));
    assert_eq!(
        diff(&old, &new, &ReconcilerConfig::default()),
        vec![
            Operation::InsertAt { parent_tag: ROOT, tag: 2, index: 0 },
            Operation::InsertAt { parent_tag: 2, tag: 3, index: 0 },
        ]
    );
}

#[test]
fn reorder_then_removal_keeps_the_survivor_mounted() {
    let mut surface = SurfaceMountingManager::new(1);
    let mut committer = SurfaceCommitter::new(1);
    for children in [&[2, 3][..], &[3, 2][..], &[3][..]] {
        let tree = NodeSpec::view(1, children.iter().map(|&tag| NodeSpec::leaf(tag)).collect());
        committer.commit(snap(&tree), &mut surface).unwrap();
        assert_eq!(surface.children_of(1), Some(children));
    }
    assert!(!surface.contains(2));
}
