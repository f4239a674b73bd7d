//! Immutable tree snapshots stored in a flat arena.
//!
//! A [`Snapshot`] is produced once per commit from a [`NodeSpec`] tree. Nodes
//! are addressed by [`NodeId`] (an index into the arena) and looked up by tag
//! through an ordered index. Nodes hold no parent or previous-snapshot
//! links, so dropping a snapshot releases the whole tree.
use crate::errors::{ReconcilerError, Result};
use crate::types::Tag;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COMPONENT: &str = "View";

fn default_component() -> String {
    DEFAULT_COMPONENT.to_string()
}

fn default_materializes() -> bool {
    true
}

/// Owned description of a node tree, as handed over by the node provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: Tag,
    #[serde(default = "default_component")]
    pub component: String,
    /// `false` for virtual nodes, which have no native counterpart.
    #[serde(default = "default_materializes")]
    pub materializes: bool,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn view(tag: Tag, children: Vec<NodeSpec>) -> Self {
        NodeSpec { tag, component: default_component(), materializes: true, children }
    }

    pub fn leaf(tag: Tag) -> Self {
        NodeSpec::view(tag, Vec::new())
    }

    pub fn virtual_node(tag: Tag, children: Vec<NodeSpec>) -> Self {
        NodeSpec { tag, component: "VirtualText".to_string(), materializes: false, children }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeRecord {
    tag: Tag,
    component: String,
    materializes: bool,
    // materializes and every ancestor does too
    mounted: bool,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    nodes: Vec<NodeRecord>,
    by_tag: IndexMap<Tag, NodeId>,
    root: NodeId,
}

impl Snapshot {
    /// Flattens `spec` into an arena. Fails if any tag occurs twice.
    pub fn build(spec: &NodeSpec) -> Result<Self> {
        let mut snapshot = Snapshot {
            nodes: Vec::new(),
            by_tag: IndexMap::new(),
            root: NodeId(0),
        };
        snapshot.root = snapshot.push(spec, true)?;
        Ok(snapshot)
    }

    /// A materializing root with no children, used as the "old" side of a
    /// surface's first commit.
    pub fn empty(root_tag: Tag) -> Self {
        let mut by_tag = IndexMap::new();
        by_tag.insert(root_tag, NodeId(0));
        Snapshot {
            nodes: vec![NodeRecord {
                tag: root_tag,
                component: "RootView".to_string(),
                materializes: true,
                mounted: true,
                children: Vec::new(),
            }],
            by_tag,
            root: NodeId(0),
        }
    }

    fn push(&mut self, spec: &NodeSpec, parent_mounted: bool) -> Result<NodeId> {
        let id = NodeId(self.nodes.len() as u32);
        if self.by_tag.insert(spec.tag, id).is_some() {
            return Err(ReconcilerError::DuplicateTag { tag: spec.tag });
        }
        self.nodes.push(NodeRecord {
            tag: spec.tag,
            component: spec.component.clone(),
            materializes: spec.materializes,
            mounted: parent_mounted && spec.materializes,
            children: Vec::with_capacity(spec.children.len()),
        });

        let mounted = self.nodes[id.index()].mounted;
        let mut children = Vec::with_capacity(spec.children.len());
        for child in &spec.children {
            children.push(self.push(child, mounted)?);
        }
        self.nodes[id.index()].children = children;
        Ok(id)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_tag(&self) -> Tag {
        self.tag(self.root)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tag(&self, id: NodeId) -> Tag {
        self.nodes[id.index()].tag
    }

    pub fn component(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].component
    }

    pub fn materializes(&self, id: NodeId) -> bool {
        self.nodes[id.index()].materializes
    }

    /// True when the node and all of its ancestors materialize, i.e. the
    /// node has a native view once this snapshot is mounted.
    pub fn mounted(&self, id: NodeId) -> bool {
        self.nodes[id.index()].mounted
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn find(&self, tag: Tag) -> Option<NodeId> {
        self.by_tag.get(&tag).copied()
    }

    /// True when `tag` names a materializing node of this snapshot.
    pub fn is_materialized(&self, tag: Tag) -> bool {
        self.find(tag).is_some_and(|id| self.materializes(id))
    }

    pub fn is_mounted(&self, tag: Tag) -> bool {
        self.find(tag).is_some_and(|id| self.mounted(id))
    }

    /// Materializing children of `id`, paired with their node ids. A child's
    /// position in the returned list is its native child index.
    pub fn materialized_children(&self, id: NodeId) -> Vec<(Tag, NodeId)> {
        self.children(id)
            .iter()
            .filter(|&&child| self.materializes(child))
            .map(|&child| (self.tag(child), child))
            .collect()
    }

    /// Every node id in creation (pre-order) order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.by_tag.values().copied()
    }

    pub fn to_spec(&self) -> NodeSpec {
        self.spec_of(self.root)
    }

    fn spec_of(&self, id: NodeId) -> NodeSpec {
        let record = &self.nodes[id.index()];
        NodeSpec {
            tag: record.tag,
            component: record.component.clone(),
            materializes: record.materializes,
            children: record.children.iter().map(|&child| self.spec_of(child)).collect(),
        }
    }
}

impl TryFrom<&NodeSpec> for Snapshot {
    type Error = ReconcilerError;

    fn try_from(spec: &NodeSpec) -> Result<Self> {
        Snapshot::build(spec)
    }
}
