//! In-memory view hierarchy for one surface, driven by mount instructions
//! and by the reconciler's child edits.
use crate::errors::{ReconcilerError, Result};
use crate::snapshot::NodeSpec;
use crate::types::{ChildEdits, EdgeInsets, EventEmitterHandle, LayoutFrame, SurfaceId, Tag};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use serde_json::Value;

/// Mutations a batch of mount instructions is applied to.
pub trait MountingSink {
    fn create_view(
        &mut self,
        tag: Tag,
        component_name: &str,
        props: Option<Value>,
        state: Option<Value>,
        event_emitter: Option<EventEmitterHandle>,
        is_layoutable: bool,
    ) -> Result<()>;
    fn delete_view(&mut self, tag: Tag) -> Result<()>;
    fn add_view_at(&mut self, parent_tag: Tag, tag: Tag, index: usize) -> Result<()>;
    fn remove_view_at(&mut self, tag: Tag, parent_tag: Tag, index: usize) -> Result<()>;
    fn remove_delete_tree_at(&mut self, tag: Tag, parent_tag: Tag, index: usize) -> Result<()>;
    fn update_props(&mut self, tag: Tag, props: Option<Value>) -> Result<()>;
    fn update_state(&mut self, tag: Tag, state: Option<Value>) -> Result<()>;
    fn update_layout(
        &mut self,
        tag: Tag,
        parent_tag: Tag,
        frame: LayoutFrame,
        display_type: i32,
        layout_direction: i32,
    ) -> Result<()>;
    fn update_padding(&mut self, tag: Tag, padding: EdgeInsets) -> Result<()>;
    fn update_overflow_inset(&mut self, tag: Tag, overflow_inset: EdgeInsets) -> Result<()>;
    fn update_event_emitter(&mut self, tag: Tag, event_emitter: Option<EventEmitterHandle>) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub tag: Tag,
    pub component_name: String,
    pub is_root: bool,
    pub is_layoutable: bool,
    pub parent: Option<Tag>,
    pub children: Vec<Tag>,
    pub props: Option<Value>,
    pub state: Option<Value>,
    pub event_emitter: Option<EventEmitterHandle>,
    pub frame: Option<LayoutFrame>,
    pub display_type: i32,
    pub layout_direction: i32,
    pub padding: EdgeInsets,
    pub overflow_inset: EdgeInsets,
}

impl ViewState {
    fn new(tag: Tag, component_name: &str) -> Self {
        ViewState {
            tag,
            component_name: component_name.to_string(),
            ..Default::default()
        }
    }
}

/// Applies a props update on top of the current props. Keys set to `null`
/// are reset; anything that is not an object replaces the whole value.
fn merge_props(current: &mut Option<Value>, update: Value) {
    match (current.as_mut(), update) {
        (Some(Value::Object(existing)), Value::Object(changes)) => {
            for (key, value) in changes {
                if value.is_null() {
                    existing.remove(&key);
                } else {
                    existing.insert(key, value);
                }
            }
        }
        (_, update) => *current = Some(update),
    }
}

pub struct SurfaceMountingManager {
    surface_id: SurfaceId,
    views: IndexMap<Tag, ViewState>,
    stopped: bool,
}

impl SurfaceMountingManager {
    /// The root view is created with `surface_id` as its tag.
    pub fn new(surface_id: SurfaceId) -> Self {
        let mut views = IndexMap::new();
        let mut root = ViewState::new(surface_id, "RootView");
        root.is_root = true;
        views.insert(surface_id, root);
        SurfaceMountingManager {
            surface_id,
            views,
            stopped: false,
        }
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn root_tag(&self) -> Tag {
        self.surface_id
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Drops every view. Later operations on this surface are ignored.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        debug!(
            "SurfaceMountingManager: stopping surface [{}] with {} views",
            self.surface_id,
            self.views.len()
        );
        self.stopped = true;
        self.views.clear();
    }

    pub fn view(&self, tag: Tag) -> Option<&ViewState> {
        self.views.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.views.contains_key(&tag)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn children_of(&self, tag: Tag) -> Option<&[Tag]> {
        self.views.get(&tag).map(|view| view.children.as_slice())
    }

    fn view_mut(&mut self, tag: Tag) -> Result<&mut ViewState> {
        self.views.get_mut(&tag).ok_or(ReconcilerError::ViewNotFound { tag })
    }

    /// Creates a view unless the tag is already known.
    pub fn preallocate(&mut self, tag: Tag, component_name: &str) {
        if self.stopped || self.views.contains_key(&tag) {
            return;
        }
        trace!("SurfaceMountingManager: preallocate [{}] {}", tag, component_name);
        self.views.insert(tag, ViewState::new(tag, component_name));
    }

    /// Applies one parent's reconciler edits: removes from the highest old
    /// index down, inserts in ascending final index, then subtree disposals.
    /// A removed child is looked up by tag when it is not at its index.
    pub fn manage_children(&mut self, edits: &ChildEdits) -> Result<()> {
        self.apply_edits(std::slice::from_ref(edits))
    }

    /// Applies the edits of a whole reconciliation. Every parent's removes
    /// and inserts land before any subtree is disposed, so a view moved out
    /// of a deleted subtree is already attached to its new parent.
    pub fn apply_edits(&mut self, batches: &[ChildEdits]) -> Result<()> {
        if self.stopped {
            debug!("SurfaceMountingManager: surface [{}] stopped, skipping manageChildren", self.surface_id);
            return Ok(());
        }
        for edits in batches {
            self.apply_structure(edits)?;
        }
        for edits in batches {
            for &tag in &edits.deleted {
                self.delete_subtree(tag);
            }
        }
        Ok(())
    }

    fn apply_structure(&mut self, edits: &ChildEdits) -> Result<()> {
        let parent_tag = edits.parent_tag;

        let mut removed = edits.removed.clone();
        removed.sort_unstable_by(|a, b| b.index.cmp(&a.index));
        for view in removed {
            match self.locate_child(parent_tag, view.tag, view.index)? {
                Some(index) => {
                    self.detach_at(parent_tag, index)?;
                }
                // Already re-attached elsewhere by an earlier insert.
                None if self.views.get(&view.tag).is_some_and(|child| child.parent != Some(parent_tag)) => {
                    trace!("SurfaceMountingManager: [{}] already left [{}]", view.tag, parent_tag);
                }
                None => return Err(ReconcilerError::ChildNotFound { parent_tag, tag: view.tag }),
            }
        }

        let mut added = edits.added.clone();
        added.sort_unstable_by_key(|view| view.index);
        for view in added {
            self.add_view_at(parent_tag, view.tag, view.index)?;
        }
        Ok(())
    }

    /// Position of `tag` among the children of `parent_tag`, checking
    /// `index` first.
    fn locate_child(&self, parent_tag: Tag, tag: Tag, index: usize) -> Result<Option<usize>> {
        let parent = self
            .views
            .get(&parent_tag)
            .ok_or(ReconcilerError::ViewNotFound { tag: parent_tag })?;
        if parent.children.get(index) == Some(&tag) {
            return Ok(Some(index));
        }
        let found = parent.children.iter().position(|&child| child == tag);
        if let Some(found) = found {
            warn!(
                "SurfaceMountingManager: tried to remove [{}] from [{}] at index {}, found it at {}",
                tag, parent_tag, index, found
            );
        }
        Ok(found)
    }

    fn detach_at(&mut self, parent_tag: Tag, index: usize) -> Result<Tag> {
        let parent = self.view_mut(parent_tag)?;
        let len = parent.children.len();
        if index >= len {
            return Err(ReconcilerError::IndexOutOfBounds { parent_tag, index, len });
        }
        let tag = parent.children.remove(index);
        if let Some(child) = self.views.get_mut(&tag) {
            // A reparented child may already point at its new parent.
            if child.parent == Some(parent_tag) {
                child.parent = None;
            }
        }
        Ok(tag)
    }

    /// Deletes `tag` and every descendant still attached beneath it.
    /// Descendants that were re-attached elsewhere survive.
    pub fn delete_subtree(&mut self, tag: Tag) {
        let mut pending = vec![tag];
        while let Some(current) = pending.pop() {
            let Some(view) = self.views.shift_remove(&current) else {
                continue;
            };
            if let Some(parent_tag) = view.parent {
                if let Some(parent) = self.views.get_mut(&parent_tag) {
                    parent.children.retain(|&child| child != current);
                }
            }
            for child in view.children {
                if self.views.get(&child).is_some_and(|state| state.parent == Some(current)) {
                    pending.push(child);
                }
            }
        }
    }

    /// Current hierarchy below `tag` as a node tree.
    pub fn hierarchy_of(&self, tag: Tag) -> Option<NodeSpec> {
        let view = self.views.get(&tag)?;
        let children = view
            .children
            .iter()
            .filter_map(|&child| self.hierarchy_of(child))
            .collect();
        Some(NodeSpec::view(tag, children).with_component(view.component_name.clone()))
    }

    pub fn hierarchy(&self) -> Option<NodeSpec> {
        self.hierarchy_of(self.surface_id)
    }
}

impl MountingSink for SurfaceMountingManager {
    fn create_view(
        &mut self,
        tag: Tag,
        component_name: &str,
        props: Option<Value>,
        state: Option<Value>,
        event_emitter: Option<EventEmitterHandle>,
        is_layoutable: bool,
    ) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        if self.views.contains_key(&tag) {
            debug!("SurfaceMountingManager: view [{}] already exists, ignoring create", tag);
            return Ok(());
        }
        let mut view = ViewState::new(tag, component_name);
        view.props = props;
        view.state = state;
        view.event_emitter = event_emitter;
        view.is_layoutable = is_layoutable;
        self.views.insert(tag, view);
        Ok(())
    }

    fn delete_view(&mut self, tag: Tag) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        let Some(view) = self.views.shift_remove(&tag) else {
            warn!("SurfaceMountingManager: unable to find view [{}] to delete, ignoring", tag);
            return Ok(());
        };
        if let Some(parent) = view.parent.and_then(|parent_tag| self.views.get_mut(&parent_tag)) {
            parent.children.retain(|&child| child != tag);
        }
        for child in view.children {
            if let Some(state) = self.views.get_mut(&child) {
                if state.parent == Some(tag) {
                    state.parent = None;
                }
            }
        }
        Ok(())
    }

    fn add_view_at(&mut self, parent_tag: Tag, tag: Tag, index: usize) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        let previous = self.views.get(&tag).ok_or(ReconcilerError::ViewNotFound { tag })?.parent;
        if !self.views.contains_key(&parent_tag) {
            return Err(ReconcilerError::ViewNotFound { tag: parent_tag });
        }
        if let Some(previous) = previous {
            warn!(
                "SurfaceMountingManager: view [{}] already has parent [{}], detaching it before adding to [{}]",
                tag, previous, parent_tag
            );
            if let Some(old_parent) = self.views.get_mut(&previous) {
                old_parent.children.retain(|&child| child != tag);
            }
            self.view_mut(tag)?.parent = None;
        }

        let parent = self.view_mut(parent_tag)?;
        let len = parent.children.len();
        if index > len {
            return Err(ReconcilerError::IndexOutOfBounds { parent_tag, index, len });
        }
        parent.children.insert(index, tag);
        self.view_mut(tag)?.parent = Some(parent_tag);
        Ok(())
    }

    fn remove_view_at(&mut self, tag: Tag, parent_tag: Tag, index: usize) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        let Some(actual_index) = self.locate_child(parent_tag, tag, index)? else {
            return Err(ReconcilerError::ChildNotFound { parent_tag, tag });
        };
        self.detach_at(parent_tag, actual_index).map(|_| ())
    }

    fn remove_delete_tree_at(&mut self, tag: Tag, parent_tag: Tag, index: usize) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.remove_view_at(tag, parent_tag, index)?;
        self.delete_subtree(tag);
        Ok(())
    }

    fn update_props(&mut self, tag: Tag, props: Option<Value>) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        let view = self.view_mut(tag)?;
        if let Some(props) = props {
            merge_props(&mut view.props, props);
        }
        Ok(())
    }

    fn update_state(&mut self, tag: Tag, state: Option<Value>) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.view_mut(tag)?.state = state;
        Ok(())
    }

    fn update_layout(
        &mut self,
        tag: Tag,
        parent_tag: Tag,
        frame: LayoutFrame,
        display_type: i32,
        layout_direction: i32,
    ) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        trace!("SurfaceMountingManager: layout [{}] in [{}]: {:?}", tag, parent_tag, frame);
        let view = self.view_mut(tag)?;
        view.frame = Some(frame);
        view.display_type = display_type;
        view.layout_direction = layout_direction;
        Ok(())
    }

    fn update_padding(&mut self, tag: Tag, padding: EdgeInsets) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.view_mut(tag)?.padding = padding;
        Ok(())
    }

    fn update_overflow_inset(&mut self, tag: Tag, overflow_inset: EdgeInsets) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.view_mut(tag)?.overflow_inset = overflow_inset;
        Ok(())
    }

    fn update_event_emitter(&mut self, tag: Tag, event_emitter: Option<EventEmitterHandle>) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        match self.views.get_mut(&tag) {
            Some(view) => view.event_emitter = event_emitter,
            None => debug!("SurfaceMountingManager: no view [{}] for event emitter update", tag),
        }
        Ok(())
    }
}
