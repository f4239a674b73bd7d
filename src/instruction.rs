//! Mount instruction catalogue and the bit-exact record layout.
//!
//! A record starts with a type word. Bit 0 ([`INSTRUCTION_FLAG_MULTIPLE`])
//! means the next word is a repeat count `n`; otherwise `n = 1`. Each of the
//! `n` repetitions then takes a fixed number of int words and object slots,
//! given by [`INSTRUCTION_TABLE`].
use crate::errors::{ReconcilerError, Result};
use crate::surface::MountingSink;
use crate::types::{EdgeInsets, EventEmitterHandle, LayoutFrame, Tag};
use phf::phf_map;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INSTRUCTION_FLAG_MULTIPLE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum InstructionKind {
    Create = 2,
    Delete = 4,
    Insert = 8,
    Remove = 16,
    UpdateProps = 32,
    UpdateState = 64,
    UpdateLayout = 128,
    UpdateEventEmitter = 256,
    UpdatePadding = 512,
    UpdateOverflowInset = 1024,
    RemoveDeleteTree = 2048,
}

impl InstructionKind {
    pub const ALL: [InstructionKind; 11] = [
        InstructionKind::Create,
        InstructionKind::Delete,
        InstructionKind::Insert,
        InstructionKind::Remove,
        InstructionKind::UpdateProps,
        InstructionKind::UpdateState,
        InstructionKind::UpdateLayout,
        InstructionKind::UpdateEventEmitter,
        InstructionKind::UpdatePadding,
        InstructionKind::UpdateOverflowInset,
        InstructionKind::RemoveDeleteTree,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// `(int words, object slots)` taken by one repetition.
    pub fn layout(self) -> (usize, usize) {
        lookup(self.code()).map_or((0, 0), |spec| (spec.int_words, spec.object_slots))
    }
}

/// One entry of the decoder table. `decode` receives exactly `int_words`
/// ints and `object_slots` objects; `object_offset` is only used in errors.
pub struct InstructionSpec {
    pub kind: InstructionKind,
    pub int_words: usize,
    pub object_slots: usize,
    pub decode: fn(ints: &[i32], objects: &[ObjectSlot], object_offset: usize) -> Result<MountInstruction>,
}

pub static INSTRUCTION_TABLE: phf::Map<i32, InstructionSpec> = phf_map! {
    2i32 => InstructionSpec { kind: InstructionKind::Create, int_words: 2, object_slots: 4, decode: decode_create },
    4i32 => InstructionSpec { kind: InstructionKind::Delete, int_words: 1, object_slots: 0, decode: decode_delete },
    8i32 => InstructionSpec { kind: InstructionKind::Insert, int_words: 3, object_slots: 0, decode: decode_insert },
    16i32 => InstructionSpec { kind: InstructionKind::Remove, int_words: 3, object_slots: 0, decode: decode_remove },
    32i32 => InstructionSpec { kind: InstructionKind::UpdateProps, int_words: 1, object_slots: 1, decode: decode_update_props },
    64i32 => InstructionSpec { kind: InstructionKind::UpdateState, int_words: 1, object_slots: 1, decode: decode_update_state },
    128i32 => InstructionSpec { kind: InstructionKind::UpdateLayout, int_words: 8, object_slots: 0, decode: decode_update_layout },
    256i32 => InstructionSpec { kind: InstructionKind::UpdateEventEmitter, int_words: 1, object_slots: 1, decode: decode_update_event_emitter },
    512i32 => InstructionSpec { kind: InstructionKind::UpdatePadding, int_words: 5, object_slots: 0, decode: decode_update_padding },
    1024i32 => InstructionSpec { kind: InstructionKind::UpdateOverflowInset, int_words: 5, object_slots: 0, decode: decode_update_overflow_inset },
    2048i32 => InstructionSpec { kind: InstructionKind::RemoveDeleteTree, int_words: 3, object_slots: 0, decode: decode_remove_delete_tree },
};

/// Table entry for a type code with the MULTIPLE flag already stripped.
pub fn lookup(code: i32) -> Option<&'static InstructionSpec> {
    INSTRUCTION_TABLE.get(&code)
}

/// Entry of the object buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ObjectSlot {
    Null,
    String(String),
    Map(Value),
    EventEmitter(EventEmitterHandle),
}

impl ObjectSlot {
    fn describe(&self) -> &'static str {
        match self {
            ObjectSlot::Null => "null",
            ObjectSlot::String(_) => "string",
            ObjectSlot::Map(_) => "map",
            ObjectSlot::EventEmitter(_) => "event emitter",
        }
    }

    fn from_map(value: &Option<Value>) -> ObjectSlot {
        value.clone().map_or(ObjectSlot::Null, ObjectSlot::Map)
    }

    fn from_emitter(handle: Option<EventEmitterHandle>) -> ObjectSlot {
        handle.map_or(ObjectSlot::Null, ObjectSlot::EventEmitter)
    }
}

/// A decoded mount instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MountInstruction {
    Create {
        tag: Tag,
        is_layoutable: bool,
        component_name: String,
        props: Option<Value>,
        state: Option<Value>,
        event_emitter: Option<EventEmitterHandle>,
    },
    Delete { tag: Tag },
    Insert { tag: Tag, parent_tag: Tag, index: usize },
    Remove { tag: Tag, parent_tag: Tag, index: usize },
    UpdateProps { tag: Tag, props: Option<Value> },
    UpdateState { tag: Tag, state: Option<Value> },
    UpdateLayout {
        tag: Tag,
        parent_tag: Tag,
        frame: LayoutFrame,
        display_type: i32,
        layout_direction: i32,
    },
    UpdateEventEmitter { tag: Tag, event_emitter: Option<EventEmitterHandle> },
    UpdatePadding { tag: Tag, padding: EdgeInsets },
    UpdateOverflowInset { tag: Tag, overflow_inset: EdgeInsets },
    RemoveDeleteTree { tag: Tag, parent_tag: Tag, index: usize },
}

impl MountInstruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            MountInstruction::Create { .. } => InstructionKind::Create,
            MountInstruction::Delete { .. } => InstructionKind::Delete,
            MountInstruction::Insert { .. } => InstructionKind::Insert,
            MountInstruction::Remove { .. } => InstructionKind::Remove,
            MountInstruction::UpdateProps { .. } => InstructionKind::UpdateProps,
            MountInstruction::UpdateState { .. } => InstructionKind::UpdateState,
            MountInstruction::UpdateLayout { .. } => InstructionKind::UpdateLayout,
            MountInstruction::UpdateEventEmitter { .. } => InstructionKind::UpdateEventEmitter,
            MountInstruction::UpdatePadding { .. } => InstructionKind::UpdatePadding,
            MountInstruction::UpdateOverflowInset { .. } => InstructionKind::UpdateOverflowInset,
            MountInstruction::RemoveDeleteTree { .. } => InstructionKind::RemoveDeleteTree,
        }
    }

    pub fn tag(&self) -> Tag {
        match self {
            MountInstruction::Create { tag, .. }
            | MountInstruction::Delete { tag }
            | MountInstruction::Insert { tag, .. }
            | MountInstruction::Remove { tag, .. }
            | MountInstruction::UpdateProps { tag, .. }
            | MountInstruction::UpdateState { tag, .. }
            | MountInstruction::UpdateLayout { tag, .. }
            | MountInstruction::UpdateEventEmitter { tag, .. }
            | MountInstruction::UpdatePadding { tag, .. }
            | MountInstruction::UpdateOverflowInset { tag, .. }
            | MountInstruction::RemoveDeleteTree { tag, .. } => *tag,
        }
    }

    /// Appends this instruction's payload (without the type word). Fails if
    /// a child index does not fit in an int word.
    pub fn write_payload(&self, ints: &mut Vec<i32>, objects: &mut Vec<ObjectSlot>) -> Result<()> {
        match self {
            MountInstruction::Create {
                tag,
                is_layoutable,
                component_name,
                props,
                state,
                event_emitter,
            } => {
                ints.extend_from_slice(&[*tag, i32::from(*is_layoutable)]);
                objects.push(ObjectSlot::String(component_name.clone()));
                objects.push(ObjectSlot::from_map(props));
                objects.push(ObjectSlot::from_map(state));
                objects.push(ObjectSlot::from_emitter(*event_emitter));
            }
            MountInstruction::Delete { tag } => ints.push(*tag),
            MountInstruction::Insert { tag, parent_tag, index }
            | MountInstruction::Remove { tag, parent_tag, index }
            | MountInstruction::RemoveDeleteTree { tag, parent_tag, index } => {
                ints.extend_from_slice(&[*tag, *parent_tag, int_word("index", *index)?]);
            }
            MountInstruction::UpdateProps { tag, props } => {
                ints.push(*tag);
                objects.push(ObjectSlot::from_map(props));
            }
            MountInstruction::UpdateState { tag, state } => {
                ints.push(*tag);
                objects.push(ObjectSlot::from_map(state));
            }
            MountInstruction::UpdateLayout {
                tag,
                parent_tag,
                frame,
                display_type,
                layout_direction,
            } => {
                ints.extend_from_slice(&[
                    *tag,
                    *parent_tag,
                    frame.x,
                    frame.y,
                    frame.width,
                    frame.height,
                    *display_type,
                    *layout_direction,
                ]);
            }
            MountInstruction::UpdateEventEmitter { tag, event_emitter } => {
                ints.push(*tag);
                objects.push(ObjectSlot::from_emitter(*event_emitter));
            }
            MountInstruction::UpdatePadding { tag, padding: edges }
            | MountInstruction::UpdateOverflowInset { tag, overflow_inset: edges } => {
                ints.extend_from_slice(&[*tag, edges.left, edges.top, edges.right, edges.bottom]);
            }
        }
        Ok(())
    }

    /// Applies the instruction to `sink`.
    pub fn execute<S: MountingSink + ?Sized>(self, sink: &mut S) -> Result<()> {
        match self {
            MountInstruction::Create {
                tag,
                is_layoutable,
                component_name,
                props,
                state,
                event_emitter,
            } => sink.create_view(tag, &component_name, props, state, event_emitter, is_layoutable),
            MountInstruction::Delete { tag } => sink.delete_view(tag),
            MountInstruction::Insert { tag, parent_tag, index } => sink.add_view_at(parent_tag, tag, index),
            MountInstruction::Remove { tag, parent_tag, index } => sink.remove_view_at(tag, parent_tag, index),
            MountInstruction::UpdateProps { tag, props } => sink.update_props(tag, props),
            MountInstruction::UpdateState { tag, state } => sink.update_state(tag, state),
            MountInstruction::UpdateLayout {
                tag,
                parent_tag,
                frame,
                display_type,
                layout_direction,
            } => sink.update_layout(tag, parent_tag, frame, display_type, layout_direction),
            MountInstruction::UpdateEventEmitter { tag, event_emitter } => {
                sink.update_event_emitter(tag, event_emitter)
            }
            MountInstruction::UpdatePadding { tag, padding } => sink.update_padding(tag, padding),
            MountInstruction::UpdateOverflowInset { tag, overflow_inset } => {
                sink.update_overflow_inset(tag, overflow_inset)
            }
            MountInstruction::RemoveDeleteTree { tag, parent_tag, index } => {
                sink.remove_delete_tree_at(tag, parent_tag, index)
            }
        }
    }
}

pub(crate) fn int_word(field: &'static str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| ReconcilerError::ValueOutOfRange { field, value })
}

fn child_index(value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| ReconcilerError::InvalidField { field: "index", value })
}

fn string_slot(slot: &ObjectSlot, position: usize) -> Result<String> {
    match slot {
        ObjectSlot::String(name) => Ok(name.clone()),
        other => Err(ReconcilerError::UnexpectedObject {
            slot: position,
            expected: "string",
            actual: other.describe().to_string(),
        }),
    }
}

fn map_slot(slot: &ObjectSlot, position: usize) -> Result<Option<Value>> {
    match slot {
        ObjectSlot::Null => Ok(None),
        ObjectSlot::Map(value) => Ok(Some(value.clone())),
        other => Err(ReconcilerError::UnexpectedObject {
            slot: position,
            expected: "map or null",
            actual: other.describe().to_string(),
        }),
    }
}

fn emitter_slot(slot: &ObjectSlot, position: usize) -> Result<Option<EventEmitterHandle>> {
    match slot {
        ObjectSlot::Null => Ok(None),
        ObjectSlot::EventEmitter(handle) => Ok(Some(*handle)),
        other => Err(ReconcilerError::UnexpectedObject {
            slot: position,
            expected: "event emitter or null",
            actual: other.describe().to_string(),
        }),
    }
}

fn decode_create(ints: &[i32], objects: &[ObjectSlot], offset: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::Create {
        tag: ints[0],
        is_layoutable: ints[1] != 0,
        component_name: string_slot(&objects[0], offset)?,
        props: map_slot(&objects[1], offset + 1)?,
        state: map_slot(&objects[2], offset + 2)?,
        event_emitter: emitter_slot(&objects[3], offset + 3)?,
    })
}

fn decode_delete(ints: &[i32], _: &[ObjectSlot], _: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::Delete { tag: ints[0] })
}

fn decode_insert(ints: &[i32], _: &[ObjectSlot], _: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::Insert {
        tag: ints[0],
        parent_tag: ints[1],
        index: child_index(ints[2])?,
    })
}

fn decode_remove(ints: &[i32], _: &[ObjectSlot], _: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::Remove {
        tag: ints[0],
        parent_tag: ints[1],
        index: child_index(ints[2])?,
    })
}

fn decode_remove_delete_tree(ints: &[i32], _: &[ObjectSlot], _: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::RemoveDeleteTree {
        tag: ints[0],
        parent_tag: ints[1],
        index: child_index(ints[2])?,
    })
}

fn decode_update_props(ints: &[i32], objects: &[ObjectSlot], offset: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::UpdateProps {
        tag: ints[0],
        props: map_slot(&objects[0], offset)?,
    })
}

fn decode_update_state(ints: &[i32], objects: &[ObjectSlot], offset: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::UpdateState {
        tag: ints[0],
        state: map_slot(&objects[0], offset)?,
    })
}

fn decode_update_layout(ints: &[i32], _: &[ObjectSlot], _: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::UpdateLayout {
        tag: ints[0],
        parent_tag: ints[1],
        frame: LayoutFrame {
            x: ints[2],
            y: ints[3],
            width: ints[4],
            height: ints[5],
        },
        display_type: ints[6],
        layout_direction: ints[7],
    })
}

fn decode_update_event_emitter(ints: &[i32], objects: &[ObjectSlot], offset: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::UpdateEventEmitter {
        tag: ints[0],
        event_emitter: emitter_slot(&objects[0], offset)?,
    })
}

fn insets(ints: &[i32]) -> EdgeInsets {
    EdgeInsets {
        left: ints[1],
        top: ints[2],
        right: ints[3],
        bottom: ints[4],
    }
}

fn decode_update_padding(ints: &[i32], _: &[ObjectSlot], _: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::UpdatePadding { tag: ints[0], padding: insets(ints) })
}

fn decode_update_overflow_inset(ints: &[i32], _: &[ObjectSlot], _: usize) -> Result<MountInstruction> {
    Ok(MountInstruction::UpdateOverflowInset { tag: ints[0], overflow_inset: insets(ints) })
}
