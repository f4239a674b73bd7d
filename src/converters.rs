//! JSON conversion helpers for hosts that exchange trees and batches as JSON
use crate::batch::BatchMountItem;
use crate::errors::Result;
use crate::instruction::{MountInstruction, ObjectSlot};
use crate::snapshot::{NodeSpec, Snapshot};
use crate::types::Operation;
use serde_json::Value;

/// Parse a node tree (`{"tag": .., "children": [..]}`) into a snapshot
pub fn snapshot_from_json(raw: &str) -> Result<Snapshot> {
    let spec: NodeSpec = serde_json::from_str(raw)?;
    Snapshot::build(&spec)
}

pub fn snapshot_from_value(value: Value) -> Result<Snapshot> {
    let spec: NodeSpec = serde_json::from_value(value)?;
    Snapshot::build(&spec)
}

pub fn snapshot_to_value(snapshot: &Snapshot) -> Result<Value> {
    Ok(serde_json::to_value(snapshot.to_spec())?)
}

pub fn operations_to_value(operations: &[Operation]) -> Result<Value> {
    Ok(serde_json::to_value(operations)?)
}

pub fn instructions_to_value(instructions: &[MountInstruction]) -> Result<Value> {
    Ok(serde_json::to_value(instructions)?)
}

pub fn objects_from_json(raw: &str) -> Result<Vec<ObjectSlot>> {
    Ok(serde_json::from_str(raw)?)
}

pub fn batch_from_json(raw: &str) -> Result<BatchMountItem> {
    Ok(serde_json::from_str(raw)?)
}
