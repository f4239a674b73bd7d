//! Mounting core: a tag-keyed tree reconciler and the flat mount-instruction
//! batch codec, plus an in-memory view hierarchy that both can drive.
//!
//! ```
//! use mount_reconciler::{diff, NodeSpec, Operation, ReconcilerConfig, Snapshot};
//!
//! let old = Snapshot::build(&NodeSpec::view(0, vec![NodeSpec::leaf(1), NodeSpec::leaf(2)])).unwrap();
//! let new = Snapshot::build(&NodeSpec::view(0, vec![NodeSpec::leaf(3), NodeSpec::leaf(2)])).unwrap();
//! let operations = diff(&old, &new, &ReconcilerConfig::default());
//! assert_eq!(operations[0], Operation::RemoveAt { parent_tag: 0, index: 0 });
//! assert_eq!(operations[1], Operation::InsertAt { parent_tag: 0, tag: 3, index: 0 });
//! ```
pub mod batch;
pub mod commit;
pub mod config;
pub mod converters;
pub mod diff_engine;
pub mod errors;
pub mod instruction;
pub mod mounting_manager;
pub mod sink;
pub mod snapshot;
pub mod surface;
pub mod types;

#[cfg(feature = "python")]
mod bindings;

pub use batch::{BatchDecoder, BatchMountItem};
pub use commit::{CommitReport, SurfaceCommitter};
pub use config::{MovePolicy, ReconcilerConfig};
pub use diff_engine::{diff, reconcile, reconcile_with, DiffEngine};
pub use errors::ReconcilerError;
pub use instruction::{InstructionKind, MountInstruction, ObjectSlot, INSTRUCTION_FLAG_MULTIPLE};
pub use mounting_manager::MountingManager;
pub use sink::{ManageChildrenQueue, OperationSink};
pub use snapshot::{NodeId, NodeSpec, Snapshot};
pub use surface::{MountingSink, SurfaceMountingManager, ViewState};
pub use types::{ChildEdits, EdgeInsets, LayoutFrame, Operation, ReconcileStats, SurfaceId, Tag, ViewAtIndex};
