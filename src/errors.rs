// /src/errors.rs
//! Error handling for snapshot construction, batch decoding and view mutation
use crate::types::Tag;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Tag {tag} appears more than once in the same snapshot")]
    DuplicateTag { tag: Tag },

    #[error("Root tag mismatch: expected {expected}, got {actual}")]
    RootMismatch { expected: Tag, actual: Tag },

    #[error("Unknown instruction type {code} at int offset {offset}")]
    UnknownInstruction { code: i32, offset: usize },

    #[error("Invalid repeat count {count} at int offset {offset}")]
    InvalidRepeatCount { count: i32, offset: usize },

    #[error("{buffer} buffer underrun at offset {offset}: needed {needed}, {available} left")]
    BufferUnderrun {
        buffer: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid value {value} for {field}")]
    InvalidField { field: &'static str, value: i32 },

    #[error("Value {value} for {field} does not fit in an int word")]
    ValueOutOfRange { field: &'static str, value: usize },

    #[error("Object slot {slot}: expected {expected}, got {actual}")]
    UnexpectedObject {
        slot: usize,
        expected: &'static str,
        actual: String,
    },

    #[error("Unable to find view for tag [{tag}]")]
    ViewNotFound { tag: Tag },

    #[error("View [{tag}] is not a child of [{parent_tag}]")]
    ChildNotFound { parent_tag: Tag, tag: Tag },

    #[error("Index {index} out of bounds for children of [{parent_tag}] (len {len})")]
    IndexOutOfBounds { parent_tag: Tag, index: usize, len: usize },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[cfg(feature = "python")]
    #[error("Python call failed: {0}")]
    PythonError(String),
}

pub type Result<T, E = ReconcilerError> = std::result::Result<T, E>;

#[cfg(feature = "python")]
impl From<ReconcilerError> for pyo3::PyErr {
    fn from(err: ReconcilerError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<pyo3::PyErr> for ReconcilerError {
    fn from(err: pyo3::PyErr) -> Self {
        ReconcilerError::PythonError(err.to_string())
    }
}
