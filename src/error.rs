//! Error types for view construction and assignment.
//!
//! Every precondition violation is reported synchronously as a [`TensorError`].
//! Errors describe programming mistakes in the caller; nothing here is
//! transient, so there is no retry machinery.

use thiserror::Error;

use crate::backend::DeviceId;
use crate::scalar::DataType;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TensorError>;

/// Broad classification of a [`TensorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid dimensions or an unsupported rank.
    Shape,
    /// A buffer is smaller than its addressing strategy requires.
    Capacity,
    /// Driver, device or datatype mismatch.
    Compatibility,
    /// Neither element count evenly divides the other.
    Commensurability,
    /// Partially overlapping buffers among the arguments of a write.
    Alias,
    /// Malformed index tensor or gather misuse.
    Index,
    /// Failure reported by a backend implementation.
    Backend,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    #[error("shape error: {reason} (shape {shape:?})")]
    Shape { reason: &'static str, shape: Vec<usize> },

    #[error("unsupported rank {rank} for {operation}: expected {expected}")]
    Rank {
        operation: &'static str,
        rank: usize,
        expected: &'static str,
    },

    #[error("{operation}: range {start}..{end} exceeds extent {extent}")]
    OutOfRange {
        operation: &'static str,
        start: usize,
        end: usize,
        extent: usize,
    },

    #[error("{operation} requires a dense view")]
    NotDense { operation: &'static str },

    #[error("capacity error: addressing requires {required} elements but buffer holds {available}")]
    Capacity { required: usize, available: usize },

    #[error("capacity error: {num_columns} columns exceed column stride {column_stride}")]
    ColumnStride {
        num_columns: usize,
        column_stride: usize,
    },

    #[error("driver mismatch: {left} vs {right}")]
    DriverMismatch {
        left: &'static str,
        right: &'static str,
    },

    #[error("device mismatch: {left} vs {right}")]
    DeviceMismatch { left: DeviceId, right: DeviceId },

    #[error("datatype mismatch: expected {expected}, found {found}")]
    DataTypeMismatch { expected: DataType, found: DataType },

    #[error("element counts {larger} and {smaller} are not commensurate")]
    Commensurability { larger: usize, smaller: usize },

    #[error("arguments {first} and {second} partially alias the same memory")]
    PartialAlias { first: usize, second: usize },

    #[error("index tensor must be dense")]
    IndexNotDense,

    #[error("index tensor must have an integer datatype, found {found}")]
    IndexNotInteger { found: DataType },

    #[error("index tensor must be addressed monotonically, not through another index")]
    IndexNotMonotonic,

    #[error("{operation} is not defined for gathered views")]
    GatheredView { operation: &'static str },

    #[error("{operation}: {count} index entries select from an empty axis")]
    EmptyGatherAxis { operation: &'static str, count: usize },

    #[error("index value {value} cannot address memory")]
    IndexValue { value: i128 },

    #[error("gathered offset {offset} lies outside buffer of {len} elements")]
    IndexOutOfBounds { offset: usize, len: usize },

    #[error("backend error: {0}")]
    Backend(String),
}

impl TensorError {
    /// Classify this error into one of the engine's error kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TensorError::Shape { .. }
            | TensorError::Rank { .. }
            | TensorError::OutOfRange { .. }
            | TensorError::NotDense { .. } => ErrorKind::Shape,
            TensorError::Capacity { .. } | TensorError::ColumnStride { .. } => ErrorKind::Capacity,
            TensorError::DriverMismatch { .. }
            | TensorError::DeviceMismatch { .. }
            | TensorError::DataTypeMismatch { .. } => ErrorKind::Compatibility,
            TensorError::Commensurability { .. } => ErrorKind::Commensurability,
            TensorError::PartialAlias { .. } => ErrorKind::Alias,
            TensorError::IndexNotDense
            | TensorError::IndexNotInteger { .. }
            | TensorError::IndexNotMonotonic
            | TensorError::GatheredView { .. }
            | TensorError::EmptyGatherAxis { .. }
            | TensorError::IndexValue { .. }
            | TensorError::IndexOutOfBounds { .. } => ErrorKind::Index,
            TensorError::Backend(_) => ErrorKind::Backend,
        }
    }
}
