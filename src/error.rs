//! Error types for ferrograd.

use crate::graph::NodeId;
use thiserror::Error;

/// Errors raised by tensor operations, the graph engine and the layers built on it.
///
/// Shape and graph-structure problems are fatal and surface here. Numerical
/// trouble (NaN, infinities) is never reported as an error: abnormal values simply
/// flow through the computation.
#[derive(Debug, Error)]
pub enum GradError {
    /// Two tensors that must agree on shape do not.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Backward was requested on a value that is not part of a differentiable graph.
    #[error("{0} does not require grad and has no creating operation")]
    NoGraph(NodeId),

    /// The node id does not exist in this engine (or was dropped by `clear_graph`).
    #[error("{0} not found in the engine")]
    NodeNotFound(NodeId),

    /// An operator received the wrong number of inputs.
    #[error("operator {op} expects {expected} inputs, got {actual}")]
    ArityMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },

    /// The shapes cannot be broadcast together.
    #[error("cannot broadcast shapes {lhs:?} and {rhs:?}")]
    Broadcast { lhs: Vec<usize>, rhs: Vec<usize> },

    /// Data length does not match the requested shape.
    #[error("data length {len} does not match shape {shape:?} ({expected} elements)")]
    DataLength {
        len: usize,
        shape: Vec<usize>,
        expected: usize,
    },

    /// Any other invalid argument (bad axis, zero batch size, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Rendering a graph into text failed.
    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// Shape error reported by ndarray.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T, E = GradError> = std::result::Result<T, E>;

impl GradError {
    pub(crate) fn shape_mismatch(
        context: &'static str,
        expected: &[usize],
        actual: &[usize],
    ) -> Self {
        GradError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
