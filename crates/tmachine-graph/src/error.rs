//! Error types for graph access.

use thiserror::Error;
use tmachine_core::{StepFailure, VertexId};

/// Errors that can occur while reading from a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// No graph storage is available.
    #[error("no graph storage available")]
    NoStorage,

    /// A vertex was not found.
    #[error("vertex not found: {0}")]
    VertexNotFound(VertexId),

    /// An edge references a vertex that does not exist.
    #[error("referenced vertex does not exist: {0}")]
    InvalidVertexReference(VertexId),

    /// The storage backend failed.
    #[error("graph error: {0}")]
    Internal(String),
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

impl From<GraphError> for StepFailure {
    fn from(err: GraphError) -> Self {
        Self::new(err.to_string())
    }
}
