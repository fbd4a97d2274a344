//! Graph access trait used by the traversal machine.
//!
//! This module provides the [`GraphAccessor`] trait that abstracts the
//! storage backend. The trait is object-safe and is stored in the execution
//! context of every run.

use serde::{Deserialize, Serialize};
use tmachine_core::{EdgeId, Value, VertexId};

use crate::error::{GraphError, GraphResult};
use crate::selector::VertexSelector;

/// A lazy, owned cursor over vertices.
///
/// Dropping the cursor releases whatever the backend holds for it.
pub type VertexCursor = Box<dyn Iterator<Item = GraphResult<VertexId>> + Send>;

/// Direction for graph traversal.
///
/// Specifies which edges to follow when expanding from a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Follow outgoing edges (source -> target).
    #[default]
    Outgoing,

    /// Follow incoming edges (target <- source).
    Incoming,

    /// Follow edges in both directions.
    Both,
}

impl Direction {
    /// Returns true if this direction includes outgoing edges.
    #[inline]
    pub const fn includes_outgoing(self) -> bool {
        matches!(self, Self::Outgoing | Self::Both)
    }

    /// Returns true if this direction includes incoming edges.
    #[inline]
    pub const fn includes_incoming(self) -> bool {
        matches!(self, Self::Incoming | Self::Both)
    }

    /// Returns the step name for this direction.
    #[must_use]
    pub const fn step_name(self) -> &'static str {
        match self {
            Self::Outgoing => "out",
            Self::Incoming => "in",
            Self::Both => "both",
        }
    }
}

/// Result of a neighbor expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    /// The neighbor vertex.
    pub vertex: VertexId,
    /// The edge connecting to this neighbor.
    pub edge: EdgeId,
    /// The direction the edge was traversed.
    pub direction: Direction,
}

impl Neighbor {
    /// Create a new neighbor result.
    pub const fn new(vertex: VertexId, edge: EdgeId, direction: Direction) -> Self {
        Self { vertex, edge, direction }
    }
}

/// The data source contract.
///
/// Only [`vertices`](Self::vertices) may block on I/O for a long time; the
/// machine pulls the returned cursor lazily and never assumes its length.
/// Every method must return results in a stable order so that repeated runs
/// over unchanged data are deterministic.
pub trait GraphAccessor: Send + Sync {
    /// Opens a cursor over the vertices matching `selector`.
    fn vertices(&self, selector: &VertexSelector) -> GraphResult<VertexCursor>;

    /// Returns the neighbors of `vertex` in `direction`.
    ///
    /// An empty `edge_labels` slice means any edge label.
    fn neighbors(
        &self,
        vertex: VertexId,
        direction: Direction,
        edge_labels: &[String],
    ) -> GraphResult<Vec<Neighbor>>;

    /// Returns the property `key` of `vertex`, if set.
    fn property(&self, vertex: VertexId, key: &str) -> GraphResult<Option<Value>>;

    /// Returns the label of `vertex`.
    fn label(&self, vertex: VertexId) -> GraphResult<String>;
}

/// A graph accessor with no storage behind it.
///
/// Used when a run does not read from a graph; every call fails with
/// [`GraphError::NoStorage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGraphAccessor;

impl GraphAccessor for NullGraphAccessor {
    fn vertices(&self, _selector: &VertexSelector) -> GraphResult<VertexCursor> {
        Err(GraphError::NoStorage)
    }

    fn neighbors(
        &self,
        _vertex: VertexId,
        _direction: Direction,
        _edge_labels: &[String],
    ) -> GraphResult<Vec<Neighbor>> {
        Err(GraphError::NoStorage)
    }

    fn property(&self, _vertex: VertexId, _key: &str) -> GraphResult<Option<Value>> {
        Err(GraphError::NoStorage)
    }

    fn label(&self, _vertex: VertexId) -> GraphResult<String> {
        Err(GraphError::NoStorage)
    }
}
