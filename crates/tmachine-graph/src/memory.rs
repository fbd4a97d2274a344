//! In-memory graph.
//!
//! [`InMemoryGraph`] is an immutable snapshot built with [`GraphBuilder`].
//! Vertices and adjacency lists keep insertion order, and cursors share the
//! snapshot through an `Arc` so they own their data independently of the
//! accessor that opened them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tmachine_core::{EdgeId, Value, VertexId};
use tracing::trace;

use crate::accessor::{Direction, GraphAccessor, Neighbor, VertexCursor};
use crate::error::{GraphError, GraphResult};
use crate::selector::VertexSelector;

#[derive(Debug, Clone)]
struct VertexRecord {
    label: String,
    properties: BTreeMap<String, Value>,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    source: VertexId,
    target: VertexId,
    label: String,
}

#[derive(Debug, Default)]
struct GraphData {
    vertices: Vec<VertexRecord>,
    edges: Vec<EdgeRecord>,
}

impl GraphData {
    // Ids are 1-based positions.
    fn vertex(&self, id: VertexId) -> Option<&VertexRecord> {
        let index = usize::try_from(id.as_u64()).ok()?.checked_sub(1)?;
        self.vertices.get(index)
    }

    fn edge(&self, id: EdgeId) -> Option<&EdgeRecord> {
        let index = usize::try_from(id.as_u64()).ok()?.checked_sub(1)?;
        self.edges.get(index)
    }

    fn matches(record: &VertexRecord, selector: &VertexSelector) -> bool {
        match selector {
            VertexSelector::All | VertexSelector::Ids { .. } => true,
            VertexSelector::Label { label } => record.label == *label,
            VertexSelector::Property { key, value } => record.properties.get(key) == Some(value),
        }
    }
}

/// Builds an [`InMemoryGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    data: GraphData,
}

impl GraphBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex and returns its id.
    pub fn add_vertex(&mut self, label: impl Into<String>) -> VertexId {
        self.data.vertices.push(VertexRecord {
            label: label.into(),
            properties: BTreeMap::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        VertexId::new(self.data.vertices.len() as u64)
    }

    /// Sets a property on an existing vertex.
    pub fn set_property(
        &mut self,
        vertex: VertexId,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> GraphResult<()> {
        let index = self.index_of(vertex).ok_or(GraphError::VertexNotFound(vertex))?;
        self.data.vertices[index].properties.insert(key.into(), value.into());
        Ok(())
    }

    /// Adds a directed edge and returns its id.
    pub fn add_edge(
        &mut self,
        source: VertexId,
        target: VertexId,
        label: impl Into<String>,
    ) -> GraphResult<EdgeId> {
        let src = self.index_of(source).ok_or(GraphError::InvalidVertexReference(source))?;
        let dst = self.index_of(target).ok_or(GraphError::InvalidVertexReference(target))?;

        self.data.edges.push(EdgeRecord { source, target, label: label.into() });
        let edge = EdgeId::new(self.data.edges.len() as u64);
        self.data.vertices[src].outgoing.push(edge);
        self.data.vertices[dst].incoming.push(edge);
        Ok(edge)
    }

    /// Finishes the graph.
    #[must_use]
    pub fn build(self) -> InMemoryGraph {
        InMemoryGraph { data: Arc::new(self.data) }
    }

    fn index_of(&self, vertex: VertexId) -> Option<usize> {
        let index = usize::try_from(vertex.as_u64()).ok()?.checked_sub(1)?;
        (index < self.data.vertices.len()).then_some(index)
    }
}

/// An immutable in-memory graph.
///
/// Cloning shares the underlying snapshot.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    data: Arc<GraphData>,
}

impl InMemoryGraph {
    /// Returns the number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.data.vertices.len()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.data.edges.len()
    }
}

impl GraphAccessor for InMemoryGraph {
    fn vertices(&self, selector: &VertexSelector) -> GraphResult<VertexCursor> {
        Ok(Box::new(VertexScan {
            data: Arc::clone(&self.data),
            selector: selector.clone(),
            position: 0,
        }))
    }

    fn neighbors(
        &self,
        vertex: VertexId,
        direction: Direction,
        edge_labels: &[String],
    ) -> GraphResult<Vec<Neighbor>> {
        let record = self.data.vertex(vertex).ok_or(GraphError::VertexNotFound(vertex))?;
        let accepts = |edge: &EdgeRecord| {
            edge_labels.is_empty() || edge_labels.iter().any(|l| *l == edge.label)
        };

        let mut results = Vec::new();

        if direction.includes_outgoing() {
            for &edge_id in &record.outgoing {
                let edge = self.data.edge(edge_id).ok_or_else(|| {
                    GraphError::Internal(format!("dangling adjacency entry {edge_id}"))
                })?;
                if accepts(edge) {
                    results.push(Neighbor::new(edge.target, edge_id, Direction::Outgoing));
                }
            }
        }

        if direction.includes_incoming() {
            for &edge_id in &record.incoming {
                let edge = self.data.edge(edge_id).ok_or_else(|| {
                    GraphError::Internal(format!("dangling adjacency entry {edge_id}"))
                })?;
                if accepts(edge) {
                    results.push(Neighbor::new(edge.source, edge_id, Direction::Incoming));
                }
            }
        }

        Ok(results)
    }

    fn property(&self, vertex: VertexId, key: &str) -> GraphResult<Option<Value>> {
        let record = self.data.vertex(vertex).ok_or(GraphError::VertexNotFound(vertex))?;
        Ok(record.properties.get(key).cloned())
    }

    fn label(&self, vertex: VertexId) -> GraphResult<String> {
        let record = self.data.vertex(vertex).ok_or(GraphError::VertexNotFound(vertex))?;
        Ok(record.label.clone())
    }
}

/// Lazy cursor over a graph snapshot.
struct VertexScan {
    data: Arc<GraphData>,
    selector: VertexSelector,
    position: usize,
}

impl Iterator for VertexScan {
    type Item = GraphResult<VertexId>;

    fn next(&mut self) -> Option<Self::Item> {
        if let VertexSelector::Ids { ids } = &self.selector {
            while let Some(&id) = ids.get(self.position) {
                self.position += 1;
                if self.data.vertex(id).is_some() {
                    return Some(Ok(id));
                }
            }
            return None;
        }

        while let Some(record) = self.data.vertices.get(self.position) {
            self.position += 1;
            if GraphData::matches(record, &self.selector) {
                return Some(Ok(VertexId::new(self.position as u64)));
            }
        }
        None
    }
}

impl Drop for VertexScan {
    fn drop(&mut self) {
        trace!(position = self.position, "vertex cursor released");
    }
}
