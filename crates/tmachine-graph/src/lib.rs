//! Traversal Machine Graph
//!
//! This crate defines the data source contract the traversal machine pulls
//! from, and an in-memory graph implementing it.
//!
//! # Modules
//!
//! - [`accessor`] - The [`GraphAccessor`] trait and [`NullGraphAccessor`]
//! - [`memory`] - [`InMemoryGraph`] and its [`GraphBuilder`]
//! - [`selector`] - [`VertexSelector`] source descriptors
//! - [`error`] - Error types ([`GraphError`])
//!
//! # Example
//!
//! ```
//! use tmachine_graph::{Direction, GraphAccessor, GraphBuilder, VertexSelector};
//!
//! let mut builder = GraphBuilder::new();
//! let a = builder.add_vertex("person");
//! let b = builder.add_vertex("person");
//! builder.add_edge(a, b, "knows").unwrap();
//! let graph = builder.build();
//!
//! let all: Vec<_> = graph.vertices(&VertexSelector::All).unwrap().collect();
//! assert_eq!(all.len(), 2);
//!
//! let out = graph.neighbors(a, Direction::Outgoing, &[]).unwrap();
//! assert_eq!(out[0].vertex, b);
//! ```

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod accessor;
pub mod error;
pub mod memory;
pub mod selector;

pub use accessor::{Direction, GraphAccessor, Neighbor, NullGraphAccessor, VertexCursor};
pub use error::{GraphError, GraphResult};
pub use memory::{GraphBuilder, InMemoryGraph};
pub use selector::VertexSelector;
