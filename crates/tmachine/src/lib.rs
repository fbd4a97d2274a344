//! Traversal Machine
//!
//! A pull-based evaluator for graph traversal pipelines. A pipeline is an
//! initial step followed by map, flatMap, filter, sideEffect and repeat
//! steps; every traverser carries a value, a coefficient and its label
//! bindings.
//!
//! # Overview
//!
//! - **Typed pipelines**: build with [`TraversalSource`], compile to a
//!   [`Pipeline`], submit to a [`TraversalMachine`]
//! - **Runs**: [`Run`] pulls lazily, suspends after a limit, resumes, and
//!   cancels cooperatively
//! - **Instructions**: [`Request`] carries a serializable [`Instruction`]
//!   list and is answered by a [`Response`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tmachine::{
//!     GraphBuilder, Loop, RunStatus, Traversal, TraversalMachine, TraversalSource, Unit,
//!     VertexSelector,
//! };
//!
//! let mut builder = GraphBuilder::new();
//! let a = builder.add_vertex("person");
//! let b = builder.add_vertex("person");
//! let c = builder.add_vertex("person");
//! builder.add_edge(a, b, "knows").unwrap();
//! builder.add_edge(b, c, "knows").unwrap();
//! let machine = TraversalMachine::new(Arc::new(builder.build()));
//!
//! let g = TraversalSource::<Unit>::new();
//! let pipeline = g
//!     .vertices(VertexSelector::ids([a]))
//!     .repeat(Traversal::start().out(&["knows"]), Loop::times(2))
//!     .compile()
//!     .unwrap();
//!
//! let evaluation = machine.evaluate(&pipeline, None);
//! assert_eq!(evaluation.status, RunStatus::Completed { count: 1 });
//! assert_eq!(evaluation.into_values(), vec![c]);
//! ```
//!
//! # Modules
//!
//! - [`machine`] - The [`TraversalMachine`] façade
//! - [`run`] - [`Run`] handles and [`Evaluation`] results
//! - [`instruction`] - Pipelines as data
//! - [`request`] - Requests and responses
//! - [`error`] - Error types

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod instruction;
pub mod machine;
pub mod request;
pub mod run;

pub use error::{Error, ErrorKind, Result};
pub use instruction::{compile_instructions, Instruction, Predicate};
pub use machine::TraversalMachine;
pub use request::{Request, RequestRun, Response, ResultRow, TerminalStatus};
pub use run::{Evaluation, Run, RunStatus};

// Re-export the building blocks
pub use tmachine_core::{
    Coefficient, Count, Element, Label, StepFailure, Traverser, Unit, Value, ValueKind, VertexId,
    Weight,
};
pub use tmachine_graph::{Direction, GraphAccessor, GraphBuilder, InMemoryGraph, VertexSelector};
pub use tmachine_pipeline::{
    Accumulator, CancellationToken, CompileError, ErrorPolicy, ExecutionConfig, Loop, Pipeline,
    Resource, StepError, Traversal, TraversalSource,
};
