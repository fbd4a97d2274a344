//! Traversal Machine Pipeline
//!
//! This crate provides the step-function family, pipeline compilation, and
//! the pull-based operators that evaluate a compiled pipeline.
//!
//! # Overview
//!
//! - **Functions**: [`InitialFunction`] starts a pipeline; [`Function`] is a
//!   closed set of step kinds (map, flatMap, filter, sideEffect, repeat)
//! - **Traversals**: [`Traversal`] is the typed builder. Adjacent steps are
//!   type-checked by the compiler: a step consuming `E` can only follow a
//!   step producing `E`
//! - **Pipelines**: [`Traversal::compile`] validates labels and parameters
//!   and yields an immutable [`Pipeline`]
//! - **Execution**: [`Pipeline::run`] builds a fresh operator tree and
//!   returns a lazy [`Execution`]
//!
//! # Example
//!
//! ```
//! use tmachine_core::Unit;
//! use tmachine_pipeline::{ExecutionContext, TraversalSource};
//!
//! let g = TraversalSource::<Unit>::new();
//! let pipeline = g.inject([1i64, 2, 3, 4]).filter(|v| v % 2 == 0).compile().unwrap();
//!
//! let values: Vec<i64> = pipeline
//!     .run(ExecutionContext::new())
//!     .map(|t| t.map(|t| t.into_value()))
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(values, vec![2, 4]);
//! ```
//!
//! # Modules
//!
//! - [`function`] - Step descriptors
//! - [`traversal`] - Typed pipeline builder
//! - [`pipeline`] - Compiled pipelines and their executions
//! - [`operator`] - The pull-based [`Operator`] trait
//! - [`operators`] - Operator implementations
//! - [`context`] - Execution context, configuration and cancellation
//! - [`side_effect`] - Per-run side-effect accumulators
//! - [`error`] - Error types

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod chain;
pub mod context;
pub mod error;
pub mod function;
pub mod operator;
pub mod operators;
pub mod pipeline;
pub mod side_effect;
pub mod traversal;

pub use context::{
    CancellationToken, ErrorPolicy, ExecutionConfig, ExecutionContext, ExecutionStats,
};
pub use error::{CompileError, ExecError, ExecResult, Resource, StepError};
pub use function::{
    Function, FunctionKind, InitialFunction, InitialKind, Loop, SourceCursor, StepHeader,
    StepOutcome,
};
pub use operator::{BoxedOperator, Operator, OperatorState};
pub use pipeline::{Execution, Pipeline, StepInfo, StepKind};
pub use side_effect::{Accumulator, SideEffects};
pub use traversal::{Traversal, TraversalSource};
