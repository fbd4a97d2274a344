//! Operator trait and base types.
//!
//! This module defines the [`Operator`] trait that every step of a running
//! pipeline implements.

use tmachine_core::Traverser;

use crate::context::ExecutionContext;
use crate::error::ExecResult;

/// The state of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Operator has not been opened yet.
    Created,
    /// Operator is open and ready to produce traversers.
    Open,
    /// Operator has finished producing traversers.
    Finished,
    /// Operator has been closed.
    Closed,
}

impl OperatorState {
    /// Returns true if the operator is open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true if the operator has finished.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns true if the operator is closed.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// The operator trait for pull-based execution.
///
/// A compiled pipeline is a chain of operators. The consumer pulls from the
/// last one, which pulls from its input, down to the initial step. Nothing
/// is computed until it is pulled.
///
/// # Lifecycle
///
/// 1. **Created**: Initial state after construction
/// 2. **Open**: After `open()` is called; ready to produce traversers
/// 3. **Finished**: After `next()` returns `None`; no more traversers
/// 4. **Closed**: After `close()` is called; resources released
///
/// # Thread Safety
///
/// The `Send` bound allows a suspended run to move between threads, but
/// operators are not `Sync` - they maintain mutable internal state.
pub trait Operator<C, S>: Send {
    /// Opens the operator and its input.
    fn open(&mut self, ctx: &ExecutionContext) -> ExecResult<()>;

    /// Returns the next traverser, or `None` if there are no more.
    fn next(&mut self) -> ExecResult<Option<Traverser<C, S>>>;

    /// Closes the operator and its input and releases resources.
    fn close(&mut self) -> ExecResult<()>;

    /// Returns the current state of this operator.
    fn state(&self) -> OperatorState;

    /// Returns the name of this operator.
    fn name(&self) -> &str;
}

/// A boxed operator for dynamic dispatch.
pub type BoxedOperator<C, S> = Box<dyn Operator<C, S>>;

/// Base implementation for operators.
#[derive(Debug)]
pub struct OperatorBase {
    state: OperatorState,
}

impl OperatorBase {
    /// Creates a new operator base.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: OperatorState::Created }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> OperatorState {
        self.state
    }

    /// Sets the state to open.
    pub fn set_open(&mut self) {
        self.state = OperatorState::Open;
    }

    /// Sets the state to finished.
    pub fn set_finished(&mut self) {
        self.state = OperatorState::Finished;
    }

    /// Sets the state to closed.
    pub fn set_closed(&mut self) {
        self.state = OperatorState::Closed;
    }
}

impl Default for OperatorBase {
    fn default() -> Self {
        Self::new()
    }
}
