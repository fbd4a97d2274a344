//! Initial step operator.

use std::sync::Arc;

use tmachine_core::{Coefficient, Element, StepFailure, Traverser};
use tracing::trace;

use crate::context::ExecutionContext;
use crate::error::{ExecError, ExecResult, StepError};
use crate::function::{InitialFunction, InitialKind, SourceCursor};
use crate::operator::{Operator, OperatorBase, OperatorState};

use super::bind_labels;

/// Pulls values from an initial step and wraps them in traversers.
///
/// The source cursor is opened in [`open`](Operator::open) and dropped as
/// soon as it is exhausted, on close, or when the operator is dropped.
pub struct InitialOp<C, S> {
    base: OperatorBase,
    function: InitialFunction<C, S>,
    cursor: Option<SourceCursor<S>>,
    ctx: Option<ExecutionContext>,
    pulled: u64,
}

impl<C, S> InitialOp<C, S> {
    /// Creates an operator for `function`.
    #[must_use]
    pub fn new(function: InitialFunction<C, S>) -> Self {
        Self { base: OperatorBase::new(), function, cursor: None, ctx: None, pulled: 0 }
    }

    fn release(&mut self) {
        if self.cursor.take().is_some() {
            trace!(step = %self.function.header(), pulled = self.pulled, "source cursor released");
        }
    }
}

impl<C: Coefficient, S: Element> InitialOp<C, S> {
    fn failure(&self, message: &str, value: Option<&S>) -> ExecError {
        ExecError::Step(StepError {
            step_index: 0,
            step: self.function.header().to_string(),
            element_index: self.pulled,
            value: value.map(|v| v.to_value().to_string()),
            message: message.to_owned(),
        })
    }
}

impl<C: Coefficient, S: Element> Operator<C, S> for InitialOp<C, S> {
    fn open(&mut self, ctx: &ExecutionContext) -> ExecResult<()> {
        let cursor: SourceCursor<S> = match self.function.kind() {
            InitialKind::Inject(values) => {
                let values = Arc::clone(values);
                Box::new((0..values.len()).map(move |i| Ok::<S, StepFailure>(values[i].clone())))
            }
            InitialKind::Generate(source) => {
                source(ctx).map_err(|failure| self.failure(failure.message(), None))?
            }
        };
        self.cursor = Some(cursor);
        self.ctx = Some(ctx.clone());
        self.base.set_open();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Traverser<C, S>>> {
        let Some(ctx) = self.ctx.as_ref() else {
            return Ok(None);
        };
        ctx.check_cancelled()?;

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        match cursor.next() {
            None => {
                self.base.set_finished();
                self.release();
                Ok(None)
            }
            Some(Err(failure)) => {
                self.pulled += 1;
                Err(self.failure(failure.message(), None))
            }
            Some(Ok(value)) => {
                self.pulled += 1;
                ctx.record_read(1);
                let header = self.function.header();
                let traverser = Traverser::new(value, header.coefficient().clone());
                Ok(Some(bind_labels(header.labels(), traverser)))
            }
        }
    }

    fn close(&mut self) -> ExecResult<()> {
        self.release();
        self.ctx = None;
        self.base.set_closed();
        Ok(())
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &str {
        self.function.header().name()
    }
}
