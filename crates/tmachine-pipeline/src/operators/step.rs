//! Step operator.
//!
//! [`StepOp`] applies one non-initial step to the traversers pulled from its
//! input. Dispatch is a single match over [`FunctionKind`]. FlatMap and
//! repeat steps buffer the remaining outputs of the current input traverser
//! and drain that buffer before pulling again.

use std::collections::VecDeque;

use tmachine_core::{Coefficient, Element, StepFailure, Traverser};
use tracing::{trace, warn};

use crate::chain::Chain;
use crate::context::{ErrorPolicy, ExecutionContext};
use crate::error::{ExecError, ExecResult, Resource, StepError};
use crate::function::{Function, FunctionKind, Loop, StepHeader};
use crate::operator::{BoxedOperator, Operator, OperatorBase, OperatorState};

use super::{bind_labels, FrontierOp};

/// Applies one step to its input.
pub struct StepOp<C, S, E> {
    base: OperatorBase,
    function: Function<C, S, E>,
    /// Position of the step in its pipeline.
    index: usize,
    input: BoxedOperator<C, S>,
    pending: VecDeque<Traverser<C, E>>,
    /// Input traversers consumed so far.
    consumed: u64,
    ctx: Option<ExecutionContext>,
}

impl<C, S, E> StepOp<C, S, E> {
    /// Creates an operator applying `function` at position `index`.
    #[must_use]
    pub fn new(function: Function<C, S, E>, index: usize, input: BoxedOperator<C, S>) -> Self {
        Self {
            base: OperatorBase::new(),
            function,
            index,
            input,
            pending: VecDeque::new(),
            consumed: 0,
            ctx: None,
        }
    }
}

impl<C: Coefficient, S: Element, E: Element> Operator<C, E> for StepOp<C, S, E> {
    fn open(&mut self, ctx: &ExecutionContext) -> ExecResult<()> {
        self.input.open(ctx)?;
        self.ctx = Some(ctx.clone());
        self.base.set_open();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Traverser<C, E>>> {
        loop {
            let Some(ctx) = self.ctx.as_ref() else {
                return Ok(None);
            };
            // Buffered outputs count as productions too.
            ctx.check_cancelled()?;

            if let Some(t) = self.pending.pop_front() {
                return Ok(Some(t));
            }

            let Some(upstream) = self.input.next()? else {
                self.base.set_finished();
                return Ok(None);
            };
            self.consumed += 1;

            let step = Step { function: &self.function, index: self.index, element: self.consumed };
            match step.apply(upstream, ctx, &mut self.pending) {
                Ok(Some(t)) => return Ok(Some(t)),
                Ok(None) => {}
                Err(ExecError::Step(err))
                    if ctx.config().error_policy == ErrorPolicy::SkipAndContinue =>
                {
                    warn!(
                        step = %err.step,
                        step_index = err.step_index,
                        element_index = err.element_index,
                        error = %err.message,
                        "skipping traverser after step failure"
                    );
                    ctx.record_skipped(1);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn close(&mut self) -> ExecResult<()> {
        self.pending.clear();
        self.ctx = None;
        self.input.close()?;
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

/// One application of a step to one input traverser.
struct Step<'a, C, S, E> {
    function: &'a Function<C, S, E>,
    index: usize,
    /// 1-based ordinal of the input traverser.
    element: u64,
}

impl<C: Coefficient, S: Element, E: Element> Step<'_, C, S, E> {
    fn header(&self) -> &StepHeader<C> {
        self.function.header()
    }

    fn failure(&self, failure: StepFailure, value: &S) -> ExecError {
        ExecError::Step(StepError {
            step_index: self.index,
            step: self.header().to_string(),
            element_index: self.element,
            value: Some(value.to_value().to_string()),
            message: failure.message().to_owned(),
        })
    }

    fn emit(&self, traverser: Traverser<C, E>) -> Traverser<C, E> {
        bind_labels(self.header().labels(), traverser)
    }

    /// Returns a single output directly and queues multiple outputs.
    fn apply(
        &self,
        upstream: Traverser<C, S>,
        ctx: &ExecutionContext,
        pending: &mut VecDeque<Traverser<C, E>>,
    ) -> ExecResult<Option<Traverser<C, E>>> {
        let weight = self.header().coefficient();
        match self.function.kind() {
            FunctionKind::Map(f) => {
                let value = f(&upstream, ctx).map_err(|e| self.failure(e, upstream.value()))?;
                Ok(Some(self.emit(upstream.split(value, weight))))
            }
            FunctionKind::FlatMap(f) => {
                let values = f(&upstream, ctx).map_err(|e| self.failure(e, upstream.value()))?;
                pending.extend(values.into_iter().map(|v| self.emit(upstream.split(v, weight))));
                Ok(None)
            }
            FunctionKind::Filter { predicate, pass } => {
                let keep =
                    predicate(&upstream, ctx).map_err(|e| self.failure(e, upstream.value()))?;
                if keep {
                    Ok(Some(self.emit(pass(upstream))))
                } else {
                    ctx.record_filtered(1);
                    Ok(None)
                }
            }
            FunctionKind::SideEffect { effect, pass } => {
                effect(&upstream, ctx).map_err(|e| self.failure(e, upstream.value()))?;
                Ok(Some(self.emit(pass(upstream))))
            }
            FunctionKind::Repeat { body, bound, pass } => {
                let frontier = self.iterate(body.as_ref(), bound, upstream, ctx)?;
                pending.extend(frontier.into_iter().map(|t| self.emit(pass(t))));
                Ok(None)
            }
        }
    }

    /// Runs a repeat loop for one input traverser and returns the final
    /// frontier.
    ///
    /// Every survivor of an iteration is multiplied by the repeat step's
    /// weight, so the weight compounds once per iteration.
    fn iterate(
        &self,
        body: &dyn Chain<C, S, S>,
        bound: &Loop<C, S>,
        seed: Traverser<C, S>,
        ctx: &ExecutionContext,
    ) -> ExecResult<Vec<Traverser<C, S>>> {
        let config = ctx.config();
        let mut frontier = vec![seed];
        let mut iterations = 0usize;

        loop {
            if frontier.is_empty() {
                break;
            }
            if let Loop::Times(n) = bound {
                if iterations >= *n {
                    break;
                }
            }
            if config.max_loop_iterations > 0 && iterations >= config.max_loop_iterations {
                warn!(
                    step = %self.header(),
                    limit = config.max_loop_iterations,
                    "repeat loop bound exceeded"
                );
                return Err(ExecError::ResourceExhausted {
                    resource: Resource::LoopIterations,
                    limit: config.max_loop_iterations,
                });
            }
            iterations += 1;

            let mut op = body.attach(Box::new(FrontierOp::new(frontier)));
            let drained = op.open(ctx).and_then(|()| self.survivors(op.as_mut(), ctx));
            let closed = op.close();
            let survivors = drained?;
            closed?;
            ctx.record_iterations(1);
            frontier = survivors;

            if let Loop::Until(predicate) = bound {
                let mut done = true;
                for t in &frontier {
                    if !predicate(t, ctx).map_err(|e| self.failure(e, t.value()))? {
                        done = false;
                        break;
                    }
                }
                if done {
                    break;
                }
            }
        }

        trace!(step = %self.header(), iterations, survivors = frontier.len(), "repeat finished");
        Ok(frontier)
    }

    /// Drains one iteration of the loop body.
    fn survivors(
        &self,
        op: &mut dyn Operator<C, S>,
        ctx: &ExecutionContext,
    ) -> ExecResult<Vec<Traverser<C, S>>> {
        let config = ctx.config();
        let weight = self.header().coefficient();
        let mut survivors = Vec::new();
        while let Some(t) = op.next().map_err(|e| self.attribute(e))? {
            if config.max_frontier_size > 0 && survivors.len() >= config.max_frontier_size {
                warn!(
                    step = %self.header(),
                    limit = config.max_frontier_size,
                    "repeat frontier bound exceeded"
                );
                return Err(ExecError::ResourceExhausted {
                    resource: Resource::FrontierSize,
                    limit: config.max_frontier_size,
                });
            }
            survivors.push(t.weighted(weight));
        }
        Ok(survivors)
    }

    /// Reports a failure inside a loop body against the repeat step.
    fn attribute(&self, err: ExecError) -> ExecError {
        match err {
            ExecError::Step(inner) => ExecError::Step(StepError {
                step_index: self.index,
                step: format!("{}/{}", self.header(), inner.step),
                element_index: self.element,
                value: inner.value,
                message: inner.message,
            }),
            other => other,
        }
    }
}
