//! Run handles.
//!
//! A [`Run`] wraps a lazy pipeline execution with a status, so a caller can
//! pull results in batches, suspend, resume, or cancel.

use std::collections::BTreeMap;
use std::fmt;

use tmachine_core::{Coefficient, Element, Label, Traverser};
use tmachine_pipeline::{
    Accumulator, CancellationToken, ExecError, Execution, ExecutionStats, Resource, SideEffects,
};
use tracing::{debug, warn};

use crate::error::Error;

/// Where a run stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// More results may follow.
    Suspended,
    /// The stream was exhausted after `count` results.
    Completed {
        /// Results emitted over the whole run.
        count: u64,
    },
    /// The run stopped on an error. Results emitted before it stay valid.
    Aborted(Error),
    /// Cancellation was observed, or the run was closed early.
    Cancelled,
}

impl RunStatus {
    /// Returns true if no further results will be produced.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Suspended)
    }

    /// Returns the error of an aborted run.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Aborted(err) => Some(err),
            _ => None,
        }
    }
}

/// A submitted pipeline being evaluated.
///
/// Results are produced only when pulled. Once the status is terminal every
/// further pull returns nothing.
pub struct Run<C, E> {
    execution: Execution<C, E>,
    status: RunStatus,
    emitted: u64,
}

impl<C: Coefficient, E: Element> Run<C, E> {
    pub(crate) fn new(execution: Execution<C, E>) -> Self {
        Self { execution, status: RunStatus::Suspended, emitted: 0 }
    }

    /// Pulls the next result.
    ///
    /// Pulling one at a time is a drain: it is subject to the configured
    /// `max_traversers` bound.
    pub fn next_result(&mut self) -> Option<Traverser<C, E>> {
        self.poll(false)
    }

    /// Pulls at most `n` further results and leaves the run suspended.
    pub fn pull(&mut self, n: usize) -> Vec<Traverser<C, E>> {
        let mut results = Vec::with_capacity(n.min(1024));
        while results.len() < n {
            match self.poll(true) {
                Some(t) => results.push(t),
                None => break,
            }
        }
        results
    }

    /// Evaluates the run.
    ///
    /// With a `limit`, this behaves like [`pull`](Self::pull). Without one it
    /// drains the stream, aborting with [`Error::ResourceExhausted`] when the
    /// configured maximum of emitted traversers is exceeded.
    pub fn evaluate(&mut self, limit: Option<usize>) -> Vec<Traverser<C, E>> {
        match limit {
            Some(n) => self.pull(n),
            None => {
                let mut results = Vec::new();
                while let Some(t) = self.poll(false) {
                    results.push(t);
                }
                results
            }
        }
    }

    /// Evaluates the run and packages the results with its status and a
    /// snapshot of its side effects.
    pub fn evaluation(&mut self, limit: Option<usize>) -> Evaluation<C, E> {
        let results = self.evaluate(limit);
        Evaluation {
            results,
            status: self.status.clone(),
            side_effects: self.side_effects().snapshot(),
        }
    }

    /// Requests cancellation and ends the run.
    pub fn cancel(&mut self) {
        self.execution.context().cancel();
        self.close();
    }

    /// Returns a token that cancels this run from another thread.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.execution.context().cancellation_token()
    }

    /// Ends the run and releases its sources.
    ///
    /// A run closed while suspended reports [`RunStatus::Cancelled`].
    pub fn close(&mut self) {
        self.execution.close();
        if !self.status.is_terminal() {
            debug!(emitted = self.emitted, "run closed while suspended");
            self.status = RunStatus::Cancelled;
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    /// Returns the number of results emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Returns the run's side-effect accumulators.
    #[must_use]
    pub fn side_effects(&self) -> &SideEffects {
        self.execution.context().side_effects()
    }

    /// Returns the run's statistics.
    #[must_use]
    pub fn stats(&self) -> &ExecutionStats {
        self.execution.context().stats()
    }

    fn poll(&mut self, bounded: bool) -> Option<Traverser<C, E>> {
        if self.status.is_terminal() {
            return None;
        }
        match self.execution.next_traverser() {
            Ok(Some(t)) => {
                let max = self.execution.context().config().max_traversers;
                if !bounded && max != 0 && self.emitted >= max as u64 {
                    self.execution.close();
                    self.abort(Error::ResourceExhausted {
                        resource: Resource::EmittedTraversers,
                        limit: max,
                    });
                    return None;
                }
                self.emitted += 1;
                Some(t)
            }
            Ok(None) => {
                debug!(
                    count = self.emitted,
                    elapsed_ms = self.stats().elapsed().as_millis() as u64,
                    "run completed"
                );
                self.status = RunStatus::Completed { count: self.emitted };
                None
            }
            Err(err) => {
                match Error::from_exec(err) {
                    Some(err) => self.abort(err),
                    None => {
                        debug!(emitted = self.emitted, "run cancelled");
                        self.status = RunStatus::Cancelled;
                    }
                }
                None
            }
        }
    }

    fn abort(&mut self, err: Error) {
        warn!(emitted = self.emitted, error = %err, "run aborted");
        self.status = RunStatus::Aborted(err);
    }
}

impl<C: Coefficient, E: Element> Iterator for Run<C, E> {
    type Item = Traverser<C, E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_result()
    }
}

impl<C, E> fmt::Debug for Run<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Run")
            .field("status", &self.status)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

/// The outcome of evaluating a run.
#[derive(Debug, Clone)]
pub struct Evaluation<C, E> {
    /// Results in emission order.
    pub results: Vec<Traverser<C, E>>,
    /// The run status after evaluation.
    pub status: RunStatus,
    /// Side-effect accumulators at the end of evaluation.
    pub side_effects: BTreeMap<Label, Accumulator>,
}

impl<C: Coefficient, E: Element> Evaluation<C, E> {
    /// Returns the result values, dropping coefficients and bindings.
    #[must_use]
    pub fn into_values(self) -> Vec<E> {
        self.results.into_iter().map(Traverser::into_value).collect()
    }

    /// Returns true if the run completed without error.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.status, RunStatus::Completed { .. })
    }

    /// Returns the error of an aborted run.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.status.error()
    }
}

impl From<ExecError> for RunStatus {
    fn from(err: ExecError) -> Self {
        Error::from_exec(err).map_or(Self::Cancelled, Self::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use tmachine_core::{StepFailure, Unit};
    use tmachine_pipeline::{ExecutionConfig, ExecutionContext, TraversalSource};

    use super::*;

    fn run_of(values: Vec<i64>, config: ExecutionConfig) -> Run<Unit, i64> {
        let pipeline = TraversalSource::<Unit>::new().inject(values).compile().unwrap();
        Run::new(pipeline.run(ExecutionContext::new().with_config(config)))
    }

    #[test]
    fn pull_suspends_and_resumes() {
        let mut run = run_of(vec![1, 2, 3, 4, 5], ExecutionConfig::default());

        let first: Vec<i64> = run.pull(2).into_iter().map(Traverser::into_value).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(run.status(), &RunStatus::Suspended);

        let rest: Vec<i64> = run.pull(10).into_iter().map(Traverser::into_value).collect();
        assert_eq!(rest, vec![3, 4, 5]);
        assert_eq!(run.status(), &RunStatus::Completed { count: 5 });
        assert_eq!(run.stats().read(), 5);
    }

    #[test]
    fn drain_enforces_max_traversers() {
        let mut run = run_of(vec![1, 2, 3, 4], ExecutionConfig::default().with_max_traversers(3));
        let results = run.evaluate(None);
        assert_eq!(results.len(), 3);
        assert_eq!(
            run.status(),
            &RunStatus::Aborted(Error::ResourceExhausted {
                resource: Resource::EmittedTraversers,
                limit: 3
            })
        );
        assert!(run.next().is_none());
    }

    #[test]
    fn drain_at_exact_bound_completes() {
        let mut run = run_of(vec![1, 2, 3], ExecutionConfig::default().with_max_traversers(3));
        assert_eq!(run.evaluate(None).len(), 3);
        assert_eq!(run.status(), &RunStatus::Completed { count: 3 });
    }

    #[test]
    fn limit_is_not_subject_to_max_traversers() {
        let mut run = run_of(vec![1, 2, 3, 4], ExecutionConfig::default().with_max_traversers(1));
        assert_eq!(run.evaluate(Some(3)).len(), 3);
        assert_eq!(run.status(), &RunStatus::Suspended);
    }

    #[test]
    fn close_while_suspended_is_cancelled() {
        let mut run = run_of(vec![1, 2], ExecutionConfig::default());
        assert_eq!(run.pull(1).len(), 1);
        run.close();
        assert_eq!(run.status(), &RunStatus::Cancelled);
        assert!(run.pull(5).is_empty());
    }

    #[test]
    fn failure_aborts_with_partial_results() {
        let pipeline = TraversalSource::<Unit>::new()
            .inject([4i64, 0, 2])
            .try_map(|v| {
                if *v == 0 {
                    Err(StepFailure::new("division by zero"))
                } else {
                    Ok(8 / v)
                }
            })
            .compile()
            .unwrap();
        let mut run = Run::new(pipeline.run(ExecutionContext::new()));

        let evaluation = run.evaluation(None);
        assert_eq!(evaluation.results.len(), 1);
        let err = evaluation.error().unwrap();
        assert_eq!(err.step_index(), Some(1));
        assert_eq!(err.element_index(), Some(2));
        assert!(!evaluation.is_complete());
    }

    #[test]
    fn status_from_exec_error() {
        assert_eq!(RunStatus::from(ExecError::Cancelled), RunStatus::Cancelled);
        assert!(RunStatus::from(ExecError::ResourceExhausted {
            resource: Resource::FrontierSize,
            limit: 1
        })
        .is_terminal());
    }
}
