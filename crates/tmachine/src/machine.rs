//! The traversal machine façade.

use std::fmt;
use std::sync::Arc;

use tmachine_core::{Coefficient, Element};
use tmachine_graph::{GraphAccessor, NullGraphAccessor};
use tmachine_pipeline::{CancellationToken, ExecutionConfig, ExecutionContext, Pipeline};
use tracing::debug;

use crate::run::{Evaluation, Run};

/// Evaluates compiled pipelines against a graph.
///
/// The machine holds only the graph handle and the configuration. Each
/// submission gets a fresh [`ExecutionContext`], so concurrent runs of the
/// same pipeline never share side effects, statistics or cancellation.
#[derive(Clone)]
pub struct TraversalMachine {
    graph: Arc<dyn GraphAccessor>,
    config: ExecutionConfig,
}

impl TraversalMachine {
    /// Creates a machine reading from `graph`.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphAccessor>) -> Self {
        Self { graph, config: ExecutionConfig::default() }
    }

    /// Creates a machine for pipelines that do not read a graph.
    ///
    /// Graph steps fail with a step error.
    #[must_use]
    pub fn without_graph() -> Self {
        Self::new(Arc::new(NullGraphAccessor))
    }

    /// Sets the execution configuration.
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the execution configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Returns the graph the machine reads from.
    #[must_use]
    pub fn graph(&self) -> &Arc<dyn GraphAccessor> {
        &self.graph
    }

    /// Starts a run of `pipeline`.
    ///
    /// Nothing is evaluated until the run is pulled.
    #[must_use]
    pub fn submit<C, S, E>(&self, pipeline: &Pipeline<C, S, E>) -> Run<C, E>
    where
        C: Coefficient,
        S: Element,
        E: Element,
    {
        self.submit_with_token(pipeline, CancellationToken::new())
    }

    /// Starts a run of `pipeline` that `token` can cancel.
    #[must_use]
    pub fn submit_with_token<C, S, E>(
        &self,
        pipeline: &Pipeline<C, S, E>,
        token: CancellationToken,
    ) -> Run<C, E>
    where
        C: Coefficient,
        S: Element,
        E: Element,
    {
        debug!(pipeline = %pipeline, "submitting pipeline");
        let ctx = ExecutionContext::new()
            .with_graph(Arc::clone(&self.graph))
            .with_config(self.config.clone())
            .with_cancellation(token);
        Run::new(pipeline.run(ctx))
    }

    /// Evaluates `pipeline` in one shot.
    ///
    /// Without a `limit` the stream is drained. With one, evaluation stops
    /// after `limit` results, the status stays [`Suspended`] and the rest of
    /// the lazy state is discarded.
    ///
    /// [`Suspended`]: crate::RunStatus::Suspended
    #[must_use]
    pub fn evaluate<C, S, E>(
        &self,
        pipeline: &Pipeline<C, S, E>,
        limit: Option<usize>,
    ) -> Evaluation<C, E>
    where
        C: Coefficient,
        S: Element,
        E: Element,
    {
        let mut run = self.submit(pipeline);
        let evaluation = run.evaluation(limit);
        run.close();
        evaluation
    }
}

impl Default for TraversalMachine {
    fn default() -> Self {
        Self::without_graph()
    }
}

impl fmt::Debug for TraversalMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraversalMachine").field("config", &self.config).finish_non_exhaustive()
    }
}
