//! Execution context for pipeline runs.
//!
//! The execution context provides access to the graph, the run's
//! side-effect accumulators, cancellation, statistics, and runtime
//! configuration. Cloning a context shares all of them; every operator in a
//! run holds a clone of the same context.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tmachine_graph::{GraphAccessor, NullGraphAccessor};

use crate::error::{ExecError, ExecResult};
use crate::side_effect::SideEffects;

/// Execution context for a single run.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Cancellation flag, shared with any token handed out.
    cancellation: CancellationToken,
    /// Execution statistics.
    stats: Arc<ExecutionStats>,
    /// Configuration options.
    config: ExecutionConfig,
    /// Graph accessor for graph steps.
    graph: Arc<dyn GraphAccessor>,
    /// Accumulators written by side-effect steps.
    side_effects: SideEffects,
}

impl ExecutionContext {
    /// Creates a new execution context without graph storage.
    ///
    /// Use [`with_graph`](Self::with_graph) to add graph storage access.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            stats: Arc::new(ExecutionStats::new()),
            config: ExecutionConfig::default(),
            graph: Arc::new(NullGraphAccessor),
            side_effects: SideEffects::new(),
        }
    }

    /// Sets the graph accessor for graph steps.
    #[must_use]
    pub fn with_graph(mut self, graph: Arc<dyn GraphAccessor>) -> Self {
        self.graph = graph;
        self
    }

    /// Sets the execution configuration.
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `token` as this context's cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns a reference to the graph accessor.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &dyn GraphAccessor {
        self.graph.as_ref()
    }

    /// Returns the run's side-effect accumulators.
    #[inline]
    #[must_use]
    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    /// Cancels the run.
    #[inline]
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Checks if the run has been cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns [`ExecError::Cancelled`] if the run has been cancelled.
    #[inline]
    pub fn check_cancelled(&self) -> ExecResult<()> {
        if self.is_cancelled() {
            Err(ExecError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Returns a token that cancels this run.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Returns the execution statistics.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Records that source elements were read.
    #[inline]
    pub fn record_read(&self, count: u64) {
        self.stats.read.fetch_add(count, Ordering::Relaxed);
    }

    /// Records that traversers were emitted by the run.
    #[inline]
    pub fn record_produced(&self, count: u64) {
        self.stats.produced.fetch_add(count, Ordering::Relaxed);
    }

    /// Records that traversers were filtered out.
    #[inline]
    pub fn record_filtered(&self, count: u64) {
        self.stats.filtered.fetch_add(count, Ordering::Relaxed);
    }

    /// Records that traversers were dropped after a step failure.
    #[inline]
    pub fn record_skipped(&self, count: u64) {
        self.stats.skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// Records completed repeat iterations.
    #[inline]
    pub fn record_iterations(&self, count: u64) {
        self.stats.iterations.fetch_add(count, Ordering::Relaxed);
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancelled", &self.is_cancelled())
            .field("stats", &self.stats)
            .field("config", &self.config)
            .field("graph", &"<GraphAccessor>")
            .field("side_effects", &self.side_effects)
            .finish()
    }
}

/// Execution statistics collected during a run.
#[derive(Debug)]
pub struct ExecutionStats {
    /// When execution started.
    start_time: Instant,
    /// Elements read from initial steps.
    read: AtomicU64,
    /// Traversers emitted by the run.
    produced: AtomicU64,
    /// Traversers removed by filters.
    filtered: AtomicU64,
    /// Traversers dropped under [`ErrorPolicy::SkipAndContinue`].
    skipped: AtomicU64,
    /// Repeat iterations run.
    iterations: AtomicU64,
}

impl ExecutionStats {
    /// Creates new execution statistics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            read: AtomicU64::new(0),
            produced: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
        }
    }

    /// Returns the number of source elements read.
    #[inline]
    #[must_use]
    pub fn read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    /// Returns the number of traversers emitted by the run.
    #[inline]
    #[must_use]
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Returns the number of traversers filtered out.
    #[inline]
    #[must_use]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    /// Returns the number of traversers skipped after failures.
    #[inline]
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Returns the number of repeat iterations run.
    #[inline]
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Returns the elapsed execution time.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl Default for ExecutionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Default maximum traversers a drained run may emit.
pub const DEFAULT_MAX_TRAVERSERS: usize = 1_000_000;

/// Default maximum iterations of a single repeat loop.
pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 10_000;

/// Default maximum traversers in a repeat frontier.
pub const DEFAULT_MAX_FRONTIER_SIZE: usize = 1_000_000;

/// What a run does when a step function fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the run and report the failure.
    #[default]
    Abort,
    /// Drop the failing traverser, log it, and keep going.
    SkipAndContinue,
}

/// Configuration options for pipeline execution.
///
/// Every limit can be set to 0 to disable it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum traversers a run evaluated without a limit may emit.
    ///
    /// Exceeding it aborts the run with a resource error. Runs evaluated
    /// with an explicit limit are bounded by that limit instead.
    /// Default: 1,000,000.
    pub max_traversers: usize,
    /// Maximum iterations of one repeat loop for one input traverser.
    ///
    /// Default: 10,000.
    pub max_loop_iterations: usize,
    /// Maximum traversers a repeat loop may hold between iterations.
    ///
    /// Default: 1,000,000.
    pub max_frontier_size: usize,
    /// Behavior on step failure.
    pub error_policy: ErrorPolicy,
}

impl ExecutionConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_traversers: DEFAULT_MAX_TRAVERSERS,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            max_frontier_size: DEFAULT_MAX_FRONTIER_SIZE,
            error_policy: ErrorPolicy::Abort,
        }
    }

    /// Sets the maximum traversers a drained run may emit.
    #[must_use]
    pub const fn with_max_traversers(mut self, limit: usize) -> Self {
        self.max_traversers = limit;
        self
    }

    /// Sets the maximum iterations of a repeat loop.
    #[must_use]
    pub const fn with_max_loop_iterations(mut self, limit: usize) -> Self {
        self.max_loop_iterations = limit;
        self
    }

    /// Sets the maximum size of a repeat frontier.
    #[must_use]
    pub const fn with_max_frontier_size(mut self, limit: usize) -> Self {
        self.max_frontier_size = limit;
        self
    }

    /// Sets the error policy.
    #[must_use]
    pub const fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle for cancelling a run.
///
/// Can be shared between threads to allow cancellation from outside
/// the thread that pulls results.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Cancels the associated run.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks if cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
