//! Compiled pipelines and their executions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tmachine_core::{Coefficient, Element, Label, Traverser};
use tracing::{trace, warn};

use crate::chain::Chain;
use crate::context::ExecutionContext;
use crate::error::{CompileError, ExecError, ExecResult};
use crate::function::{InitialFunction, StepHeader};
use crate::operator::BoxedOperator;
use crate::operators::InitialOp;

/// The kind of a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Produces the starting traversers.
    Initial,
    /// One output per input.
    Map,
    /// Zero or more outputs per input.
    FlatMap,
    /// Passes or drops inputs.
    Filter,
    /// Records an effect and passes inputs.
    SideEffect,
    /// Bounded loop over a nested chain.
    Repeat,
}

/// A description of one compiled step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    /// Position in the pipeline (the initial step is 0). Steps of a repeat
    /// body are numbered from 1 within the body.
    pub index: usize,
    /// The step kind.
    pub kind: StepKind,
    /// The step name.
    pub name: String,
    /// The rendered arguments.
    pub args: Vec<String>,
    /// Labels the step binds.
    pub labels: Vec<Label>,
    /// Labels the step reads.
    pub requires: Vec<Label>,
    /// Steps of a repeat body.
    pub body: Vec<StepInfo>,
    /// Whether a repeat body is guaranteed to run at least once.
    pub guarantees_iteration: bool,
}

impl StepInfo {
    /// Describes the step with `header`.
    #[must_use]
    pub fn new<C>(index: usize, kind: StepKind, header: &StepHeader<C>) -> Self {
        Self {
            index,
            kind,
            name: header.name().to_owned(),
            args: header.args().to_vec(),
            labels: header.labels().to_vec(),
            requires: header.requires().to_vec(),
            body: Vec::new(),
            guarantees_iteration: false,
        }
    }

    /// Renders the step without its body.
    fn head(&self) -> String {
        let mut out = self.name.clone();
        if !self.args.is_empty() {
            out.push_str(&format!("({})", self.args.join(", ")));
        }
        for label in &self.labels {
            out.push_str(&format!("@{label}"));
        }
        out
    }
}

impl fmt::Display for StepInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.kind == StepKind::Repeat {
            write!(f, "({}", Steps(&self.body))?;
            for arg in &self.args {
                write!(f, ", {arg}")?;
            }
            f.write_str(")")?;
        } else if !self.args.is_empty() {
            write!(f, "({})", self.args.join(", "))?;
        }
        for label in &self.labels {
            write!(f, "@{label}")?;
        }
        Ok(())
    }
}

/// Renders a step list in brackets.
struct Steps<'a>(&'a [StepInfo]);

impl fmt::Display for Steps<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{step}")?;
        }
        f.write_str("]")
    }
}

/// An immutable, validated pipeline from `S` to `E`.
///
/// Cloning is cheap; clones share the step descriptors. Each call to
/// [`run`](Self::run) builds a fresh operator tree, so runs never share
/// mutable state.
pub struct Pipeline<C, S, E> {
    initial: InitialFunction<C, S>,
    chain: Arc<dyn Chain<C, S, E>>,
    steps: Arc<[StepInfo]>,
}

impl<C: Coefficient, S: Element, E: Element> Pipeline<C, S, E> {
    /// Validates and seals a pipeline.
    pub(crate) fn compile(
        initial: InitialFunction<C, S>,
        chain: Box<dyn Chain<C, S, E>>,
    ) -> Result<Self, CompileError> {
        let mut steps = vec![StepInfo::new(0, StepKind::Initial, initial.header())];
        chain.describe(&mut steps);
        check_scope(&steps, &mut BTreeSet::new())?;
        Ok(Self { initial, chain: Arc::from(chain), steps: steps.into() })
    }

    /// Starts a run.
    ///
    /// Nothing is evaluated until the returned execution is pulled.
    #[must_use]
    pub fn run(&self, ctx: ExecutionContext) -> Execution<C, E> {
        let source: BoxedOperator<C, S> = Box::new(InitialOp::new(self.initial.clone()));
        Execution::new(self.chain.attach(source), ctx)
    }

    /// Returns the step descriptions, initial step first.
    #[must_use]
    pub fn steps(&self) -> &[StepInfo] {
        &self.steps
    }

    /// Returns the number of steps, including the initial step.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false: a compiled pipeline has at least its initial step.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the labels every emitted traverser is guaranteed to carry.
    #[must_use]
    pub fn bound_labels(&self) -> BTreeSet<Label> {
        let mut bound = BTreeSet::new();
        collect_bound(&self.steps, &mut bound);
        bound
    }

    /// Renders one step per line, with repeat bodies indented.
    #[must_use]
    pub fn explain(&self) -> String {
        let mut out = String::new();
        explain_into(&self.steps, 0, &mut out);
        out
    }
}

impl<C, S, E> Clone for Pipeline<C, S, E>
where
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            chain: Arc::clone(&self.chain),
            steps: Arc::clone(&self.steps),
        }
    }
}

impl<C, S, E> fmt::Display for Pipeline<C, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Steps(&self.steps))
    }
}

impl<C, S, E> fmt::Debug for Pipeline<C, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("steps", &self.to_string()).finish()
    }
}

fn explain_into(steps: &[StepInfo], depth: usize, out: &mut String) {
    for step in steps {
        let indent = depth * 2;
        out.push_str(&format!("{:indent$}{}: {}\n", "", step.index, step.head()));
        explain_into(&step.body, depth + 1, out);
    }
}

/// Checks label scoping, extending `bound` with every label bound on the
/// way through `steps`.
fn check_scope(steps: &[StepInfo], bound: &mut BTreeSet<Label>) -> Result<(), CompileError> {
    for step in steps {
        if let Some(label) = step.labels.iter().chain(&step.requires).find(|l| l.is_blank()) {
            return Err(CompileError::malformed(
                step.index,
                step.to_string(),
                format!("label '{label}' is blank"),
            ));
        }

        if let Some(label) = step.requires.iter().find(|l| !bound.contains(*l)) {
            return Err(CompileError::UnboundLabel {
                step_index: step.index,
                step: step.to_string(),
                label: label.clone(),
            });
        }

        if step.kind == StepKind::Repeat {
            if step.body.is_empty() {
                return Err(CompileError::malformed(
                    step.index,
                    step.to_string(),
                    "repeat body is empty",
                ));
            }
            let mut inner = bound.clone();
            check_scope(&step.body, &mut inner).map_err(|err| attribute(step, err))?;
            if step.guarantees_iteration {
                bound.extend(inner);
            }
        }

        bound.extend(step.labels.iter().cloned());
    }
    Ok(())
}

/// Extends `bound` with every label bound on the way through `steps`.
///
/// A repeat body contributes only when it is guaranteed to run.
fn collect_bound(steps: &[StepInfo], bound: &mut BTreeSet<Label>) {
    for step in steps {
        if step.kind == StepKind::Repeat && step.guarantees_iteration {
            collect_bound(&step.body, bound);
        }
        bound.extend(step.labels.iter().cloned());
    }
}

/// Reports a body error against the repeat step that holds the body.
fn attribute(repeat: &StepInfo, err: CompileError) -> CompileError {
    match err {
        CompileError::UnboundLabel { step, label, .. } => CompileError::UnboundLabel {
            step_index: repeat.index,
            step: format!("{}/{step}", repeat.name),
            label,
        },
        CompileError::Malformed { step, reason, .. } => CompileError::Malformed {
            step_index: repeat.index,
            step: format!("{}/{step}", repeat.name),
            reason,
        },
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Open,
    Done,
}

/// A lazy run of a pipeline.
///
/// Each pull evaluates just enough of the pipeline to produce the next
/// traverser. After the first error or the end of the stream, the operator
/// tree is closed and every further pull returns nothing.
pub struct Execution<C, E> {
    root: BoxedOperator<C, E>,
    ctx: ExecutionContext,
    phase: Phase,
}

impl<C, E> Execution<C, E> {
    fn new(root: BoxedOperator<C, E>, ctx: ExecutionContext) -> Self {
        Self { root, ctx, phase: Phase::Pending }
    }

    /// Returns the run's context.
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Returns true once the run has ended.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Pulls the next traverser.
    pub fn next_traverser(&mut self) -> ExecResult<Option<Traverser<C, E>>> {
        match self.phase {
            Phase::Done => return Ok(None),
            Phase::Pending => {
                self.phase = Phase::Open;
                if let Err(err) = self.root.open(&self.ctx) {
                    self.close();
                    return Err(err);
                }
            }
            Phase::Open => {}
        }

        match self.root.next() {
            Ok(Some(t)) => {
                self.ctx.record_produced(1);
                Ok(Some(t))
            }
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(err) => {
                if matches!(err, ExecError::Cancelled) {
                    trace!(produced = self.ctx.stats().produced(), "cancellation observed");
                }
                self.close();
                Err(err)
            }
        }
    }

    /// Ends the run and releases its operator tree.
    pub fn close(&mut self) {
        if self.phase == Phase::Done {
            return;
        }
        let was_open = self.phase == Phase::Open;
        self.phase = Phase::Done;
        if was_open {
            if let Err(err) = self.root.close() {
                warn!(error = %err, "failed to close operator tree");
            }
        }
    }
}

impl<C, E> Iterator for Execution<C, E> {
    type Item = ExecResult<Traverser<C, E>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_traverser().transpose()
    }
}

impl<C, E> fmt::Debug for Execution<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("operator", &self.root.name())
            .field("phase", &self.phase)
            .finish()
    }
}
