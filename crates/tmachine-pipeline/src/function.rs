//! Step descriptors.
//!
//! A pipeline is an [`InitialFunction`] followed by [`Function`]s. Each
//! descriptor pairs a [`StepHeader`] (name, arguments, weight, labels) with
//! the behavior of its kind. Descriptors are immutable once compiled and are
//! shared by every run of the pipeline.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tmachine_core::{Coefficient, Element, Label, StepFailure, Traverser};

use crate::chain::Chain;
use crate::context::ExecutionContext;

/// Result of applying a step function to one traverser.
pub type StepOutcome<T> = Result<T, StepFailure>;

/// A lazy sequence of values produced by an initial step.
pub type SourceCursor<S> = Box<dyn Iterator<Item = StepOutcome<S>> + Send>;

/// Opens a source cursor for one run.
pub type SourceFn<S> =
    Arc<dyn Fn(&ExecutionContext) -> StepOutcome<SourceCursor<S>> + Send + Sync>;

/// One traverser in, one value out.
pub type MapFn<C, S, E> =
    Arc<dyn Fn(&Traverser<C, S>, &ExecutionContext) -> StepOutcome<E> + Send + Sync>;

/// One traverser in, zero or more values out.
pub type FlatMapFn<C, S, E> =
    Arc<dyn Fn(&Traverser<C, S>, &ExecutionContext) -> StepOutcome<Vec<E>> + Send + Sync>;

/// Decides whether a traverser passes.
pub type PredicateFn<C, S> =
    Arc<dyn Fn(&Traverser<C, S>, &ExecutionContext) -> StepOutcome<bool> + Send + Sync>;

/// Records an effect for a traverser.
pub type EffectFn<C, S> =
    Arc<dyn Fn(&Traverser<C, S>, &ExecutionContext) -> StepOutcome<()> + Send + Sync>;

/// Re-types a traverser whose value passes through unchanged.
///
/// Only constructors on `Function<C, S, S>` create one, so it is always the
/// identity.
pub type Passthrough<C, S, E> = fn(Traverser<C, S>) -> Traverser<C, E>;

fn passthrough<C, S>(traverser: Traverser<C, S>) -> Traverser<C, S> {
    traverser
}

/// The parts of a step shared by every kind.
#[derive(Debug, Clone, PartialEq)]
pub struct StepHeader<C> {
    name: Cow<'static, str>,
    args: Vec<String>,
    coefficient: C,
    labels: Vec<Label>,
    requires: Vec<Label>,
}

impl<C: Coefficient> StepHeader<C> {
    /// Creates a header with the identity weight and no labels.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            coefficient: C::identity(),
            labels: Vec::new(),
            requires: Vec::new(),
        }
    }
}

impl<C> StepHeader<C> {
    /// Returns the step name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the rendered arguments.
    #[inline]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the step weight.
    #[inline]
    pub fn coefficient(&self) -> &C {
        &self.coefficient
    }

    /// Returns the labels this step binds.
    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Returns the labels this step reads.
    #[inline]
    pub fn requires(&self) -> &[Label] {
        &self.requires
    }

    pub(crate) fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    pub(crate) fn set_coefficient(&mut self, coefficient: C) {
        self.coefficient = coefficient;
    }

    pub(crate) fn add_label(&mut self, label: Label) {
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
    }

    pub(crate) fn add_requirement(&mut self, label: Label) {
        if !self.requires.contains(&label) {
            self.requires.push(label);
        }
    }
}

impl<C> fmt::Display for StepHeader<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            write!(f, "({})", self.args.join(", "))?;
        }
        for label in &self.labels {
            write!(f, "@{label}")?;
        }
        Ok(())
    }
}

/// How an initial step produces values.
pub enum InitialKind<S> {
    /// A fixed list of values, one traverser each, in order.
    Inject(Arc<[S]>),
    /// A cursor opened against the run's data source.
    Generate(SourceFn<S>),
}

impl<S> Clone for InitialKind<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Inject(values) => Self::Inject(Arc::clone(values)),
            Self::Generate(source) => Self::Generate(Arc::clone(source)),
        }
    }
}

/// The first step of a pipeline.
pub struct InitialFunction<C, S> {
    header: StepHeader<C>,
    kind: InitialKind<S>,
}

impl<C: Coefficient, S: Element> InitialFunction<C, S> {
    /// Emits one traverser per value, in order.
    #[must_use]
    pub fn inject(values: impl IntoIterator<Item = S>) -> Self {
        let values: Arc<[S]> = values.into_iter().collect();
        let mut header = StepHeader::new("inject");
        header.set_args(values.iter().map(|v| v.to_value().to_string()).collect());
        Self { header, kind: InitialKind::Inject(values) }
    }

    /// Emits the values of a cursor opened by `source` when the run starts.
    #[must_use]
    pub fn generate<F>(name: impl Into<Cow<'static, str>>, source: F) -> Self
    where
        F: Fn(&ExecutionContext) -> StepOutcome<SourceCursor<S>> + Send + Sync + 'static,
    {
        Self { header: StepHeader::new(name), kind: InitialKind::Generate(Arc::new(source)) }
    }
}

impl<C, S> InitialFunction<C, S> {
    /// Returns the step header.
    #[inline]
    pub fn header(&self) -> &StepHeader<C> {
        &self.header
    }

    /// Returns the step kind.
    #[inline]
    pub fn kind(&self) -> &InitialKind<S> {
        &self.kind
    }

    pub(crate) fn header_mut(&mut self) -> &mut StepHeader<C> {
        &mut self.header
    }

    /// Sets the rendered arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.header.set_args(args);
        self
    }

    /// Sets the weight every emitted traverser starts with.
    #[must_use]
    pub fn with_coefficient(mut self, coefficient: C) -> Self {
        self.header.set_coefficient(coefficient);
        self
    }

    /// Binds every emitted traverser's value under `label`.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Label>) -> Self {
        self.header.add_label(label.into());
        self
    }
}

impl<C: Clone, S> Clone for InitialFunction<C, S> {
    fn clone(&self) -> Self {
        Self { header: self.header.clone(), kind: self.kind.clone() }
    }
}

impl<C, S> fmt::Debug for InitialFunction<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialFunction").field("step", &self.header.to_string()).finish()
    }
}

/// When a repeat step stops iterating.
pub enum Loop<C, S> {
    /// After exactly this many iterations.
    Times(usize),
    /// After the first iteration whose survivors all satisfy the predicate.
    Until(PredicateFn<C, S>),
}

impl<C: Coefficient, S: Element> Loop<C, S> {
    /// Stops after `n` iterations.
    #[must_use]
    pub fn times(n: usize) -> Self {
        Self::Times(n)
    }

    /// Stops once every survivor satisfies `predicate`.
    #[must_use]
    pub fn until<F>(predicate: F) -> Self
    where
        F: Fn(&Traverser<C, S>) -> bool + Send + Sync + 'static,
    {
        Self::Until(Arc::new(move |t, _| Ok(predicate(t))))
    }

    /// Stops once every survivor's value satisfies `predicate`.
    #[must_use]
    pub fn until_value<F>(predicate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Self::Until(Arc::new(move |t, _| Ok(predicate(t.value()))))
    }
}

impl<C, S> Loop<C, S> {
    /// Returns true if every input runs through the body at least once.
    #[must_use]
    pub fn guarantees_iteration(&self) -> bool {
        match self {
            Self::Times(n) => *n > 0,
            Self::Until(_) => true,
        }
    }
}

impl<C, S> Clone for Loop<C, S> {
    fn clone(&self) -> Self {
        match self {
            Self::Times(n) => Self::Times(*n),
            Self::Until(predicate) => Self::Until(Arc::clone(predicate)),
        }
    }
}

impl<C, S> fmt::Display for Loop<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Times(n) => write!(f, "times={n}"),
            Self::Until(_) => f.write_str("until"),
        }
    }
}

/// The behavior of a non-initial step.
pub enum FunctionKind<C, S, E> {
    /// Exactly one output per input.
    Map(MapFn<C, S, E>),
    /// Zero or more outputs per input, in order.
    FlatMap(FlatMapFn<C, S, E>),
    /// The input, unchanged, if the predicate holds.
    Filter {
        /// The predicate.
        predicate: PredicateFn<C, S>,
        /// Identity re-typing.
        pass: Passthrough<C, S, E>,
    },
    /// The input, unchanged, after recording an effect.
    SideEffect {
        /// The effect.
        effect: EffectFn<C, S>,
        /// Identity re-typing.
        pass: Passthrough<C, S, E>,
    },
    /// The final frontier of a bounded loop over a nested chain.
    Repeat {
        /// The loop body.
        body: Arc<dyn Chain<C, S, S>>,
        /// When to stop.
        bound: Loop<C, S>,
        /// Identity re-typing.
        pass: Passthrough<C, S, E>,
    },
}

impl<C, S, E> Clone for FunctionKind<C, S, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Map(f) => Self::Map(Arc::clone(f)),
            Self::FlatMap(f) => Self::FlatMap(Arc::clone(f)),
            Self::Filter { predicate, pass } => {
                Self::Filter { predicate: Arc::clone(predicate), pass: *pass }
            }
            Self::SideEffect { effect, pass } => {
                Self::SideEffect { effect: Arc::clone(effect), pass: *pass }
            }
            Self::Repeat { body, bound, pass } => {
                Self::Repeat { body: Arc::clone(body), bound: bound.clone(), pass: *pass }
            }
        }
    }
}

impl<C, S, E> FunctionKind<C, S, E> {
    /// Returns the kind tag.
    #[must_use]
    pub fn tag(&self) -> crate::pipeline::StepKind {
        use crate::pipeline::StepKind;
        match self {
            Self::Map(_) => StepKind::Map,
            Self::FlatMap(_) => StepKind::FlatMap,
            Self::Filter { .. } => StepKind::Filter,
            Self::SideEffect { .. } => StepKind::SideEffect,
            Self::Repeat { .. } => StepKind::Repeat,
        }
    }
}

/// A non-initial step consuming `S` and producing `E`.
pub struct Function<C, S, E> {
    header: StepHeader<C>,
    kind: FunctionKind<C, S, E>,
}

impl<C: Coefficient, S: Element, E: Element> Function<C, S, E> {
    /// Creates a map step.
    #[must_use]
    pub fn map<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(&Traverser<C, S>, &ExecutionContext) -> StepOutcome<E> + Send + Sync + 'static,
    {
        Self { header: StepHeader::new(name), kind: FunctionKind::Map(Arc::new(f)) }
    }

    /// Creates a flatMap step.
    #[must_use]
    pub fn flat_map<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(&Traverser<C, S>, &ExecutionContext) -> StepOutcome<Vec<E>> + Send + Sync + 'static,
    {
        Self { header: StepHeader::new(name), kind: FunctionKind::FlatMap(Arc::new(f)) }
    }
}

impl<C: Coefficient, S: Element> Function<C, S, S> {
    /// Creates a filter step.
    #[must_use]
    pub fn filter<F>(name: impl Into<Cow<'static, str>>, predicate: F) -> Self
    where
        F: Fn(&Traverser<C, S>, &ExecutionContext) -> StepOutcome<bool> + Send + Sync + 'static,
    {
        Self {
            header: StepHeader::new(name),
            kind: FunctionKind::Filter { predicate: Arc::new(predicate), pass: passthrough },
        }
    }

    /// Creates a side-effect step.
    #[must_use]
    pub fn side_effect<F>(name: impl Into<Cow<'static, str>>, effect: F) -> Self
    where
        F: Fn(&Traverser<C, S>, &ExecutionContext) -> StepOutcome<()> + Send + Sync + 'static,
    {
        Self {
            header: StepHeader::new(name),
            kind: FunctionKind::SideEffect { effect: Arc::new(effect), pass: passthrough },
        }
    }

    pub(crate) fn repeat(body: Arc<dyn Chain<C, S, S>>, bound: Loop<C, S>) -> Self {
        let mut header = StepHeader::new("repeat");
        header.set_args(vec![bound.to_string()]);
        Self { header, kind: FunctionKind::Repeat { body, bound, pass: passthrough } }
    }
}

impl<C, S, E> Function<C, S, E> {
    /// Returns the step header.
    #[inline]
    pub fn header(&self) -> &StepHeader<C> {
        &self.header
    }

    /// Returns the step kind.
    #[inline]
    pub fn kind(&self) -> &FunctionKind<C, S, E> {
        &self.kind
    }

    pub(crate) fn header_mut(&mut self) -> &mut StepHeader<C> {
        &mut self.header
    }

    /// Sets the rendered arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.header.set_args(args);
        self
    }

    /// Sets the step weight.
    #[must_use]
    pub fn with_coefficient(mut self, coefficient: C) -> Self {
        self.header.set_coefficient(coefficient);
        self
    }

    /// Binds every emitted traverser's value under `label`.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Label>) -> Self {
        self.header.add_label(label.into());
        self
    }

    /// Declares that the step reads `label`.
    ///
    /// Compilation fails unless an upstream step binds it.
    #[must_use]
    pub fn requiring(mut self, label: impl Into<Label>) -> Self {
        self.header.add_requirement(label.into());
        self
    }
}

impl<C: Clone, S, E> Clone for Function<C, S, E> {
    fn clone(&self) -> Self {
        Self { header: self.header.clone(), kind: self.kind.clone() }
    }
}

impl<C, S, E> fmt::Debug for Function<C, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("kind", &self.kind.tag())
            .field("step", &self.header.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmachine_core::{Count, Unit, Value};

    #[test]
    fn header_rendering() {
        let mut header = StepHeader::<Unit>::new("out");
        assert_eq!(header.to_string(), "out");

        header.set_args(vec!["knows".into(), "likes".into()]);
        header.add_label(Label::new("a"));
        header.add_label(Label::new("b"));
        assert_eq!(header.to_string(), "out(knows, likes)@a@b");
    }

    #[test]
    fn labels_are_deduplicated() {
        let mut header = StepHeader::<Unit>::new("map");
        header.add_label(Label::new("a"));
        header.add_label(Label::new("a"));
        assert_eq!(header.labels().len(), 1);
    }

    #[test]
    fn inject_renders_values() {
        let initial = InitialFunction::<Unit, i64>::inject([1, 2, 3]).with_label("x");
        assert_eq!(initial.header().to_string(), "inject(1, 2, 3)@x");
        match initial.kind() {
            InitialKind::Inject(values) => assert_eq!(&values[..], &[1, 2, 3]),
            InitialKind::Generate(_) => panic!("expected inject"),
        }
    }

    #[test]
    fn function_builders() {
        let f = Function::<Count, i64, Value>::map("map", |t, _| Ok(Value::Int(*t.value())))
            .with_coefficient(Count::new(3))
            .with_label("m")
            .requiring("a");
        assert_eq!(f.header().coefficient(), &Count::new(3));
        assert_eq!(f.header().requires(), &[Label::new("a")]);
        assert_eq!(f.kind().tag(), crate::pipeline::StepKind::Map);
    }

    #[test]
    fn loop_guarantees() {
        assert!(!Loop::<Unit, i64>::times(0).guarantees_iteration());
        assert!(Loop::<Unit, i64>::times(2).guarantees_iteration());
        assert!(Loop::<Unit, i64>::until_value(|v| *v > 3).guarantees_iteration());
        assert_eq!(Loop::<Unit, i64>::times(2).to_string(), "times=2");
    }
}
