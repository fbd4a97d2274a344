//! Typed pipeline builder.
//!
//! A [`Traversal<C, S, E>`] is a pipeline under construction: it starts
//! from values of type `S`, currently produces values of type `E`, and
//! weighs its traversers with coefficients of type `C`. Each builder step
//! consumes the traversal and returns one whose end type is the step's
//! output type, so a mistyped pipeline does not compile.
//!
//! ```
//! use tmachine_core::Count;
//! use tmachine_pipeline::TraversalSource;
//!
//! let g = TraversalSource::<Count>::new();
//! let pipeline = g
//!     .inject([1i64, 2, 3])
//!     .as_("n")
//!     .map(|v| v * 10)
//!     .select("n")
//!     .compile()
//!     .unwrap();
//! assert_eq!(pipeline.to_string(), "[inject(1, 2, 3)@n, map, select(n)]");
//! ```

mod graph;

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tmachine_core::{Coefficient, Element, Label, StepFailure, Traverser, Value};

use crate::chain::{Chain, Identity, Link};
use crate::context::ExecutionContext;
use crate::error::CompileError;
use crate::function::{Function, InitialFunction, Loop, SourceCursor, StepOutcome};
use crate::pipeline::{Pipeline, StepInfo, StepKind};
use crate::side_effect::SideEffects;

/// Entry point for building traversals with coefficient type `C`.
pub struct TraversalSource<C> {
    _coefficient: PhantomData<fn() -> C>,
}

impl<C: Coefficient> TraversalSource<C> {
    /// Creates a source.
    #[must_use]
    pub const fn new() -> Self {
        Self { _coefficient: PhantomData }
    }

    /// Starts a traversal from literal values.
    #[must_use]
    pub fn inject<S: Element>(&self, values: impl IntoIterator<Item = S>) -> Traversal<C, S, S> {
        self.start_from(InitialFunction::inject(values))
    }

    /// Starts a traversal from a cursor opened when the run starts.
    #[must_use]
    pub fn generate<S, F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        source: F,
    ) -> Traversal<C, S, S>
    where
        S: Element,
        F: Fn(&ExecutionContext) -> StepOutcome<SourceCursor<S>> + Send + Sync + 'static,
    {
        self.start_from(InitialFunction::generate(name, source))
    }

    /// Starts a traversal from a prepared initial step.
    #[must_use]
    pub fn start_from<S: Element>(&self, initial: InitialFunction<C, S>) -> Traversal<C, S, S> {
        Traversal { initial: Some(initial), chain: Box::new(Identity), problems: Vec::new() }
    }
}

impl<C: Coefficient> Default for TraversalSource<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for TraversalSource<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for TraversalSource<C> {}

impl<C> fmt::Debug for TraversalSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TraversalSource")
    }
}

/// A pipeline under construction.
pub struct Traversal<C, S, E> {
    initial: Option<InitialFunction<C, S>>,
    chain: Box<dyn Chain<C, S, E>>,
    /// Problems found while building, reported by [`compile`](Self::compile).
    problems: Vec<CompileError>,
}

impl<C: Coefficient, S: Element> Traversal<C, S, S> {
    /// Starts an anonymous traversal with no initial step.
    ///
    /// Anonymous traversals are used as repeat bodies; compiling one on its
    /// own fails with [`CompileError::MissingInitial`].
    #[must_use]
    pub fn start() -> Self {
        Self { initial: None, chain: Box::new(Identity), problems: Vec::new() }
    }
}

impl<C: Coefficient, S: Element, E: Element> Traversal<C, S, E> {
    /// Appends a step.
    #[must_use]
    pub fn then<F: Element>(self, function: Function<C, E, F>) -> Traversal<C, S, F> {
        let index = self.chain.len() + 1;
        Traversal {
            initial: self.initial,
            chain: Box::new(Link::new(self.chain, function, index)),
            problems: self.problems,
        }
    }

    /// Transforms each value.
    #[must_use]
    pub fn map<F, M>(self, f: M) -> Traversal<C, S, F>
    where
        F: Element,
        M: Fn(&E) -> F + Send + Sync + 'static,
    {
        self.then(Function::<C, E, F>::map("map", move |t, _| Ok(f(t.value()))))
    }

    /// Transforms each value with a function that may fail.
    #[must_use]
    pub fn try_map<F, M>(self, f: M) -> Traversal<C, S, F>
    where
        F: Element,
        M: Fn(&E) -> Result<F, StepFailure> + Send + Sync + 'static,
    {
        self.then(Function::<C, E, F>::map("map", move |t, _| f(t.value())))
    }

    /// Expands each value into zero or more values.
    #[must_use]
    pub fn flat_map<F, I, M>(self, f: M) -> Traversal<C, S, F>
    where
        F: Element,
        I: IntoIterator<Item = F>,
        M: Fn(&E) -> I + Send + Sync + 'static,
    {
        self.then(Function::<C, E, F>::flat_map("flatMap", move |t, _| {
            Ok(f(t.value()).into_iter().collect())
        }))
    }

    /// Keeps the values satisfying `predicate`.
    #[must_use]
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.then(Function::<C, E, E>::filter("filter", move |t, _| Ok(predicate(t.value()))))
    }

    /// Keeps the traversers satisfying `predicate`.
    ///
    /// The predicate sees the traverser's bindings and coefficient.
    #[must_use]
    pub fn filter_traverser<P>(self, predicate: P) -> Self
    where
        P: Fn(&Traverser<C, E>) -> bool + Send + Sync + 'static,
    {
        self.then(Function::<C, E, E>::filter("filter", move |t, _| Ok(predicate(t))))
    }

    /// Keeps the traversers whose value and `label` binding satisfy
    /// `predicate`.
    #[must_use]
    pub fn where_bound<P>(self, label: impl Into<Label>, predicate: P) -> Self
    where
        P: Fn(&E, &Value) -> bool + Send + Sync + 'static,
    {
        let label = label.into();
        let bound = label.clone();
        let step = Function::<C, E, E>::filter("where", move |t, _| {
            let value = t
                .binding(bound.as_str())
                .ok_or_else(|| StepFailure::new(format!("label '{bound}' is not bound")))?;
            Ok(predicate(t.value(), value))
        });
        self.then(step.with_args(vec![label.to_string()]).requiring(label))
    }

    /// Runs `effect` for each traverser and passes it on unchanged.
    #[must_use]
    pub fn side_effect<X>(self, effect: X) -> Self
    where
        X: Fn(&Traverser<C, E>, &SideEffects) -> Result<(), StepFailure> + Send + Sync + 'static,
    {
        self.then(Function::<C, E, E>::side_effect("sideEffect", move |t, ctx| {
            effect(t, ctx.side_effects())
        }))
    }

    /// Counts traversers into the side effect `label`.
    #[must_use]
    pub fn count_into(self, label: impl Into<Label>) -> Self {
        let label = label.into();
        let key = label.clone();
        let step = Function::<C, E, E>::side_effect("count", move |_, ctx| {
            ctx.side_effects().increment(&key, 1)
        });
        self.then(step.with_args(vec![label.to_string()]))
    }

    /// Collects values into the side effect `label`.
    #[must_use]
    pub fn aggregate_into(self, label: impl Into<Label>) -> Self {
        let label = label.into();
        let key = label.clone();
        let step = Function::<C, E, E>::side_effect("aggregate", move |t, ctx| {
            ctx.side_effects().append(&key, t.value().to_value())
        });
        self.then(step.with_args(vec![label.to_string()]))
    }

    /// Replaces each value with the value bound to `label`.
    #[must_use]
    pub fn select(self, label: impl Into<Label>) -> Traversal<C, S, Value> {
        let label = label.into();
        let bound = label.clone();
        let step = Function::<C, E, Value>::map("select", move |t, _| {
            t.binding(bound.as_str())
                .cloned()
                .ok_or_else(|| StepFailure::new(format!("label '{bound}' is not bound")))
        });
        self.then(step.with_args(vec![label.to_string()]).requiring(label))
    }

    /// Replaces each value with `value`.
    #[must_use]
    pub fn constant<F: Element>(self, value: F) -> Traversal<C, S, F> {
        let args = vec![value.to_value().to_string()];
        let step = Function::<C, E, F>::map("constant", move |_, _| Ok(value.clone()));
        self.then(step.with_args(args))
    }

    /// Feeds each traverser through `body` until `bound` stops the loop.
    ///
    /// `body` must be an anonymous traversal from [`Traversal::start`].
    #[must_use]
    pub fn repeat(mut self, body: Traversal<C, E, E>, bound: Loop<C, E>) -> Self {
        let index = self.chain.len() + 1;
        if body.initial.is_some() {
            self.problems.push(CompileError::malformed(
                index,
                "repeat",
                "repeat body must not start with an initial step",
            ));
        }
        self.problems.extend(body.problems);
        self.then(Function::repeat(Arc::from(body.chain), bound))
    }

    /// Binds the current step's output under `label`.
    #[must_use]
    pub fn as_(mut self, label: impl Into<Label>) -> Self {
        let label = label.into();
        if let Some(header) = self.chain.last_header_mut() {
            header.add_label(label);
        } else if let Some(initial) = self.initial.as_mut() {
            initial.header_mut().add_label(label);
        } else {
            self.problems.push(CompileError::malformed(
                0,
                "as",
                format!("label '{label}' has no step to attach to"),
            ));
        }
        self
    }

    /// Sets the current step's weight.
    #[must_use]
    pub fn weighted(mut self, coefficient: C) -> Self {
        if let Some(header) = self.chain.last_header_mut() {
            header.set_coefficient(coefficient);
        } else if let Some(initial) = self.initial.as_mut() {
            initial.header_mut().set_coefficient(coefficient);
        } else {
            self.problems.push(CompileError::malformed(0, "weight", "no step to weigh"));
        }
        self
    }

    /// Returns the number of steps so far, including the initial step.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len() + usize::from(self.initial.is_some())
    }

    /// Returns true if no step was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates the traversal and seals it into a [`Pipeline`].
    pub fn compile(self) -> Result<Pipeline<C, S, E>, CompileError> {
        if let Some(problem) = self.problems.into_iter().next() {
            return Err(problem);
        }
        let initial = self.initial.ok_or(CompileError::MissingInitial)?;
        Pipeline::compile(initial, self.chain)
    }
}

impl<C, S, E> fmt::Debug for Traversal<C, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut steps = Vec::new();
        if let Some(initial) = &self.initial {
            steps.push(StepInfo::new(0, StepKind::Initial, initial.header()).to_string());
        }
        let mut described = Vec::new();
        self.chain.describe(&mut described);
        steps.extend(described.iter().map(ToString::to_string));
        f.debug_struct("Traversal").field("steps", &steps).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmachine_core::{Count, Unit};

    fn g() -> TraversalSource<Unit> {
        TraversalSource::new()
    }

    #[test]
    fn rendering() {
        let pipeline = g().inject([1i64, 2, 3]).as_("a").filter(|v| *v > 1).map(|v| v + 1).compile().unwrap();
        assert_eq!(pipeline.to_string(), "[inject(1, 2, 3)@a, filter, map]");
        assert_eq!(pipeline.len(), 3);
    }

    #[test]
    fn repeat_rendering_and_explain() {
        let body = Traversal::start().map(|v: &i64| v + 1).as_("step");
        let pipeline = g().inject([0i64]).repeat(body, Loop::times(2)).as_("end").compile().unwrap();
        assert_eq!(pipeline.to_string(), "[inject(0), repeat([map@step], times=2)@end]");
        assert_eq!(pipeline.explain(), "0: inject(0)\n1: repeat(times=2)@end\n  1: map@step\n");
    }

    #[test]
    fn missing_initial() {
        let err = Traversal::<Unit, i64, i64>::start().map(|v| v + 1).compile().unwrap_err();
        assert_eq!(err, CompileError::MissingInitial);
    }

    #[test]
    fn unbound_label() {
        let err = g().inject([1i64]).as_("a").select("b").compile().unwrap_err();
        match err {
            CompileError::UnboundLabel { step_index, label, .. } => {
                assert_eq!(step_index, 1);
                assert_eq!(label, Label::new("b"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn label_must_be_bound_upstream() {
        let err = g().inject([1i64]).select("a").as_("a").compile().unwrap_err();
        assert!(matches!(err, CompileError::UnboundLabel { step_index: 1, .. }));
    }

    #[test]
    fn body_labels_visible_after_guaranteed_loop() {
        let body = || Traversal::start().map(|v: &i64| v + 1).as_("inner");

        assert!(g().inject([0i64]).repeat(body(), Loop::times(1)).select("inner").compile().is_ok());
        assert!(g()
            .inject([0i64])
            .repeat(body(), Loop::until_value(|v: &i64| *v > 2))
            .select("inner")
            .compile()
            .is_ok());

        let err = g().inject([0i64]).repeat(body(), Loop::times(0)).select("inner").compile().unwrap_err();
        assert!(matches!(err, CompileError::UnboundLabel { step_index: 2, .. }));
    }

    #[test]
    fn body_sees_outer_labels() {
        let body = Traversal::start().where_bound("origin", |v: &i64, origin| Value::Int(*v) != *origin);
        assert!(g().inject([0i64]).as_("origin").repeat(body, Loop::times(1)).compile().is_ok());
    }

    #[test]
    fn body_errors_are_attributed_to_repeat() {
        let body = Traversal::start().map(|v: &Value| v.clone()).select("nowhere");
        let err = g().inject([0i64]).map(|v| Value::Int(*v)).repeat(body, Loop::times(1)).compile().unwrap_err();
        match err {
            CompileError::UnboundLabel { step_index, step, .. } => {
                assert_eq!(step_index, 2);
                assert_eq!(step, "repeat/select(nowhere)");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_repeat_body() {
        let err = g().inject([0i64]).repeat(Traversal::start(), Loop::times(2)).compile().unwrap_err();
        assert!(matches!(err, CompileError::Malformed { step_index: 1, .. }));
    }

    #[test]
    fn rooted_repeat_body() {
        let body = g().inject([5i64]).map(|v| v + 1);
        let err = g().inject([0i64]).repeat(body, Loop::times(2)).compile().unwrap_err();
        assert!(matches!(err, CompileError::Malformed { step_index: 1, .. }));
    }

    #[test]
    fn blank_label() {
        let err = g().inject([0i64]).as_("  ").compile().unwrap_err();
        assert!(matches!(err, CompileError::Malformed { step_index: 0, .. }));
    }

    #[test]
    fn label_without_step() {
        let err = Traversal::<Unit, i64, i64>::start().as_("x").compile().unwrap_err();
        assert!(matches!(err, CompileError::Malformed { .. }));
    }

    #[test]
    fn weighted_sets_last_step() {
        let pipeline = TraversalSource::<Count>::new()
            .inject([1i64])
            .weighted(Count::new(2))
            .map(|v| *v)
            .weighted(Count::new(3))
            .compile()
            .unwrap();
        let results: Vec<_> =
            pipeline.run(ExecutionContext::new()).collect::<Result<_, _>>().unwrap();
        assert_eq!(results[0].coefficient(), &Count::new(6));
    }

    #[test]
    fn bound_labels() {
        let pipeline = g().inject([1i64]).as_("a").map(|v| *v).as_("b").compile().unwrap();
        let labels: Vec<_> = pipeline.bound_labels().into_iter().collect();
        assert_eq!(labels, vec![Label::new("a"), Label::new("b")]);
    }

    #[test]
    fn bound_labels_follow_guaranteed_repeat_bodies() {
        let body = || Traversal::<Unit, i64, i64>::start().map(|v| v + 1).as_("inner");
        let once = g().inject([1i64]).repeat(body(), Loop::times(1)).compile().unwrap();
        assert!(once.bound_labels().contains(&Label::new("inner")));

        let maybe = g().inject([1i64]).repeat(body(), Loop::times(0)).compile().unwrap();
        assert!(maybe.bound_labels().is_empty());
    }
}
