//! Typed composition of non-initial steps.
//!
//! A [`Chain`] is the part of a pipeline after its initial step. It knows
//! how to stack one operator per step on top of an input operator, and how
//! to describe its steps for validation and rendering. Chains nest: a
//! link holds the chain before it, so the Rust type checker rejects a step
//! whose input type differs from its predecessor's output type.

use tmachine_core::{Coefficient, Element};

use crate::function::{Function, FunctionKind, StepHeader};
use crate::operator::BoxedOperator;
use crate::operators::StepOp;
use crate::pipeline::StepInfo;

/// Steps taking traversers of `S` to traversers of `E`.
pub trait Chain<C, S, E>: Send + Sync {
    /// Stacks this chain's operators on top of `input`.
    fn attach(&self, input: BoxedOperator<C, S>) -> BoxedOperator<C, E>;

    /// Appends a description of every step, in order.
    fn describe(&self, out: &mut Vec<StepInfo>);

    /// Returns the header of the last step, if there is one.
    fn last_header_mut(&mut self) -> Option<&mut StepHeader<C>>;

    /// Returns the number of steps.
    fn len(&self) -> usize;

    /// Returns true if the chain has no steps.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The empty chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<C: Coefficient, S: Element> Chain<C, S, S> for Identity {
    fn attach(&self, input: BoxedOperator<C, S>) -> BoxedOperator<C, S> {
        input
    }

    fn describe(&self, _out: &mut Vec<StepInfo>) {}

    fn last_header_mut(&mut self) -> Option<&mut StepHeader<C>> {
        None
    }

    fn len(&self) -> usize {
        0
    }
}

/// A chain extended by one step.
pub struct Link<C, S, M, E> {
    head: Box<dyn Chain<C, S, M>>,
    function: Function<C, M, E>,
    index: usize,
}

impl<C, S, M, E> Link<C, S, M, E> {
    /// Appends `function` at position `index` after `head`.
    pub fn new(head: Box<dyn Chain<C, S, M>>, function: Function<C, M, E>, index: usize) -> Self {
        Self { head, function, index }
    }
}

impl<C: Coefficient, S: Element, M: Element, E: Element> Chain<C, S, E> for Link<C, S, M, E> {
    fn attach(&self, input: BoxedOperator<C, S>) -> BoxedOperator<C, E> {
        let input = self.head.attach(input);
        Box::new(StepOp::new(self.function.clone(), self.index, input))
    }

    fn describe(&self, out: &mut Vec<StepInfo>) {
        self.head.describe(out);
        let header = self.function.header();
        let mut info = StepInfo::new(self.index, self.function.kind().tag(), header);
        if let FunctionKind::Repeat { body, bound, .. } = self.function.kind() {
            body.describe(&mut info.body);
            info.guarantees_iteration = bound.guarantees_iteration();
        }
        out.push(info);
    }

    fn last_header_mut(&mut self) -> Option<&mut StepHeader<C>> {
        Some(self.function.header_mut())
    }

    fn len(&self) -> usize {
        self.head.len() + 1
    }
}
