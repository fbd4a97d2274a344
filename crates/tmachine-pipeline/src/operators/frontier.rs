//! Frontier replay operator.

use tmachine_core::Traverser;

use crate::context::ExecutionContext;
use crate::error::ExecResult;
use crate::operator::{Operator, OperatorBase, OperatorState};

/// Emits a fixed list of traversers.
///
/// A repeat step feeds each iteration's frontier to its body through this
/// operator.
pub struct FrontierOp<C, S> {
    base: OperatorBase,
    traversers: std::vec::IntoIter<Traverser<C, S>>,
}

impl<C, S> FrontierOp<C, S> {
    /// Creates an operator over `traversers`.
    #[must_use]
    pub fn new(traversers: Vec<Traverser<C, S>>) -> Self {
        Self { base: OperatorBase::new(), traversers: traversers.into_iter() }
    }
}

impl<C: Send, S: Send> Operator<C, S> for FrontierOp<C, S> {
    fn open(&mut self, _ctx: &ExecutionContext) -> ExecResult<()> {
        self.base.set_open();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Traverser<C, S>>> {
        match self.traversers.next() {
            Some(t) => Ok(Some(t)),
            None => {
                self.base.set_finished();
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> ExecResult<()> {
        self.traversers = Vec::new().into_iter();
        self.base.set_closed();
        Ok(())
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &str {
        "frontier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmachine_core::Unit;

    #[test]
    fn replays_in_order() {
        let ctx = ExecutionContext::new();
        let mut op = FrontierOp::new(vec![Traverser::new(1i64, Unit), Traverser::new(2i64, Unit)]);
        op.open(&ctx).unwrap();

        assert_eq!(op.next().unwrap().map(Traverser::into_value), Some(1));
        assert_eq!(op.next().unwrap().map(Traverser::into_value), Some(2));
        assert!(op.next().unwrap().is_none());
        assert!(op.state().is_finished());

        op.close().unwrap();
        assert!(op.state().is_closed());
    }
}
