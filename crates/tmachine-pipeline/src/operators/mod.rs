//! Operator implementations.
//!
//! - [`InitialOp`] pulls from an initial step's source
//! - [`StepOp`] applies one non-initial step
//! - [`FrontierOp`] replays a repeat frontier into a loop body

mod frontier;
mod initial;
mod step;

pub use frontier::FrontierOp;
pub use initial::InitialOp;
pub use step::StepOp;

use tmachine_core::{Coefficient, Element, Label, Traverser};

/// Binds the traverser's current value under every label.
pub(crate) fn bind_labels<C: Coefficient, S: Element>(
    labels: &[Label],
    traverser: Traverser<C, S>,
) -> Traverser<C, S> {
    if labels.is_empty() {
        return traverser;
    }
    let value = traverser.value().to_value();
    labels.iter().fold(traverser, |t, label| t.bind(label.clone(), value.clone()))
}
