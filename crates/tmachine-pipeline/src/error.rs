//! Error types for pipeline compilation and execution.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tmachine_core::{Label, ValueKind};

/// A pipeline is structurally invalid.
///
/// Compilation is all-or-nothing: no part of a pipeline that fails to
/// compile is ever evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The pipeline does not start with an initial step.
    #[error("pipeline has no initial step")]
    MissingInitial,

    /// A step reads a label that no upstream step binds.
    #[error("step {step_index} ({step}) references unbound label '{label}'")]
    UnboundLabel {
        /// Index of the offending step.
        step_index: usize,
        /// Rendered step.
        step: String,
        /// The unbound label.
        label: Label,
    },

    /// A step carries invalid parameters.
    #[error("step {step_index} ({step}) is malformed: {reason}")]
    Malformed {
        /// Index of the offending step.
        step_index: usize,
        /// Rendered step.
        step: String,
        /// What is wrong.
        reason: String,
    },

    /// Adjacent steps disagree on the type flowing between them.
    #[error("step {step_index} ({step}) expects {expected} input, found {found}")]
    TypeMismatch {
        /// Index of the offending step.
        step_index: usize,
        /// Rendered step.
        step: String,
        /// The kind the step accepts.
        expected: ValueKind,
        /// The kind the previous step produces.
        found: ValueKind,
    },
}

impl CompileError {
    /// Creates a [`CompileError::Malformed`].
    pub fn malformed(
        step_index: usize,
        step: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Malformed { step_index, step: step.into(), reason: reason.into() }
    }
}

/// A step function failed for one traverser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {step_index} ({step}) failed on element {element_index}: {message}")]
pub struct StepError {
    /// Index of the failing step (the initial step is 0).
    pub step_index: usize,
    /// Rendered failing step.
    pub step: String,
    /// 1-based ordinal of the traverser the step was processing.
    pub element_index: u64,
    /// The offending value, rendered.
    pub value: Option<String>,
    /// The failure message.
    pub message: String,
}

/// A safety bound enforced during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Total traversers emitted by a drained run.
    EmittedTraversers,
    /// Iterations of a single repeat loop.
    LoopIterations,
    /// Traversers held in a repeat frontier.
    FrontierSize,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EmittedTraversers => "emitted traversers",
            Self::LoopIterations => "loop iterations",
            Self::FrontierSize => "frontier size",
        };
        f.write_str(name)
    }
}

/// Errors that stop an execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// A step function failed.
    #[error(transparent)]
    Step(#[from] StepError),

    /// A safety bound was exceeded.
    #[error("{resource} exceeded the limit of {limit}")]
    ResourceExhausted {
        /// The exhausted resource.
        resource: Resource,
        /// The configured limit.
        limit: usize,
    },

    /// Cancellation was observed.
    #[error("execution cancelled")]
    Cancelled,
}

/// Result type for operator operations.
pub type ExecResult<T> = Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_label_display() {
        let err = CompileError::UnboundLabel {
            step_index: 2,
            step: "select(a)".into(),
            label: Label::new("a"),
        };
        assert_eq!(err.to_string(), "step 2 (select(a)) references unbound label 'a'");
    }

    #[test]
    fn step_error_is_transparent() {
        let err = ExecError::from(StepError {
            step_index: 1,
            step: "map".into(),
            element_index: 2,
            value: Some("0".into()),
            message: "division by zero".into(),
        });
        assert_eq!(err.to_string(), "step 1 (map) failed on element 2: division by zero");
    }

    #[test]
    fn resource_display() {
        let err = ExecError::ResourceExhausted { resource: Resource::LoopIterations, limit: 10 };
        assert_eq!(err.to_string(), "loop iterations exceeded the limit of 10");
    }
}
