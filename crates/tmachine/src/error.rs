//! Error types for the traversal machine.
//!
//! This module provides the [`enum@Error`] type reported by aborted runs and
//! rejected requests.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tmachine_pipeline::{CompileError, ExecError, Resource, StepError};

/// Errors that end a submission before its stream is exhausted.
///
/// Cancellation is not an error; it is reported as a run status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The submitted pipeline is structurally invalid.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

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
}

impl Error {
    /// Converts an execution error, returning `None` for cancellation.
    #[must_use]
    pub fn from_exec(err: ExecError) -> Option<Self> {
        match err {
            ExecError::Step(err) => Some(Self::Step(err)),
            ExecError::ResourceExhausted { resource, limit } => {
                Some(Self::ResourceExhausted { resource, limit })
            }
            ExecError::Cancelled => None,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Compile(_) => ErrorKind::Compile,
            Self::Step(_) => ErrorKind::Step,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
        }
    }

    /// Returns the index of the offending step, if one is known.
    #[must_use]
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::Compile(CompileError::MissingInitial) => Some(0),
            Self::Compile(
                CompileError::UnboundLabel { step_index, .. }
                | CompileError::Malformed { step_index, .. }
                | CompileError::TypeMismatch { step_index, .. },
            ) => Some(*step_index),
            Self::Step(err) => Some(err.step_index),
            Self::ResourceExhausted { .. } => None,
        }
    }

    /// Returns the ordinal of the traverser a failing step was processing.
    #[must_use]
    pub fn element_index(&self) -> Option<u64> {
        match self {
            Self::Step(err) => Some(err.element_index),
            _ => None,
        }
    }
}

/// The category of an [`enum@Error`], as reported in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::Compile`].
    Compile,
    /// See [`Error::Step`].
    Step,
    /// See [`Error::ResourceExhausted`].
    ResourceExhausted,
}

/// Result type for machine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn step_error() -> StepError {
        StepError {
            step_index: 1,
            step: "map".to_owned(),
            element_index: 2,
            value: Some("0".to_owned()),
            message: "division by zero".to_owned(),
        }
    }

    #[test]
    fn exec_errors_convert_except_cancellation() {
        assert_eq!(Error::from_exec(ExecError::Cancelled), None);
        assert_eq!(
            Error::from_exec(ExecError::Step(step_error())),
            Some(Error::Step(step_error()))
        );
        let exhausted = ExecError::ResourceExhausted { resource: Resource::LoopIterations, limit: 3 };
        assert_eq!(
            Error::from_exec(exhausted),
            Some(Error::ResourceExhausted { resource: Resource::LoopIterations, limit: 3 })
        );
    }

    #[test]
    fn context_accessors() {
        let err = Error::Step(step_error());
        assert_eq!(err.kind(), ErrorKind::Step);
        assert_eq!(err.step_index(), Some(1));
        assert_eq!(err.element_index(), Some(2));
        assert_eq!(err.to_string(), "step 1 (map) failed on element 2: division by zero");

        let err = Error::from(CompileError::MissingInitial);
        assert_eq!(err.kind(), ErrorKind::Compile);
        assert_eq!(err.step_index(), Some(0));
        assert_eq!(err.element_index(), None);

        let err = Error::ResourceExhausted { resource: Resource::EmittedTraversers, limit: 10 };
        assert_eq!(err.step_index(), None);
        assert_eq!(err.to_string(), "emitted traversers exceeded the limit of 10");
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ResourceExhausted).unwrap();
        assert_eq!(json, "\"resource_exhausted\"");
    }
}
