//! Traversal Machine Core
//!
//! This crate provides the fundamental types that flow through a traversal
//! pipeline.
//!
//! # Overview
//!
//! - **Coefficients**: the [`Coefficient`] algebra ([`Unit`], [`Count`],
//!   [`Weight`]) carried alongside every traverser
//! - **Identifiers**: [`VertexId`] and [`EdgeId`] for referencing graph elements
//! - **Values**: the dynamic [`Value`] enum used for label bindings and
//!   transport, plus the [`Element`] trait converting typed payloads into it
//! - **Traversers**: [`Traverser`] and its copy-on-write [`Bindings`]
//!
//! # Example
//!
//! ```
//! use tmachine_core::{Coefficient, Count, Label, Traverser, Value};
//!
//! let start = Traverser::new(7i64, Count::identity());
//! let labeled = start.bind(Label::new("x"), Value::Int(7));
//!
//! // Branching gives each child its own weight and its own bindings.
//! let child = labeled.split(8i64, &Count::new(3));
//! assert_eq!(child.coefficient(), &Count::new(3));
//! assert_eq!(child.binding("x"), Some(&Value::Int(7)));
//! ```
//!
//! # Modules
//!
//! - [`coefficient`] - Coefficient algebra
//! - [`types`] - Identifiers, labels and values
//! - [`traverser`] - Traversers and bindings
//! - [`error`] - Error types ([`CoreError`], [`StepFailure`])

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod coefficient;
pub mod error;
pub mod traverser;
pub mod types;

// Re-export commonly used types
pub use coefficient::{Coefficient, Count, Unit, Weight};
pub use error::{CoreError, StepFailure};
pub use traverser::{Bindings, Traverser};
pub use types::{EdgeId, Element, Label, Value, ValueKind, VertexId};
