//! Core data types.

mod id;
mod label;
mod value;

pub use id::{EdgeId, VertexId};
pub use label::Label;
pub use value::{Element, Value, ValueKind};
