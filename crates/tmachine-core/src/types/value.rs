//! Dynamic values bound to labels and carried across the transport boundary.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::VertexId;
use crate::error::CoreError;

/// A dynamically typed value.
///
/// Typed pipelines carry their own payload types; a payload is converted to
/// a `Value` only when a step binds it to a label or when results cross the
/// instruction boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Null/missing value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Reference to a graph vertex
    Vertex(VertexId),
    /// List of values
    List(Vec<Value>),
}

impl Value {
    /// Returns `true` if the value is null.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as a boolean if it is one.
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer if it is one.
    #[inline]
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is one.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the vertex id if the value references a vertex.
    #[inline]
    #[must_use]
    pub const fn as_vertex(&self) -> Option<VertexId> {
        match self {
            Self::Vertex(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Vertex(_) => ValueKind::Vertex,
            Self::List(_) => ValueKind::List,
        }
    }

    /// Compares two values.
    ///
    /// Integers and floats compare numerically with each other. Values of
    /// unrelated kinds are unordered.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_float()?.partial_cmp(&other.as_float()?)
            }
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Vertex(a), Self::Vertex(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Vertex(id) => write!(f, "{id}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<VertexId> for Value {
    fn from(id: VertexId) -> Self {
        Self::Vertex(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<Value> for i64 {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_int().ok_or_else(|| CoreError::TypeMismatch {
            expected: ValueKind::Int.to_string(),
            actual: value.kind().to_string(),
        })
    }
}

impl TryFrom<Value> for VertexId {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_vertex().ok_or_else(|| CoreError::TypeMismatch {
            expected: ValueKind::Vertex.to_string(),
            actual: value.kind().to_string(),
        })
    }
}

/// The kind of a [`Value`], used to type-check instruction pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Null
    Null,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Float,
    /// String
    String,
    /// Vertex reference
    Vertex,
    /// List
    List,
    /// Statically unknown kind
    Any,
}

impl ValueKind {
    /// Returns true if a value of kind `found` may flow where `self` is required.
    #[must_use]
    pub fn accepts(self, found: Self) -> bool {
        self == Self::Any || self == found
    }

    /// Returns the narrowest kind covering both `self` and `other`.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Self::Any
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Vertex => "vertex",
            Self::List => "list",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// A payload type that can flow through a pipeline.
///
/// Elements are owned, cloneable and shareable across threads. `to_value`
/// is used when a step binds the element to a label and when a failing
/// element is reported in an error.
pub trait Element: Clone + fmt::Debug + Send + Sync + 'static {
    /// Converts the element into a dynamic value.
    fn to_value(&self) -> Value;
}

impl Element for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl Element for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Element for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl Element for i32 {
    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }
}

impl Element for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl Element for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Element for &'static str {
    fn to_value(&self) -> Value {
        Value::String((*self).to_owned())
    }
}

impl Element for VertexId {
    fn to_value(&self) -> Value {
        Value::Vertex(*self)
    }
}

impl<T: Element> Element for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Element::to_value).collect())
    }
}

impl<T: Element> Element for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Element::to_value)
    }
}
