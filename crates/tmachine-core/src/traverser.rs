//! Traversers and their label bindings.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::coefficient::Coefficient;
use crate::types::{Label, Value};

/// Label bindings of a traverser path.
///
/// Bindings are copy-on-write: cloning is a reference count bump, and the
/// first write on a shared map copies it. Two traversers branched from the
/// same ancestor therefore never observe each other's bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: Arc<BTreeMap<Label, Value>>,
}

impl Bindings {
    /// Creates empty bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value bound to `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.entries.get(label)
    }

    /// Returns true if `label` is bound.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Binds `value` under `label`, replacing any previous binding.
    pub fn insert(&mut self, label: Label, value: Value) {
        Arc::make_mut(&mut self.entries).insert(label, value);
    }

    /// Returns the number of bound labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates bindings in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&Label, &Value)> {
        self.entries.iter()
    }

    /// Returns true if both bindings share the same underlying map.
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Copies the bindings into an owned map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<Label, Value> {
        (*self.entries).clone()
    }
}

/// The unit of flow through a pipeline.
///
/// A traverser carries the current value, the coefficient accumulated along
/// its path, and the labels bound by the steps it passed. Steps consume
/// traversers by value and hand new ones downstream; a traverser is never
/// modified after it has been emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Traverser<C, S> {
    value: S,
    coefficient: C,
    bindings: Bindings,
}

impl<C: Coefficient, S> Traverser<C, S> {
    /// Creates a traverser with empty bindings.
    #[must_use]
    pub fn new(value: S, coefficient: C) -> Self {
        Self { value, coefficient, bindings: Bindings::new() }
    }

    /// Creates a traverser with the given bindings.
    #[must_use]
    pub fn with_bindings(value: S, coefficient: C, bindings: Bindings) -> Self {
        Self { value, coefficient, bindings }
    }

    /// Returns the current value.
    #[inline]
    pub fn value(&self) -> &S {
        &self.value
    }

    /// Returns the accumulated coefficient.
    #[inline]
    pub fn coefficient(&self) -> &C {
        &self.coefficient
    }

    /// Returns the label bindings.
    #[inline]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Returns the value bound to `label`.
    #[inline]
    pub fn binding(&self, label: &str) -> Option<&Value> {
        self.bindings.get(label)
    }

    /// Consumes the traverser and returns its value.
    pub fn into_value(self) -> S {
        self.value
    }

    /// Consumes the traverser and returns its parts.
    pub fn into_parts(self) -> (S, C, Bindings) {
        (self.value, self.coefficient, self.bindings)
    }

    /// Creates a child traverser holding `value`.
    ///
    /// The child's coefficient is this traverser's coefficient multiplied by
    /// `weight`; the child starts with a copy of this traverser's bindings.
    #[must_use]
    pub fn split<E>(&self, value: E, weight: &C) -> Traverser<C, E> {
        Traverser {
            value,
            coefficient: self.coefficient.multiply(weight),
            bindings: self.bindings.clone(),
        }
    }

    /// Returns this traverser with its coefficient multiplied by `weight`.
    #[must_use]
    pub fn weighted(mut self, weight: &C) -> Self {
        self.coefficient = self.coefficient.multiply(weight);
        self
    }

    /// Returns this traverser with `value` bound under `label`.
    #[must_use]
    pub fn bind(mut self, label: Label, value: Value) -> Self {
        self.bindings.insert(label, value);
        self
    }
}
