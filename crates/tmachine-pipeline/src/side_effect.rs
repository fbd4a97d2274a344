//! Per-run side-effect accumulators.
//!
//! Side-effect steps write into named accumulators owned by the run. They
//! are visible to the caller through the run handle and never leak into
//! another run.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tmachine_core::{Label, StepFailure, Value};

/// The content of one named accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Accumulator {
    /// A running count.
    Count(u64),
    /// Collected values, in arrival order.
    Values(Vec<Value>),
}

/// Shared accumulators of a run.
#[derive(Debug, Clone, Default)]
pub struct SideEffects {
    inner: Arc<Mutex<BTreeMap<Label, Accumulator>>>,
}

impl SideEffects {
    /// Creates an empty set of accumulators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `by` to the count under `label`.
    ///
    /// Fails if `label` already collects values.
    pub fn increment(&self, label: &Label, by: u64) -> Result<(), StepFailure> {
        let mut entries = self.lock();
        match entries.entry(label.clone()).or_insert(Accumulator::Count(0)) {
            Accumulator::Count(n) => {
                *n = n.saturating_add(by);
                Ok(())
            }
            Accumulator::Values(_) => {
                Err(StepFailure::new(format!("side effect '{label}' collects values, not a count")))
            }
        }
    }

    /// Appends `value` to the values under `label`.
    ///
    /// Fails if `label` already holds a count.
    pub fn append(&self, label: &Label, value: Value) -> Result<(), StepFailure> {
        let mut entries = self.lock();
        match entries.entry(label.clone()).or_insert_with(|| Accumulator::Values(Vec::new())) {
            Accumulator::Values(values) => {
                values.push(value);
                Ok(())
            }
            Accumulator::Count(_) => {
                Err(StepFailure::new(format!("side effect '{label}' holds a count, not values")))
            }
        }
    }

    /// Returns a copy of the accumulator under `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<Accumulator> {
        self.lock().get(label).cloned()
    }

    /// Returns a copy of every accumulator.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Label, Accumulator> {
        self.lock().clone()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking step must not hide what was recorded before it.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<Label, Accumulator>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
