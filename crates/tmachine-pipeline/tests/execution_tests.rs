//! Integration tests for pipeline execution.
//!
//! These tests verify pull-driven laziness, cursor release, run isolation,
//! and label binding across branches.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tmachine_core::{Count, StepFailure, Unit, Value};
use tmachine_pipeline::{
    Accumulator, ExecError, ExecutionContext, Loop, SourceCursor, Traversal, TraversalSource,
};

/// A cursor over `0..n` that counts pulls and flags its release.
struct Probe {
    next: i64,
    end: i64,
    pulls: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl Iterator for Probe {
    type Item = Result<i64, StepFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.next += 1;
        Some(Ok(self.next - 1))
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

struct ProbeHandles {
    pulls: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

fn probed(end: i64) -> (Traversal<Unit, i64, i64>, ProbeHandles) {
    let pulls = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicBool::new(false));
    let handles = ProbeHandles { pulls: Arc::clone(&pulls), released: Arc::clone(&released) };
    let traversal = TraversalSource::<Unit>::new().generate("probe", move |_| {
        Ok(Box::new(Probe {
            next: 0,
            end,
            pulls: Arc::clone(&pulls),
            released: Arc::clone(&released),
        }) as SourceCursor<i64>)
    });
    (traversal, handles)
}

// ============================================================================
// Laziness
// ============================================================================

#[test]
fn nothing_is_pulled_before_demand() {
    let (traversal, probe) = probed(1_000);
    let pipeline = traversal.map(|v| v * 2).compile().unwrap();

    let mut run = pipeline.run(ExecutionContext::new());
    assert_eq!(probe.pulls.load(Ordering::SeqCst), 0);

    let first: Vec<i64> = run.by_ref().take(3).map(|t| t.unwrap().into_value()).collect();
    assert_eq!(first, vec![0, 2, 4]);
    assert_eq!(probe.pulls.load(Ordering::SeqCst), 3);
}

#[test]
fn filter_pulls_only_until_a_match() {
    let (traversal, probe) = probed(1_000);
    let pipeline = traversal.filter(|v| *v == 10).compile().unwrap();

    let mut run = pipeline.run(ExecutionContext::new());
    assert_eq!(run.next().unwrap().unwrap().into_value(), 10);
    assert_eq!(probe.pulls.load(Ordering::SeqCst), 11);
}

#[test]
fn infinite_source_with_bounded_consumer() {
    let counter = TraversalSource::<Unit>::new().generate("naturals", |_| {
        Ok(Box::new((0i64..).map(Ok::<i64, StepFailure>)) as SourceCursor<i64>)
    });
    let pipeline = counter.filter(|v| v % 3 == 0).compile().unwrap();

    let values: Vec<i64> =
        pipeline.run(ExecutionContext::new()).take(4).map(|t| t.unwrap().into_value()).collect();
    assert_eq!(values, vec![0, 3, 6, 9]);
}

// ============================================================================
// Resource release
// ============================================================================

#[test]
fn exhaustion_releases_cursor() {
    let (traversal, probe) = probed(3);
    let pipeline = traversal.compile().unwrap();

    let count = pipeline.run(ExecutionContext::new()).count();
    assert_eq!(count, 3);
    assert!(probe.released.load(Ordering::SeqCst));
}

#[test]
fn close_releases_cursor() {
    let (traversal, probe) = probed(100);
    let pipeline = traversal.compile().unwrap();

    let mut run = pipeline.run(ExecutionContext::new());
    run.next();
    assert!(!probe.released.load(Ordering::SeqCst));

    run.close();
    assert!(probe.released.load(Ordering::SeqCst));
    assert!(run.next().is_none());
}

#[test]
fn cancellation_releases_cursor_and_fuses() {
    let (traversal, probe) = probed(100);
    let pipeline = traversal.map(|v| v + 1).compile().unwrap();
    let ctx = ExecutionContext::new();
    let token = ctx.cancellation_token();

    let mut run = pipeline.run(ctx);
    assert!(run.next().unwrap().is_ok());

    token.cancel();
    assert_eq!(run.next().unwrap().err(), Some(ExecError::Cancelled));
    assert!(probe.released.load(Ordering::SeqCst));
    assert!(run.next().is_none());
    assert!(run.is_done());
}

// ============================================================================
// Run isolation
// ============================================================================

#[test]
fn runs_have_separate_side_effects() {
    let pipeline = TraversalSource::<Unit>::new()
        .inject([1i64, 2, 3])
        .count_into("n")
        .aggregate_into("seen")
        .compile()
        .unwrap();

    let first = ExecutionContext::new();
    let second = ExecutionContext::new();
    assert_eq!(pipeline.run(first.clone()).count(), 3);
    assert_eq!(pipeline.run(second.clone()).take(1).count(), 1);

    assert_eq!(first.side_effects().get("n"), Some(Accumulator::Count(3)));
    assert_eq!(second.side_effects().get("n"), Some(Accumulator::Count(1)));
    assert_eq!(
        first.side_effects().get("seen"),
        Some(Accumulator::Values(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
    );
}

#[test]
fn clones_share_descriptors() {
    let pipeline = TraversalSource::<Unit>::new().inject([1i64, 2]).map(|v| v * 3).compile().unwrap();
    let clone = pipeline.clone();

    let a: Vec<i64> = pipeline.run(ExecutionContext::new()).map(|t| t.unwrap().into_value()).collect();
    let b: Vec<i64> = clone.run(ExecutionContext::new()).map(|t| t.unwrap().into_value()).collect();
    assert_eq!(a, b);
    assert_eq!(pipeline.to_string(), clone.to_string());
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn sibling_branches_do_not_share_bindings() {
    let pipeline = TraversalSource::<Unit>::new()
        .inject([10i64])
        .as_("root")
        .flat_map(|v| vec![*v + 1, *v + 2])
        .as_("leaf")
        .compile()
        .unwrap();

    let results: Vec<_> = pipeline.run(ExecutionContext::new()).collect::<Result<_, _>>().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].binding("leaf"), Some(&Value::Int(11)));
    assert_eq!(results[1].binding("leaf"), Some(&Value::Int(12)));
    assert!(results.iter().all(|t| t.binding("root") == Some(&Value::Int(10))));
}

#[test]
fn relabeling_overwrites() {
    let pipeline = TraversalSource::<Unit>::new()
        .inject([1i64])
        .as_("x")
        .map(|v| v + 1)
        .as_("x")
        .select("x")
        .compile()
        .unwrap();

    let values: Vec<Value> = pipeline.run(ExecutionContext::new()).map(|t| t.unwrap().into_value()).collect();
    assert_eq!(values, vec![Value::Int(2)]);
}

#[test]
fn where_bound_compares_against_label() {
    let pipeline = TraversalSource::<Unit>::new()
        .inject([3i64, 5])
        .as_("start")
        .flat_map(|v| vec![*v - 1, *v, *v + 1])
        .where_bound("start", |v, start| Value::Int(*v) != *start)
        .compile()
        .unwrap();

    let values: Vec<i64> = pipeline.run(ExecutionContext::new()).map(|t| t.unwrap().into_value()).collect();
    assert_eq!(values, vec![2, 4, 4, 6]);
}

// ============================================================================
// Repeat
// ============================================================================

#[test]
fn repeat_emits_final_frontier_in_order() {
    let body = Traversal::start().flat_map(|v: &i64| vec![v * 10, v * 10 + 1]);
    let pipeline = TraversalSource::<Count>::new()
        .inject([1i64, 2])
        .repeat(body, Loop::times(2))
        .compile()
        .unwrap();

    let values: Vec<i64> = pipeline.run(ExecutionContext::new()).map(|t| t.unwrap().into_value()).collect();
    assert_eq!(values, vec![100, 101, 110, 111, 200, 201, 210, 211]);
}

#[test]
fn repeat_stops_on_empty_frontier() {
    let body = Traversal::start().filter(|v: &i64| *v < 0);
    let pipeline = TraversalSource::<Unit>::new()
        .inject([1i64])
        .repeat(body, Loop::until_value(|_: &i64| false))
        .compile()
        .unwrap();

    let ctx = ExecutionContext::new();
    assert_eq!(pipeline.run(ctx.clone()).count(), 0);
    assert_eq!(ctx.stats().iterations(), 1);
}

#[test]
fn nested_repeat() {
    let inner = Traversal::start().map(|v: &i64| v + 1);
    let outer = Traversal::start().repeat(inner, Loop::times(2)).map(|v: &i64| v * 10);
    let pipeline = TraversalSource::<Unit>::new()
        .inject([0i64])
        .repeat(outer, Loop::times(2))
        .compile()
        .unwrap();

    let values: Vec<i64> = pipeline.run(ExecutionContext::new()).map(|t| t.unwrap().into_value()).collect();
    // ((0 + 2) * 10 + 2) * 10
    assert_eq!(values, vec![220]);
}
