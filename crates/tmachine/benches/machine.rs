//! Traversal machine benchmarks.
//!
//! Benchmarks covering:
//! - Linear map/filter pipelines over injected values
//! - Repeat expansion over an in-memory graph
//! - Instruction compilation and execution

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tmachine::{
    Count, GraphBuilder, Instruction, Loop, Predicate, Request, Traversal, TraversalMachine,
    TraversalSource, Unit, Value, VertexSelector,
};

// ============================================================================
// Helper: Simple RNG for reproducible graphs
// ============================================================================

struct Rng {
    state: u64,
}

impl Rng {
    const fn new(seed: u64) -> Self {
        Self { state: if seed == 0 { 0x853c_49e6_748f_ea9b } else { seed } }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

fn random_graph(vertices: usize, degree: usize) -> TraversalMachine {
    let mut rng = Rng::new(42);
    let mut builder = GraphBuilder::new();
    let ids: Vec<_> = (0..vertices).map(|_| builder.add_vertex("node")).collect();
    for &source in &ids {
        for _ in 0..degree {
            let target = ids[(rng.next_u64() % vertices as u64) as usize];
            builder.add_edge(source, target, "link").expect("valid edge");
        }
    }
    TraversalMachine::new(Arc::new(builder.build()))
}

// ============================================================================
// Linear pipelines
// ============================================================================

fn bench_linear(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear");
    let machine = TraversalMachine::without_graph();

    for size in [1_000i64, 10_000, 100_000] {
        let pipeline = TraversalSource::<Count>::new()
            .inject(0..size)
            .map(|v| v * 3)
            .filter(|v| v % 2 == 0)
            .as_("v")
            .compile()
            .expect("compile");

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("map_filter", size), &pipeline, |b, pipeline| {
            b.iter(|| black_box(machine.evaluate(pipeline, None).results.len()));
        });
        group.bench_with_input(BenchmarkId::new("first_ten", size), &pipeline, |b, pipeline| {
            b.iter(|| black_box(machine.evaluate(pipeline, Some(10)).results.len()));
        });
    }

    group.finish();
}

// ============================================================================
// Graph repeat
// ============================================================================

fn bench_repeat(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeat");
    let machine = random_graph(1_000, 3);

    for times in [1usize, 2, 3] {
        let pipeline = TraversalSource::<Unit>::new()
            .vertices(VertexSelector::All)
            .repeat(Traversal::start().out(&[]), Loop::times(times))
            .compile()
            .expect("compile");

        group.bench_with_input(BenchmarkId::new("out", times), &pipeline, |b, pipeline| {
            b.iter(|| black_box(machine.evaluate(pipeline, None).results.len()));
        });
    }

    group.finish();
}

// ============================================================================
// Instructions
// ============================================================================

fn bench_instructions(c: &mut Criterion) {
    let mut group = c.benchmark_group("instructions");
    let machine = random_graph(1_000, 3);
    let request = Request::new(vec![
        Instruction::Vertices { selector: VertexSelector::All },
        Instruction::As { label: "start".into() },
        Instruction::Repeat {
            body: vec![Instruction::Out { labels: vec!["link".to_owned()] }],
            times: Some(2),
            until: None,
        },
        Instruction::Id,
        Instruction::Is { predicate: Predicate::Mod { divisor: 7, remainder: 0 } },
        Instruction::Count { into: "hits".into() },
    ])
    .selecting(["start"]);

    group.bench_function("compile", |b| {
        b.iter(|| black_box(request.compile().expect("compile").len()));
    });
    group.bench_function("execute", |b| {
        b.iter(|| black_box(machine.execute(&request).rows.len()));
    });

    let values = Request::new(vec![Instruction::Inject {
        values: (0..10_000).map(Value::Int).collect(),
    }]);
    group.bench_function("inject_10k", |b| {
        b.iter(|| black_box(machine.execute(&values).rows.len()));
    });

    group.finish();
}

criterion_group!(benches, bench_linear, bench_repeat, bench_instructions);
criterion_main!(benches);
