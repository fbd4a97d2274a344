//! Graph steps.
//!
//! These steps read the graph through the run's
//! [`GraphAccessor`](tmachine_graph::GraphAccessor).

use tmachine_core::{Coefficient, Element, StepFailure, Value, VertexId};
use tmachine_graph::{Direction, VertexSelector};

use super::{Traversal, TraversalSource};
use crate::function::{Function, InitialFunction, SourceCursor};

impl<C: Coefficient> TraversalSource<C> {
    /// Starts a traversal from the vertices matching `selector`.
    ///
    /// The vertex cursor is opened when the run starts and pulled lazily.
    #[must_use]
    pub fn vertices(&self, selector: VertexSelector) -> Traversal<C, VertexId, VertexId> {
        let args = selector_args(&selector);
        let initial = InitialFunction::<C, VertexId>::generate("V", move |ctx| {
            let cursor = ctx.graph().vertices(&selector)?;
            Ok(Box::new(cursor.map(|r| r.map_err(StepFailure::from))) as SourceCursor<VertexId>)
        });
        self.start_from(initial.with_args(args))
    }
}

fn selector_args(selector: &VertexSelector) -> Vec<String> {
    match selector {
        VertexSelector::All => Vec::new(),
        other => vec![other.to_string()],
    }
}

impl<C: Coefficient, S: Element> Traversal<C, S, VertexId> {
    /// Moves to the targets of outgoing edges.
    ///
    /// An empty `edge_labels` follows every edge.
    #[must_use]
    pub fn out(self, edge_labels: &[&str]) -> Self {
        self.expand(Direction::Outgoing, edge_labels)
    }

    /// Moves to the sources of incoming edges.
    #[must_use]
    pub fn in_(self, edge_labels: &[&str]) -> Self {
        self.expand(Direction::Incoming, edge_labels)
    }

    /// Moves along edges in both directions.
    #[must_use]
    pub fn both(self, edge_labels: &[&str]) -> Self {
        self.expand(Direction::Both, edge_labels)
    }

    /// Moves to adjacent vertices in `direction`.
    #[must_use]
    pub fn expand(self, direction: Direction, edge_labels: &[&str]) -> Self {
        let labels: Vec<String> = edge_labels.iter().map(|l| (*l).to_owned()).collect();
        let args = labels.clone();
        let name = direction.step_name();
        let step = Function::<C, VertexId, VertexId>::flat_map(name, move |t, ctx| {
            let neighbors = ctx.graph().neighbors(*t.value(), direction, &labels)?;
            Ok(neighbors.into_iter().map(|n| n.vertex).collect())
        });
        self.then(step.with_args(args))
    }

    /// Keeps vertices whose property `key` equals `value`.
    #[must_use]
    pub fn has(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        let args = vec![key.clone(), value.to_string()];
        let step = Function::<C, VertexId, VertexId>::filter("has", move |t, ctx| {
            Ok(ctx.graph().property(*t.value(), &key)?.as_ref() == Some(&value))
        });
        self.then(step.with_args(args))
    }

    /// Keeps vertices carrying `label`.
    #[must_use]
    pub fn has_label(self, label: impl Into<String>) -> Self {
        let label = label.into();
        let args = vec![label.clone()];
        let step = Function::<C, VertexId, VertexId>::filter("hasLabel", move |t, ctx| {
            Ok(ctx.graph().label(*t.value())? == label)
        });
        self.then(step.with_args(args))
    }

    /// Moves to the value of property `key`; vertices without it are dropped.
    #[must_use]
    pub fn values(self, key: impl Into<String>) -> Traversal<C, S, Value> {
        let key = key.into();
        let args = vec![key.clone()];
        let step = Function::<C, VertexId, Value>::flat_map("values", move |t, ctx| {
            Ok(ctx.graph().property(*t.value(), &key)?.into_iter().collect())
        });
        self.then(step.with_args(args))
    }

    /// Moves to the vertex id.
    #[must_use]
    pub fn id(self) -> Traversal<C, S, i64> {
        self.then(Function::<C, VertexId, i64>::map("id", |t, _| {
            i64::try_from(t.value().as_u64())
                .map_err(|_| StepFailure::new(format!("vertex id {} is out of range", t.value())))
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tmachine_core::{Count, Unit};
    use tmachine_graph::{GraphBuilder, InMemoryGraph};

    use super::*;
    use crate::context::ExecutionContext;
    use crate::error::ExecError;
    use crate::function::Loop;

    struct Fixture {
        graph: InMemoryGraph,
        a: VertexId,
        b: VertexId,
        c: VertexId,
    }

    fn chain() -> Fixture {
        let mut builder = GraphBuilder::new();
        let a = builder.add_vertex("person");
        let b = builder.add_vertex("person");
        let c = builder.add_vertex("place");
        builder.set_property(a, "name", "alice").unwrap();
        builder.set_property(b, "name", "bob").unwrap();
        builder.set_property(b, "age", 42i64).unwrap();
        builder.add_edge(a, b, "knows").unwrap();
        builder.add_edge(b, c, "lives").unwrap();
        Fixture { graph: builder.build(), a, b, c }
    }

    fn ctx(graph: &InMemoryGraph) -> ExecutionContext {
        ExecutionContext::new().with_graph(Arc::new(graph.clone()))
    }

    #[test]
    fn repeat_out_twice() {
        let f = chain();
        let g = TraversalSource::<Unit>::new();
        let pipeline = g
            .vertices(VertexSelector::ids([f.a]))
            .repeat(Traversal::start().out(&[]), Loop::times(2))
            .compile()
            .unwrap();

        let found: Vec<VertexId> =
            pipeline.run(ctx(&f.graph)).map(|t| t.map(|t| t.into_value())).collect::<Result<_, _>>().unwrap();
        assert_eq!(found, vec![f.c]);
    }

    #[test]
    fn edge_label_filter_and_incoming() {
        let f = chain();
        let g = TraversalSource::<Unit>::new();

        let out: Vec<VertexId> = g
            .vertices(VertexSelector::All)
            .out(&["lives"])
            .compile()
            .unwrap()
            .run(ctx(&f.graph))
            .map(|t| t.map(|t| t.into_value()))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out, vec![f.c]);

        let incoming: Vec<VertexId> = g
            .vertices(VertexSelector::ids([f.b]))
            .in_(&[])
            .compile()
            .unwrap()
            .run(ctx(&f.graph))
            .map(|t| t.map(|t| t.into_value()))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(incoming, vec![f.a]);
    }

    #[test]
    fn has_values_and_id() {
        let f = chain();
        let g = TraversalSource::<Unit>::new();

        let names: Vec<Value> = g
            .vertices(VertexSelector::label("person"))
            .has("age", 42i64)
            .values("name")
            .compile()
            .unwrap()
            .run(ctx(&f.graph))
            .map(|t| t.map(|t| t.into_value()))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(names, vec![Value::from("bob")]);

        let ids: Vec<i64> = g
            .vertices(VertexSelector::All)
            .has_label("person")
            .id()
            .compile()
            .unwrap()
            .run(ctx(&f.graph))
            .map(|t| t.map(|t| t.into_value()))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn both_multiplies_fan_out_weight() {
        let f = chain();
        let pipeline = TraversalSource::<Count>::new()
            .vertices(VertexSelector::ids([f.b]))
            .both(&[])
            .weighted(Count::new(5))
            .compile()
            .unwrap();

        let results: Vec<_> = pipeline.run(ctx(&f.graph)).collect::<Result<_, _>>().unwrap();
        let vertices: Vec<VertexId> = results.iter().map(|t| *t.value()).collect();
        assert_eq!(vertices, vec![f.c, f.a]);
        assert!(results.iter().all(|t| t.coefficient() == &Count::new(5)));
    }

    #[test]
    fn missing_graph_fails_at_source() {
        let g = TraversalSource::<Unit>::new();
        let mut run = g.vertices(VertexSelector::All).compile().unwrap().run(ExecutionContext::new());
        match run.next() {
            Some(Err(ExecError::Step(err))) => {
                assert_eq!(err.step_index, 0);
                assert_eq!(err.step, "V");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(run.next().is_none());
    }

    #[test]
    fn rendering() {
        let g = TraversalSource::<Unit>::new();
        let pipeline = g
            .vertices(VertexSelector::label("person"))
            .as_("p")
            .out(&["knows"])
            .values("name")
            .compile()
            .unwrap();
        assert_eq!(pipeline.to_string(), "[V(label=person)@p, out(knows), values(name)]");
    }
}
