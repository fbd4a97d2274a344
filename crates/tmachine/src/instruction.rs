//! Pipelines submitted as data.
//!
//! An instruction list is the serializable form of a pipeline. It is
//! compiled into a `Pipeline<Count, Value, Value>`; since values are
//! dynamically typed, the compiler tracks the [`ValueKind`] flowing between
//! instructions and rejects steps that cannot accept it.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tmachine_core::{Count, Label, StepFailure, Value, ValueKind, VertexId};
use tmachine_graph::{Direction, VertexSelector};
use tmachine_pipeline::{
    CompileError, Function, InitialFunction, Loop, Pipeline, SourceCursor, Traversal,
    TraversalSource,
};

type ValueTraversal = Traversal<Count, Value, Value>;
type ValueFunction = Function<Count, Value, Value>;

/// One step of a submitted pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// Starts from the given values.
    Inject {
        /// The values, in emission order.
        values: Vec<Value>,
    },
    /// Starts from the vertices matching `selector`.
    Vertices {
        /// Which vertices to scan.
        #[serde(default = "all_vertices")]
        selector: VertexSelector,
    },
    /// Moves to the targets of outgoing edges.
    Out {
        /// Edge labels to follow; empty follows every edge.
        #[serde(default)]
        labels: Vec<String>,
    },
    /// Moves to the sources of incoming edges.
    In {
        /// Edge labels to follow; empty follows every edge.
        #[serde(default)]
        labels: Vec<String>,
    },
    /// Moves along edges in both directions.
    Both {
        /// Edge labels to follow; empty follows every edge.
        #[serde(default)]
        labels: Vec<String>,
    },
    /// Keeps vertices whose property `key` equals `value`.
    Has {
        /// The property key.
        key: String,
        /// The expected value.
        value: Value,
    },
    /// Keeps vertices carrying `label`.
    HasLabel {
        /// The vertex label.
        label: String,
    },
    /// Moves to the value of property `key`.
    Values {
        /// The property key.
        key: String,
    },
    /// Moves to the vertex id.
    Id,
    /// Keeps values satisfying `predicate`.
    Is {
        /// The comparison.
        predicate: Predicate,
    },
    /// Replaces each value with `value`.
    Constant {
        /// The replacement.
        value: Value,
    },
    /// Replaces each value with the value bound to `label`.
    Select {
        /// The label to read.
        label: Label,
    },
    /// Binds the previous step's output under `label`.
    As {
        /// The label to bind.
        label: Label,
    },
    /// Sets the previous step's weight.
    Weight {
        /// The multiplicity.
        coefficient: u64,
    },
    /// Counts traversers into a side effect.
    Count {
        /// The side-effect label.
        into: Label,
    },
    /// Collects values into a side effect.
    Aggregate {
        /// The side-effect label.
        into: Label,
    },
    /// Loops over `body`.
    ///
    /// Exactly one of `times` and `until` must be set.
    Repeat {
        /// The loop body.
        body: Vec<Instruction>,
        /// Fixed number of iterations.
        #[serde(default)]
        times: Option<usize>,
        /// Stop once every survivor satisfies this.
        #[serde(default)]
        until: Option<Predicate>,
    },
}

fn all_vertices() -> VertexSelector {
    VertexSelector::All
}

impl Instruction {
    /// Returns the name of the step the instruction compiles to.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Inject { .. } => "inject",
            Self::Vertices { .. } => "V",
            Self::Out { .. } => "out",
            Self::In { .. } => "in",
            Self::Both { .. } => "both",
            Self::Has { .. } => "has",
            Self::HasLabel { .. } => "hasLabel",
            Self::Values { .. } => "values",
            Self::Id => "id",
            Self::Is { .. } => "is",
            Self::Constant { .. } => "constant",
            Self::Select { .. } => "select",
            Self::As { .. } => "as",
            Self::Weight { .. } => "weight",
            Self::Count { .. } => "count",
            Self::Aggregate { .. } => "aggregate",
            Self::Repeat { .. } => "repeat",
        }
    }
}

/// A comparison against a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmp", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    /// Equal to.
    Eq(Value),
    /// Not equal to.
    Neq(Value),
    /// Less than.
    Lt(Value),
    /// Less than or equal to.
    Lte(Value),
    /// Greater than.
    Gt(Value),
    /// Greater than or equal to.
    Gte(Value),
    /// Equal to any of.
    Within(Vec<Value>),
    /// An integer whose remainder by `divisor` is `remainder`.
    Mod {
        /// The divisor. Must not be zero.
        divisor: i64,
        /// The expected Euclidean remainder.
        remainder: i64,
    },
}

impl Predicate {
    /// Tests `value`.
    ///
    /// Values of unrelated kinds never satisfy an ordering.
    #[must_use]
    pub fn test(&self, value: &Value) -> bool {
        match self {
            Self::Eq(expected) => equals(value, expected),
            Self::Neq(expected) => !equals(value, expected),
            Self::Lt(bound) => value.compare(bound) == Some(Ordering::Less),
            Self::Lte(bound) => {
                matches!(value.compare(bound), Some(Ordering::Less | Ordering::Equal))
            }
            Self::Gt(bound) => value.compare(bound) == Some(Ordering::Greater),
            Self::Gte(bound) => {
                matches!(value.compare(bound), Some(Ordering::Greater | Ordering::Equal))
            }
            Self::Within(candidates) => candidates.iter().any(|c| equals(value, c)),
            Self::Mod { divisor, remainder } => match value.as_int() {
                Some(i) if *divisor != 0 => i.rem_euclid(*divisor) == *remainder,
                _ => false,
            },
        }
    }

    fn check(&self, index: usize, step: &str) -> Result<(), CompileError> {
        match self {
            Self::Mod { divisor: 0, .. } => {
                Err(CompileError::malformed(index, step, "mod divisor must not be zero"))
            }
            _ => Ok(()),
        }
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    a == b || a.compare(b) == Some(Ordering::Equal)
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(v) => write!(f, "eq({v})"),
            Self::Neq(v) => write!(f, "neq({v})"),
            Self::Lt(v) => write!(f, "lt({v})"),
            Self::Lte(v) => write!(f, "lte({v})"),
            Self::Gt(v) => write!(f, "gt({v})"),
            Self::Gte(v) => write!(f, "gte({v})"),
            Self::Within(vs) => write!(f, "within({})", Value::List(vs.clone())),
            Self::Mod { divisor, remainder } => write!(f, "mod({divisor}, {remainder})"),
        }
    }
}

/// Compiles an instruction list.
///
/// The first instruction must be `inject` or `vertices`. Errors detected
/// here carry the position of the offending instruction; label scoping is
/// then checked by [`Traversal::compile`], which reports step positions.
pub fn compile_instructions(
    instructions: &[Instruction],
) -> Result<Pipeline<Count, Value, Value>, CompileError> {
    let (first, rest) = instructions.split_first().ok_or(CompileError::MissingInitial)?;
    let source = TraversalSource::<Count>::new();
    let (mut traversal, mut kind) = match first {
        Instruction::Inject { values } => (source.inject(values.iter().cloned()), kind_of(values)),
        Instruction::Vertices { selector } => {
            (source.start_from(vertex_scan(selector.clone())), ValueKind::Vertex)
        }
        _ => return Err(CompileError::MissingInitial),
    };

    for (offset, instruction) in rest.iter().enumerate() {
        (traversal, kind) = append(traversal, kind, offset + 1, instruction)?;
    }
    traversal.compile()
}

fn kind_of(values: &[Value]) -> ValueKind {
    values.iter().map(Value::kind).reduce(ValueKind::join).unwrap_or(ValueKind::Any)
}

fn append(
    traversal: ValueTraversal,
    kind: ValueKind,
    index: usize,
    instruction: &Instruction,
) -> Result<(ValueTraversal, ValueKind), CompileError> {
    let step = instruction.name();
    let appended = match instruction {
        Instruction::Inject { .. } | Instruction::Vertices { .. } => {
            return Err(CompileError::malformed(index, step, "initial step must come first"));
        }
        Instruction::Out { labels } => {
            expect_vertex(index, step, kind)?;
            (traversal.then(expand(Direction::Outgoing, labels)), ValueKind::Vertex)
        }
        Instruction::In { labels } => {
            expect_vertex(index, step, kind)?;
            (traversal.then(expand(Direction::Incoming, labels)), ValueKind::Vertex)
        }
        Instruction::Both { labels } => {
            expect_vertex(index, step, kind)?;
            (traversal.then(expand(Direction::Both, labels)), ValueKind::Vertex)
        }
        Instruction::Has { key, value } => {
            expect_vertex(index, step, kind)?;
            (traversal.then(has(key.clone(), value.clone())), ValueKind::Vertex)
        }
        Instruction::HasLabel { label } => {
            expect_vertex(index, step, kind)?;
            (traversal.then(has_label(label.clone())), ValueKind::Vertex)
        }
        Instruction::Values { key } => {
            expect_vertex(index, step, kind)?;
            (traversal.then(values(key.clone())), ValueKind::Any)
        }
        Instruction::Id => {
            expect_vertex(index, step, kind)?;
            (traversal.then(id()), ValueKind::Int)
        }
        Instruction::Is { predicate } => {
            predicate.check(index, step)?;
            (traversal.then(is(predicate.clone())), kind)
        }
        Instruction::Constant { value } => (traversal.constant(value.clone()), value.kind()),
        Instruction::Select { label } => (traversal.select(label.clone()), ValueKind::Any),
        Instruction::As { label } => (traversal.as_(label.clone()), kind),
        Instruction::Weight { coefficient } => (traversal.weighted(Count::new(*coefficient)), kind),
        Instruction::Count { into } => (traversal.count_into(into.clone()), kind),
        Instruction::Aggregate { into } => (traversal.aggregate_into(into.clone()), kind),
        Instruction::Repeat { body, times, until } => {
            let bound = match (times, until) {
                (Some(n), None) => Loop::times(*n),
                (None, Some(predicate)) => {
                    predicate.check(index, step)?;
                    let predicate = predicate.clone();
                    Loop::until_value(move |v: &Value| predicate.test(v))
                }
                _ => {
                    return Err(CompileError::malformed(
                        index,
                        step,
                        "repeat needs exactly one of times and until",
                    ));
                }
            };
            if body.is_empty() {
                return Err(CompileError::malformed(index, step, "repeat body is empty"));
            }

            let mut inner = Traversal::<Count, Value, Value>::start();
            let mut inner_kind = kind;
            for (offset, instruction) in body.iter().enumerate() {
                (inner, inner_kind) = append(inner, inner_kind, offset + 1, instruction)
                    .map_err(|err| nested(index, err))?;
            }
            if !kind.accepts(inner_kind) {
                return Err(CompileError::TypeMismatch {
                    step_index: index,
                    step: step.to_owned(),
                    expected: kind,
                    found: inner_kind,
                });
            }
            (traversal.repeat(inner, bound), kind)
        }
    };
    Ok(appended)
}

fn expect_vertex(index: usize, step: &str, found: ValueKind) -> Result<(), CompileError> {
    if ValueKind::Vertex.accepts(found) || found == ValueKind::Any {
        Ok(())
    } else {
        Err(CompileError::TypeMismatch {
            step_index: index,
            step: step.to_owned(),
            expected: ValueKind::Vertex,
            found,
        })
    }
}

/// Reports a body error against the repeat instruction holding the body.
fn nested(index: usize, err: CompileError) -> CompileError {
    match err {
        CompileError::Malformed { step, reason, .. } => {
            CompileError::Malformed { step_index: index, step: format!("repeat/{step}"), reason }
        }
        CompileError::TypeMismatch { step, expected, found, .. } => CompileError::TypeMismatch {
            step_index: index,
            step: format!("repeat/{step}"),
            expected,
            found,
        },
        CompileError::UnboundLabel { step, label, .. } => {
            CompileError::UnboundLabel { step_index: index, step: format!("repeat/{step}"), label }
        }
        CompileError::MissingInitial => CompileError::MissingInitial,
    }
}

fn vertex_of(value: &Value) -> Result<VertexId, StepFailure> {
    value
        .as_vertex()
        .ok_or_else(|| StepFailure::new(format!("expected a vertex, found {}", value.kind())))
}

fn vertex_scan(selector: VertexSelector) -> InitialFunction<Count, Value> {
    let args = match &selector {
        VertexSelector::All => Vec::new(),
        other => vec![other.to_string()],
    };
    InitialFunction::<Count, Value>::generate("V", move |ctx| {
        let cursor = ctx.graph().vertices(&selector)?;
        Ok(Box::new(cursor.map(|r| r.map(Value::Vertex).map_err(StepFailure::from)))
            as SourceCursor<Value>)
    })
    .with_args(args)
}

fn expand(direction: Direction, labels: &[String]) -> ValueFunction {
    let labels = labels.to_vec();
    let args = labels.clone();
    ValueFunction::flat_map(direction.step_name(), move |t, ctx| {
        let neighbors = ctx.graph().neighbors(vertex_of(t.value())?, direction, &labels)?;
        Ok(neighbors.into_iter().map(|n| Value::Vertex(n.vertex)).collect())
    })
    .with_args(args)
}

fn has(key: String, value: Value) -> ValueFunction {
    let args = vec![key.clone(), value.to_string()];
    ValueFunction::filter("has", move |t, ctx| {
        Ok(ctx.graph().property(vertex_of(t.value())?, &key)?.as_ref() == Some(&value))
    })
    .with_args(args)
}

fn has_label(label: String) -> ValueFunction {
    let args = vec![label.clone()];
    ValueFunction::filter("hasLabel", move |t, ctx| {
        Ok(ctx.graph().label(vertex_of(t.value())?)? == label)
    })
    .with_args(args)
}

fn values(key: String) -> ValueFunction {
    let args = vec![key.clone()];
    ValueFunction::flat_map("values", move |t, ctx| {
        Ok(ctx.graph().property(vertex_of(t.value())?, &key)?.into_iter().collect())
    })
    .with_args(args)
}

fn id() -> ValueFunction {
    ValueFunction::map("id", |t, _| {
        let vertex = vertex_of(t.value())?;
        i64::try_from(vertex.as_u64())
            .map(Value::Int)
            .map_err(|_| StepFailure::new(format!("vertex id {vertex} is out of range")))
    })
}

fn is(predicate: Predicate) -> ValueFunction {
    let args = vec![predicate.to_string()];
    ValueFunction::filter("is", move |t, _| Ok(predicate.test(t.value()))).with_args(args)
}
