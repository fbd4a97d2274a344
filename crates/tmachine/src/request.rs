//! Requests and responses for pipelines submitted as data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tmachine_core::{Count, Label, Traverser, Value};
use tmachine_pipeline::{CancellationToken, CompileError, Pipeline};

use crate::error::{Error, ErrorKind};
use crate::instruction::{compile_instructions, Instruction};
use crate::machine::TraversalMachine;
use crate::run::{Run, RunStatus};

/// A pipeline submitted as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The pipeline.
    pub instructions: Vec<Instruction>,
    /// Stop after this many results.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Labels to return instead of the result values.
    #[serde(default)]
    pub select: Vec<Label>,
}

impl Request {
    /// Creates a request that drains `instructions`.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions, limit: None, select: Vec::new() }
    }

    /// Limits the number of results.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the bindings of `labels` instead of the result values.
    #[must_use]
    pub fn selecting(mut self, labels: impl IntoIterator<Item = impl Into<Label>>) -> Self {
        self.select = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Compiles the request.
    ///
    /// Selected labels must be bound on every result.
    pub fn compile(&self) -> Result<Pipeline<Count, Value, Value>, CompileError> {
        let pipeline = compile_instructions(&self.instructions)?;
        let bound = pipeline.bound_labels();
        if let Some(label) = self.select.iter().find(|l| !bound.contains(*l)) {
            return Err(CompileError::UnboundLabel {
                step_index: self.instructions.len(),
                step: "select".to_owned(),
                label: label.clone(),
            });
        }
        Ok(pipeline)
    }
}

/// One result of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultRow {
    /// The result value.
    Value(Value),
    /// The selected label bindings.
    Bindings(BTreeMap<Label, Value>),
}

impl ResultRow {
    /// Builds the row for `traverser`.
    ///
    /// With an empty `select` the row is the traverser's value. Otherwise it
    /// maps each selected label to its binding; unbound labels are left out.
    #[must_use]
    pub fn project(traverser: Traverser<Count, Value>, select: &[Label]) -> Self {
        if select.is_empty() {
            return Self::Value(traverser.into_value());
        }
        let bindings = select
            .iter()
            .filter_map(|label| {
                traverser.binding(label.as_str()).map(|value| (label.clone(), value.clone()))
            })
            .collect();
        Self::Bindings(bindings)
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TerminalStatus {
    /// Every result was returned.
    Ok {
        /// Results returned.
        count: u64,
    },
    /// The request failed. Rows hold the results produced before the error.
    Aborted {
        /// The error category.
        kind: ErrorKind,
        /// The rendered error.
        message: String,
        /// The failing step, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_index: Option<usize>,
        /// The ordinal of the traverser the failing step was processing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_index: Option<u64>,
    },
    /// The request was cancelled.
    Cancelled,
    /// The limit was reached before the stream ended.
    Suspended,
}

impl From<&Error> for TerminalStatus {
    fn from(err: &Error) -> Self {
        Self::Aborted {
            kind: err.kind(),
            message: err.to_string(),
            step_index: err.step_index(),
            element_index: err.element_index(),
        }
    }
}

impl From<&RunStatus> for TerminalStatus {
    fn from(status: &RunStatus) -> Self {
        match status {
            RunStatus::Suspended => Self::Suspended,
            RunStatus::Completed { count } => Self::Ok { count: *count },
            RunStatus::Aborted(err) => err.into(),
            RunStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// The answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Results in emission order.
    pub rows: Vec<ResultRow>,
    /// How the request ended.
    pub status: TerminalStatus,
}

impl Response {
    /// A response for a request that failed to compile.
    #[must_use]
    pub fn rejected(err: CompileError) -> Self {
        Self { rows: Vec::new(), status: TerminalStatus::from(&Error::Compile(err)) }
    }
}

/// A submitted request, yielding rows as they are pulled.
///
/// The request's limit caps the rows handed out; reaching it leaves the
/// status [`Suspended`](TerminalStatus::Suspended).
#[derive(Debug)]
pub struct RequestRun {
    run: Run<Count, Value>,
    select: Vec<Label>,
    /// Rows still allowed by the request limit.
    remaining: Option<usize>,
}

impl RequestRun {
    /// Pulls the next row.
    pub fn next_row(&mut self) -> Option<ResultRow> {
        let traverser = match &mut self.remaining {
            Some(0) => return None,
            Some(remaining) => {
                let t = self.run.pull(1).pop()?;
                *remaining -= 1;
                t
            }
            None => self.run.next_result()?,
        };
        Some(ResultRow::project(traverser, &self.select))
    }

    /// Pulls at most `n` further rows.
    pub fn pull(&mut self, n: usize) -> Vec<ResultRow> {
        let mut rows = Vec::new();
        while rows.len() < n {
            match self.next_row() {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        rows
    }

    /// Returns where the request stands.
    #[must_use]
    pub fn status(&self) -> TerminalStatus {
        self.run.status().into()
    }

    /// Requests cancellation and ends the run.
    pub fn cancel(&mut self) {
        self.run.cancel();
    }

    /// Returns a token that cancels this request from another thread.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.run.cancellation_token()
    }

    /// Pulls the rows not yet handed out and ends the run.
    #[must_use]
    pub fn finish(mut self) -> Response {
        let rows = std::iter::from_fn(|| self.next_row()).collect();
        let status = self.status();
        self.run.close();
        Response { rows, status }
    }
}

impl Iterator for RequestRun {
    type Item = ResultRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

impl TraversalMachine {
    /// Compiles `request` and starts a run of it.
    pub fn submit_request(&self, request: &Request) -> Result<RequestRun, CompileError> {
        self.submit_request_with_token(request, CancellationToken::new())
    }

    /// Compiles `request` and starts a run of it that `token` can cancel.
    pub fn submit_request_with_token(
        &self,
        request: &Request,
        token: CancellationToken,
    ) -> Result<RequestRun, CompileError> {
        let pipeline = request.compile()?;
        Ok(RequestRun {
            run: self.submit_with_token(&pipeline, token),
            select: request.select.clone(),
            remaining: request.limit,
        })
    }

    /// Compiles and evaluates a request.
    ///
    /// Compile errors are reported as an aborted response with no rows.
    #[must_use]
    pub fn execute(&self, request: &Request) -> Response {
        self.execute_with_token(request, CancellationToken::new())
    }

    /// Compiles and evaluates a request that `token` can cancel.
    #[must_use]
    pub fn execute_with_token(&self, request: &Request, token: CancellationToken) -> Response {
        match self.submit_request_with_token(request, token) {
            Ok(run) => run.finish(),
            Err(err) => Response::rejected(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Instruction {
        Instruction::Inject { values: values.iter().copied().map(Value::Int).collect() }
    }

    #[test]
    fn values_and_ok_status() {
        let machine = TraversalMachine::without_graph();
        let response = machine.execute(&Request::new(vec![ints(&[1, 2, 3])]));
        assert_eq!(
            response.rows,
            vec![
                ResultRow::Value(Value::Int(1)),
                ResultRow::Value(Value::Int(2)),
                ResultRow::Value(Value::Int(3)),
            ]
        );
        assert_eq!(response.status, TerminalStatus::Ok { count: 3 });
    }

    #[test]
    fn selected_bindings() {
        let machine = TraversalMachine::without_graph();
        let request = Request::new(vec![
            ints(&[5]),
            Instruction::As { label: Label::new("a") },
            Instruction::Constant { value: Value::from("x") },
            Instruction::As { label: Label::new("b") },
        ])
        .selecting(["a", "b"]);

        let response = machine.execute(&request);
        let expected: BTreeMap<Label, Value> =
            [(Label::new("a"), Value::Int(5)), (Label::new("b"), Value::from("x"))].into();
        assert_eq!(response.rows, vec![ResultRow::Bindings(expected)]);
    }

    #[test]
    fn unbound_selection_is_rejected() {
        let machine = TraversalMachine::without_graph();
        let response = machine.execute(&Request::new(vec![ints(&[1])]).selecting(["missing"]));
        assert!(response.rows.is_empty());
        assert!(matches!(
            response.status,
            TerminalStatus::Aborted { kind: ErrorKind::Compile, step_index: Some(1), .. }
        ));
    }

    #[test]
    fn limit_suspends() {
        let machine = TraversalMachine::without_graph();
        let response = machine.execute(&Request::new(vec![ints(&[1, 2, 3])]).with_limit(2));
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.status, TerminalStatus::Suspended);
    }

    #[test]
    fn cancelled_request() {
        let machine = TraversalMachine::without_graph();
        let token = CancellationToken::new();
        token.cancel();

        let response = machine.execute_with_token(&Request::new(vec![ints(&[1, 2])]), token);
        assert!(response.rows.is_empty());
        assert_eq!(
            serde_json::to_value(&response.status).unwrap(),
            serde_json::json!({"status": "cancelled"})
        );
    }

    #[test]
    fn streamed_rows_stop_on_cancel() {
        let machine = TraversalMachine::without_graph();
        let request =
            Request::new(vec![ints(&[1, 2, 3]), Instruction::As { label: Label::new("n") }])
                .selecting(["n"]);
        let mut run = machine.submit_request(&request).unwrap();

        let first = run.next_row().unwrap();
        assert_eq!(first, ResultRow::Bindings([(Label::new("n"), Value::Int(1))].into()));
        assert_eq!(run.status(), TerminalStatus::Suspended);

        run.cancellation_token().cancel();
        assert_eq!(run.next_row(), None);
        assert_eq!(run.status(), TerminalStatus::Cancelled);
        assert!(run.finish().rows.is_empty());
    }

    #[test]
    fn streamed_rows_honor_limit() {
        let machine = TraversalMachine::without_graph();
        let request = Request::new(vec![ints(&[1, 2, 3])]).with_limit(2);
        let run = machine.submit_request(&request).unwrap();
        let rows: Vec<ResultRow> = run.collect();
        assert_eq!(rows, vec![ResultRow::Value(Value::Int(1)), ResultRow::Value(Value::Int(2))]);
    }

    #[test]
    fn submit_rejects_bad_request() {
        let machine = TraversalMachine::without_graph();
        let request = Request::new(vec![ints(&[1])]).selecting(["x"]);
        let err = machine.submit_request(&request).unwrap_err();
        assert!(matches!(err, CompileError::UnboundLabel { .. }));
    }

    #[test]
    fn status_json_shape() {
        let status = TerminalStatus::Ok { count: 2 };
        assert_eq!(serde_json::to_string(&status).unwrap(), r#"{"status":"ok","count":2}"#);

        let cancelled = serde_json::to_string(&TerminalStatus::Cancelled).unwrap();
        assert_eq!(cancelled, r#"{"status":"cancelled"}"#);

        let row = serde_json::to_value(ResultRow::Value(Value::Int(1))).unwrap();
        assert_eq!(row, serde_json::json!({"value": {"type": "int", "value": 1}}));
    }

    #[test]
    fn request_defaults() {
        let request: Request =
            serde_json::from_str(r#"{"instructions": [{"op": "inject", "values": []}]}"#).unwrap();
        assert_eq!(request.limit, None);
        assert!(request.select.is_empty());
    }
}
