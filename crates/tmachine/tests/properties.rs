//! Property-based tests for machine invariants.

use proptest::prelude::*;

use tmachine::{
    Count, ExecutionConfig, Instruction, Predicate, Request, ResultRow, RunStatus, TerminalStatus,
    TraversalMachine, TraversalSource, Value,
};

fn pipeline(values: Vec<i64>) -> tmachine::Pipeline<Count, i64, i64> {
    TraversalSource::<Count>::new()
        .inject(values)
        .flat_map(|v| vec![*v, v * 2])
        .filter(|v| v % 3 != 0)
        .compile()
        .expect("compile failed")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Pulling in chunks yields the same sequence as a single drain
    #[test]
    fn prop_chunked_pulls_match_drain(
        values in prop::collection::vec(-100i64..100, 0..40),
        chunk in 1usize..7,
    ) {
        let machine = TraversalMachine::without_graph();
        let pipeline = pipeline(values);

        let drained = machine.evaluate(&pipeline, None).into_values();

        let mut run = machine.submit(&pipeline);
        let mut chunked = Vec::new();
        loop {
            let batch = run.pull(chunk);
            prop_assert!(batch.len() <= chunk);
            if batch.is_empty() {
                break;
            }
            chunked.extend(batch.into_iter().map(|t| t.into_value()));
        }

        prop_assert_eq!(&chunked, &drained);
        prop_assert_eq!(run.status(), &RunStatus::Completed { count: drained.len() as u64 });
    }

    /// A limit returns a prefix of the full result sequence
    #[test]
    fn prop_limit_is_prefix(values in prop::collection::vec(-100i64..100, 0..40), limit in 0usize..50) {
        let machine = TraversalMachine::without_graph();
        let pipeline = pipeline(values);

        let all = machine.evaluate(&pipeline, None).into_values();
        let limited = machine.evaluate(&pipeline, Some(limit)).into_values();

        prop_assert_eq!(limited.len(), limit.min(all.len()));
        prop_assert_eq!(&limited[..], &all[..limited.len()]);
    }

    /// A drain emits at most the configured maximum of traversers
    #[test]
    fn prop_drain_respects_max_traversers(len in 0usize..60, max in 1usize..30) {
        let machine = TraversalMachine::without_graph()
            .with_config(ExecutionConfig::default().with_max_traversers(max));
        let pipeline = TraversalSource::<Count>::new()
            .inject(0..len as i64)
            .compile()
            .expect("compile failed");

        let evaluation = machine.evaluate(&pipeline, None);
        prop_assert_eq!(evaluation.results.len(), len.min(max));
        prop_assert_eq!(evaluation.is_complete(), len <= max);
    }

    /// An `is` instruction selects exactly the values its predicate accepts
    #[test]
    fn prop_is_instruction_selects(values in prop::collection::vec(-20i64..20, 0..30), bound in -20i64..20) {
        let machine = TraversalMachine::without_graph();
        let request = Request::new(vec![
            Instruction::Inject { values: values.iter().copied().map(Value::Int).collect() },
            Instruction::Is { predicate: Predicate::Gte(Value::Int(bound)) },
        ]);

        let response = machine.execute(&request);
        let expected: Vec<ResultRow> =
            values.iter().filter(|v| **v >= bound).map(|v| ResultRow::Value(Value::Int(*v))).collect();
        prop_assert_eq!(response.status, TerminalStatus::Ok { count: expected.len() as u64 });
        prop_assert_eq!(response.rows, expected);
    }
}
