use rowexpr::{
    CompilerConfig, DataType, ErrorCode, EvalResult, ExpressionCompiler, FunctionDefinition,
    FunctionRegistry, OperatorType, RowExpression, ScalarImplementation, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Compiler over the built-ins plus `counted(bigint) -> bigint` and
/// `counted_flag(boolean) -> boolean`, identity functions that share one
/// invocation counter
struct Harness {
    compiler: ExpressionCompiler,
    calls: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut registry = FunctionRegistry::with_builtins();
        let counted_types = [
            ("counted", DataType::Bigint),
            ("counted_flag", DataType::Boolean),
        ];
        for (name, data_type) in counted_types {
            let counter = Arc::clone(&calls);
            registry.register(
                FunctionDefinition::fixed(
                    name,
                    vec![data_type.clone()],
                    data_type,
                    ScalarImplementation::boxed_nullable(move |args, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(args.first().cloned().flatten())
                    }),
                )
                .nondeterministic(),
            );
        }

        Self {
            compiler: ExpressionCompiler::new(Arc::new(registry), CompilerConfig::default()),
            calls,
        }
    }

    fn eval(&self, expr: &RowExpression, row: Vec<Option<Value>>) -> EvalResult<Option<Value>> {
        self.compiler.compile(expr).unwrap().evaluate(&row)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn counted(argument: RowExpression) -> RowExpression {
    RowExpression::call("counted", vec![argument], DataType::Bigint)
}

fn counted_flag(argument: RowExpression) -> RowExpression {
    RowExpression::call("counted_flag", vec![argument], DataType::Boolean)
}

fn fail(data_type: DataType) -> RowExpression {
    RowExpression::call("fail", vec![RowExpression::varchar("boom")], data_type)
}

fn bool_field(index: usize) -> RowExpression {
    RowExpression::field(index, DataType::Boolean)
}

fn bigint_field(index: usize) -> RowExpression {
    RowExpression::field(index, DataType::Bigint)
}

fn tv(b: Option<bool>) -> Option<Value> {
    b.map(Value::Boolean)
}

fn bigint(n: i64) -> Option<Value> {
    Some(Value::Bigint(n))
}

const TRUTH: [Option<bool>; 3] = [Some(true), Some(false), None];

#[test]
fn test_and_truth_table() {
    let harness = Harness::new();
    let expr = RowExpression::and(bool_field(0), bool_field(1));

    for a in TRUTH {
        for b in TRUTH {
            let expected = match (a, b) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            };
            assert_eq!(
                harness.eval(&expr, vec![tv(a), tv(b)]).unwrap(),
                tv(expected),
                "{:?} AND {:?}",
                a,
                b
            );
        }
    }
}

#[test]
fn test_or_truth_table() {
    let harness = Harness::new();
    let expr = RowExpression::or(bool_field(0), bool_field(1));

    for a in TRUTH {
        for b in TRUTH {
            let expected = match (a, b) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            };
            assert_eq!(
                harness.eval(&expr, vec![tv(a), tv(b)]).unwrap(),
                tv(expected),
                "{:?} OR {:?}",
                a,
                b
            );
        }
    }
}

#[test]
fn test_and_or_short_circuit() {
    let harness = Harness::new();
    let and = RowExpression::and(bool_field(0), fail(DataType::Boolean));
    let or = RowExpression::or(bool_field(0), fail(DataType::Boolean));

    // The right side is never evaluated once the left decides the result
    assert_eq!(
        harness.eval(&and, vec![tv(Some(false))]).unwrap(),
        tv(Some(false))
    );
    assert_eq!(
        harness.eval(&or, vec![tv(Some(true))]).unwrap(),
        tv(Some(true))
    );

    // Otherwise it is, and its failure surfaces
    for left in [Some(true), None] {
        let err = harness.eval(&and, vec![tv(left)]).unwrap_err();
        assert_eq!(err.code, ErrorCode::FunctionError);
        assert_eq!(err.message, "boom");
    }
    for left in [Some(false), None] {
        let err = harness.eval(&or, vec![tv(left)]).unwrap_err();
        assert_eq!(err.code, ErrorCode::FunctionError);
    }
}

#[test]
fn test_and_or_right_side_call_count() {
    let harness = Harness::new();
    let right = || counted_flag(RowExpression::boolean(true));
    let or = RowExpression::or(bool_field(0), right());
    let and = RowExpression::and(bool_field(0), right());

    // true OR f() and false AND f() never call f
    assert_eq!(harness.eval(&or, vec![tv(Some(true))]).unwrap(), tv(Some(true)));
    assert_eq!(harness.eval(&and, vec![tv(Some(false))]).unwrap(), tv(Some(false)));
    assert_eq!(harness.calls(), 0);

    // false OR f() and true AND f() call it exactly once each
    assert_eq!(harness.eval(&or, vec![tv(Some(false))]).unwrap(), tv(Some(true)));
    assert_eq!(harness.calls(), 1);
    assert_eq!(harness.eval(&and, vec![tv(Some(true))]).unwrap(), tv(Some(true)));
    assert_eq!(harness.calls(), 2);
}

#[test]
fn test_return_null_on_null_skips_remaining_arguments() {
    let harness = Harness::new();
    let expr = RowExpression::arithmetic(OperatorType::Add, bigint_field(0), fail(DataType::Bigint));

    assert_eq!(harness.eval(&expr, vec![None]).unwrap(), None);
    assert_eq!(
        harness.eval(&expr, vec![bigint(1)]).unwrap_err().code,
        ErrorCode::FunctionError
    );
}

#[test]
fn test_coalesce_is_lazy() {
    let harness = Harness::new();
    let expr = RowExpression::coalesce(vec![
        bigint_field(0),
        counted(bigint_field(1)),
        fail(DataType::Bigint),
    ]);

    assert_eq!(harness.eval(&expr, vec![bigint(1), bigint(2)]).unwrap(), bigint(1));
    assert_eq!(harness.calls(), 0);

    assert_eq!(harness.eval(&expr, vec![None, bigint(2)]).unwrap(), bigint(2));
    assert_eq!(harness.calls(), 1);

    assert_eq!(
        harness.eval(&expr, vec![None, None]).unwrap_err().code,
        ErrorCode::FunctionError
    );
    assert_eq!(harness.calls(), 2);
}

#[test]
fn test_coalesce_all_null() {
    let harness = Harness::new();
    let expr = RowExpression::coalesce(vec![bigint_field(0), bigint_field(1)]);
    assert_eq!(harness.eval(&expr, vec![None, None]).unwrap(), None);
}

#[test]
fn test_in_list() {
    let harness = Harness::new();
    let candidates = |list: Vec<RowExpression>| RowExpression::in_list(bigint_field(0), list);

    let plain = candidates(vec![RowExpression::bigint(1), RowExpression::bigint(2)]);
    assert_eq!(harness.eval(&plain, vec![bigint(2)]).unwrap(), tv(Some(true)));
    assert_eq!(harness.eval(&plain, vec![bigint(3)]).unwrap(), tv(Some(false)));

    // A NULL candidate turns a miss into NULL but not a hit
    let with_null = candidates(vec![
        RowExpression::bigint(1),
        RowExpression::null(DataType::Bigint),
    ]);
    assert_eq!(harness.eval(&with_null, vec![bigint(3)]).unwrap(), None);
    assert_eq!(harness.eval(&with_null, vec![bigint(1)]).unwrap(), tv(Some(true)));

    // A match stops the scan
    let stops = candidates(vec![RowExpression::bigint(3), fail(DataType::Bigint)]);
    assert_eq!(harness.eval(&stops, vec![bigint(3)]).unwrap(), tv(Some(true)));
}

#[test]
fn test_in_list_null_target_skips_candidates() {
    let harness = Harness::new();
    let expr = RowExpression::in_list(
        bigint_field(0),
        vec![counted(RowExpression::bigint(1)), fail(DataType::Bigint)],
    );

    assert_eq!(harness.eval(&expr, vec![None]).unwrap(), None);
    assert_eq!(harness.calls(), 0);
}

#[test]
fn test_is_null_is_never_null() {
    let harness = Harness::new();
    let expr = RowExpression::is_null(bigint_field(0));

    assert_eq!(harness.eval(&expr, vec![None]).unwrap(), tv(Some(true)));
    assert_eq!(harness.eval(&expr, vec![bigint(0)]).unwrap(), tv(Some(false)));

    let nested = RowExpression::is_null(RowExpression::arithmetic(
        OperatorType::Add,
        bigint_field(0),
        RowExpression::bigint(1),
    ));
    assert_eq!(harness.eval(&nested, vec![None]).unwrap(), tv(Some(true)));
}

#[test]
fn test_simple_switch() {
    let harness = Harness::new();
    let expr = RowExpression::switch(
        bigint_field(0),
        vec![
            RowExpression::when(RowExpression::bigint(1), RowExpression::varchar("one")),
            RowExpression::when(counted(bigint_field(1)), RowExpression::varchar("counted")),
        ],
        Some(RowExpression::varchar("other")),
        DataType::Varchar,
    );

    assert_eq!(
        harness.eval(&expr, vec![bigint(1), bigint(7)]).unwrap(),
        Some(Value::varchar("one"))
    );
    assert_eq!(harness.calls(), 0);

    assert_eq!(
        harness.eval(&expr, vec![bigint(7), bigint(7)]).unwrap(),
        Some(Value::varchar("counted"))
    );
    assert_eq!(harness.calls(), 1);

    // A NULL arm value never matches
    assert_eq!(
        harness.eval(&expr, vec![bigint(7), None]).unwrap(),
        Some(Value::varchar("other"))
    );
    assert_eq!(harness.calls(), 2);
}

#[test]
fn test_switch_null_operand_goes_to_else() {
    let harness = Harness::new();
    let expr = RowExpression::switch(
        bigint_field(0),
        vec![RowExpression::when(
            counted(RowExpression::bigint(1)),
            RowExpression::varchar("one"),
        )],
        Some(RowExpression::varchar("other")),
        DataType::Varchar,
    );

    assert_eq!(
        harness.eval(&expr, vec![None]).unwrap(),
        Some(Value::varchar("other"))
    );
    assert_eq!(harness.calls(), 0);
}

#[test]
fn test_switch_without_else() {
    let harness = Harness::new();
    let expr = RowExpression::switch(
        bigint_field(0),
        vec![RowExpression::when(
            RowExpression::bigint(1),
            RowExpression::varchar("one"),
        )],
        None,
        DataType::Varchar,
    );
    assert_eq!(harness.eval(&expr, vec![bigint(2)]).unwrap(), None);
}

#[test]
fn test_searched_case_skips_unreached_branches() {
    let harness = Harness::new();
    // CASE WHEN true THEN 1 ELSE 1 / 0 END
    let expr = RowExpression::searched_case(
        vec![RowExpression::when(
            RowExpression::boolean(true),
            RowExpression::bigint(1),
        )],
        Some(RowExpression::arithmetic(
            OperatorType::Divide,
            RowExpression::bigint(1),
            RowExpression::bigint(0),
        )),
        DataType::Bigint,
    );
    assert_eq!(harness.eval(&expr, vec![]).unwrap(), bigint(1));
}

#[test]
fn test_searched_case_null_condition_is_not_taken() {
    let harness = Harness::new();
    let expr = RowExpression::searched_case(
        vec![
            RowExpression::when(bool_field(0), RowExpression::varchar("first")),
            RowExpression::when(bool_field(1), RowExpression::varchar("second")),
        ],
        Some(RowExpression::varchar("neither")),
        DataType::Varchar,
    );

    assert_eq!(
        harness.eval(&expr, vec![None, tv(Some(true))]).unwrap(),
        Some(Value::varchar("second"))
    );
    assert_eq!(
        harness.eval(&expr, vec![None, tv(Some(false))]).unwrap(),
        Some(Value::varchar("neither"))
    );
}

#[test]
fn test_if() {
    let harness = Harness::new();
    let expr = RowExpression::if_then_else(
        bool_field(0),
        counted(RowExpression::bigint(1)),
        Some(fail(DataType::Bigint)),
    );

    assert_eq!(harness.eval(&expr, vec![tv(Some(true))]).unwrap(), bigint(1));
    assert_eq!(harness.calls(), 1);
    assert_eq!(
        harness.eval(&expr, vec![None]).unwrap_err().code,
        ErrorCode::FunctionError
    );
    assert_eq!(harness.calls(), 1);

    let without_else = RowExpression::if_then_else(bool_field(0), RowExpression::bigint(1), None);
    assert_eq!(harness.eval(&without_else, vec![tv(Some(false))]).unwrap(), None);
}

#[test]
fn test_if_with_untyped_null_branch() {
    let harness = Harness::new();
    // IF(#0, NULL, 5)
    let expr = RowExpression::if_then_else(
        bool_field(0),
        RowExpression::null(DataType::Unknown),
        Some(RowExpression::bigint(5)),
    );
    assert_eq!(expr.data_type(), DataType::Bigint);

    assert_eq!(harness.eval(&expr, vec![tv(Some(true))]).unwrap(), None);
    assert_eq!(harness.eval(&expr, vec![tv(Some(false))]).unwrap(), bigint(5));
}

#[test]
fn test_null_if() {
    let harness = Harness::new();
    let expr = RowExpression::null_if(bigint_field(0), bigint_field(1));

    assert_eq!(harness.eval(&expr, vec![bigint(5), bigint(5)]).unwrap(), None);
    assert_eq!(harness.eval(&expr, vec![bigint(3), bigint(5)]).unwrap(), bigint(3));
    assert_eq!(harness.eval(&expr, vec![bigint(3), None]).unwrap(), bigint(3));
    assert_eq!(harness.eval(&expr, vec![None, bigint(5)]).unwrap(), None);
}

#[test]
fn test_row_constructor_and_dereference() {
    let harness = Harness::new();
    let row = RowExpression::row_constructor(vec![bigint_field(0), RowExpression::varchar("x")]);

    assert_eq!(
        harness.eval(&row, vec![None]).unwrap(),
        Some(Value::row(vec![None, Some(Value::varchar("x"))]))
    );
    assert_eq!(
        harness
            .eval(&RowExpression::dereference(row.clone(), 1), vec![None])
            .unwrap(),
        Some(Value::varchar("x"))
    );
    assert_eq!(
        harness
            .eval(&RowExpression::dereference(row.clone(), 0), vec![bigint(9)])
            .unwrap(),
        bigint(9)
    );
    assert_eq!(
        harness
            .eval(&RowExpression::dereference(row, 0), vec![None])
            .unwrap(),
        None
    );
}

#[test]
fn test_dereference_null_row() {
    let harness = Harness::new();
    let row_type = DataType::row(vec![DataType::Bigint, DataType::Varchar]);
    let expr = RowExpression::dereference(RowExpression::field(0, row_type), 1);
    assert_eq!(harness.eval(&expr, vec![None]).unwrap(), None);
}
