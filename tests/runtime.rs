use bytes::Bytes;
use rowexpr::{
    encode_row, Block, CompileError, CompilerConfig, DataType, EncodedRow, ErrorCode,
    ExpressionCompiler, FunctionRegistry, LambdaParameter, OperatorType, Page, RowExpression,
    Value,
};
use std::sync::Arc;
use std::thread;

fn compiler() -> ExpressionCompiler {
    ExpressionCompiler::new(
        Arc::new(FunctionRegistry::with_builtins()),
        CompilerConfig::default(),
    )
}

fn bigint(n: i64) -> Option<Value> {
    Some(Value::Bigint(n))
}

fn bigint_array(values: &[Option<i64>]) -> Option<Value> {
    Some(Value::array(
        values.iter().map(|v| v.map(Value::Bigint)).collect(),
    ))
}

#[test]
fn test_compiled_expression_shared_across_threads() {
    // CASE WHEN #0 % 2 = 0 THEN 'even' ELSE 'odd' END
    let expr = RowExpression::searched_case(
        vec![RowExpression::when(
            RowExpression::compare(
                OperatorType::Equal,
                RowExpression::arithmetic(
                    OperatorType::Modulus,
                    RowExpression::field(0, DataType::Bigint),
                    RowExpression::bigint(2),
                ),
                RowExpression::bigint(0),
            ),
            RowExpression::varchar("even"),
        )],
        Some(RowExpression::varchar("odd")),
        DataType::Varchar,
    );
    let compiled = compiler().compile(&expr).unwrap();

    thread::scope(|scope| {
        for worker in 0..4i64 {
            let compiled = &compiled;
            scope.spawn(move || {
                for n in 0..1000 {
                    let row = vec![bigint(worker * 1000 + n)];
                    let expected = if n % 2 == 0 { "even" } else { "odd" };
                    assert_eq!(
                        compiled.evaluate(&row).unwrap(),
                        Some(Value::varchar(expected))
                    );
                }
            });
        }
    });
}

#[test]
fn test_page_processor_shared_across_threads() {
    let field = RowExpression::field(0, DataType::Bigint);
    let processor = compiler()
        .compile_page_processor(
            Some(&RowExpression::compare(
                OperatorType::LessThan,
                field.clone(),
                RowExpression::bigint(50),
            )),
            &[RowExpression::arithmetic(
                OperatorType::Multiply,
                field,
                RowExpression::bigint(2),
            )],
        )
        .unwrap();

    let pages: Vec<Page> = (0..4)
        .map(|_| {
            let values = (0..100).map(bigint).collect();
            Page::new(vec![Block::new(DataType::Bigint, values).unwrap()]).unwrap()
        })
        .collect();

    thread::scope(|scope| {
        for page in &pages {
            let processor = &processor;
            scope.spawn(move || {
                let output = processor.process(page).unwrap();
                let values: Vec<Option<Value>> = output
                    .iter()
                    .flat_map(|p| p.block(0).unwrap().values().to_vec())
                    .collect();
                let expected: Vec<Option<Value>> = (0..50).map(|n| bigint(n * 2)).collect();
                assert_eq!(values, expected);
            });
        }
    });
}

#[test]
fn test_encoded_row_as_input() {
    let schema: Arc<[DataType]> = Arc::from(vec![
        DataType::Bigint,
        DataType::Varchar,
        DataType::array(DataType::Bigint),
    ]);
    let data = encode_row(
        &[bigint(7), None, bigint_array(&[Some(1), None, Some(3)])],
        &schema,
    )
    .unwrap();
    let row = EncodedRow::new(data, Arc::clone(&schema)).unwrap();

    let expr = RowExpression::coalesce(vec![
        RowExpression::field(1, DataType::Varchar),
        RowExpression::cast(RowExpression::field(0, DataType::Bigint), DataType::Varchar),
    ]);
    assert_eq!(
        compiler().compile(&expr).unwrap().evaluate(&row).unwrap(),
        Some(Value::varchar("7"))
    );

    let size = RowExpression::call(
        "cardinality",
        vec![RowExpression::field(2, DataType::array(DataType::Bigint))],
        DataType::Bigint,
    );
    assert_eq!(
        compiler().compile(&size).unwrap().evaluate(&row).unwrap(),
        bigint(3)
    );
}

#[test]
fn test_malformed_field_fails_only_when_read() {
    let schema: Arc<[DataType]> = Arc::from(vec![DataType::Bigint, DataType::Boolean]);
    let mut raw = encode_row(&[bigint(1), Some(Value::Boolean(true))], &schema)
        .unwrap()
        .to_vec();
    // NULL bitmap (1 byte), bigint (8 bytes), then the boolean byte
    raw[9] = 2;
    let row = EncodedRow::new(Bytes::from(raw), schema).unwrap();

    let skips_bad_field = RowExpression::coalesce(vec![
        RowExpression::field(0, DataType::Bigint),
        RowExpression::if_then_else(
            RowExpression::field(1, DataType::Boolean),
            RowExpression::bigint(0),
            None,
        ),
    ]);
    assert_eq!(
        compiler()
            .compile(&skips_bad_field)
            .unwrap()
            .evaluate(&row)
            .unwrap(),
        bigint(1)
    );

    let reads_bad_field = RowExpression::field(1, DataType::Boolean);
    let err = compiler()
        .compile(&reads_bad_field)
        .unwrap()
        .evaluate(&row)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFormat);
    assert!(err.message.starts_with("field 1"), "{}", err.message);
}

#[test]
fn test_expression_serialization() {
    let expr = RowExpression::and(
        RowExpression::is_null(RowExpression::field(0, DataType::Varchar)),
        RowExpression::in_list(
            RowExpression::field(1, DataType::Bigint),
            vec![RowExpression::bigint(1), RowExpression::null(DataType::Bigint)],
        ),
    );

    let decoded = RowExpression::from_bytes(&expr.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, expr);
    assert_eq!(decoded.to_string(), expr.to_string());

    let row = vec![None, bigint(1)];
    assert_eq!(
        compiler().compile(&decoded).unwrap().evaluate(&row).unwrap(),
        Some(Value::Boolean(true))
    );
}

#[test]
fn test_error_codes() {
    let compiler = compiler();
    let eval = |expr: RowExpression| {
        compiler
            .compile(&expr)
            .unwrap()
            .evaluate(&Vec::<Option<Value>>::new())
            .unwrap_err()
            .code
    };

    assert_eq!(
        eval(RowExpression::cast(RowExpression::varchar("abc"), DataType::Bigint)),
        ErrorCode::InvalidFormat
    );
    assert_eq!(
        eval(RowExpression::cast(
            RowExpression::varchar("99999999999999999999"),
            DataType::Bigint
        )),
        ErrorCode::NumericValueOutOfRange
    );
    assert_eq!(
        eval(RowExpression::arithmetic(
            OperatorType::Add,
            RowExpression::bigint(i64::MAX),
            RowExpression::bigint(1),
        )),
        ErrorCode::NumericValueOutOfRange
    );
    assert_eq!(
        eval(RowExpression::arithmetic(
            OperatorType::Divide,
            RowExpression::bigint(1),
            RowExpression::bigint(0),
        )),
        ErrorCode::DivisionByZero
    );
    assert_eq!(
        eval(RowExpression::call(
            "fail",
            vec![RowExpression::varchar("stop")],
            DataType::Bigint,
        )),
        ErrorCode::FunctionError
    );
}

#[test]
fn test_transform_with_bound_capture() {
    let array_type = DataType::array(DataType::Bigint);
    // transform(#0, BIND(#1, (offset, x) -> x + offset))
    let expr = RowExpression::call(
        "transform",
        vec![
            RowExpression::field(0, array_type.clone()),
            RowExpression::bind(
                vec![RowExpression::field(1, DataType::Bigint)],
                RowExpression::lambda(
                    vec![
                        LambdaParameter::new("offset", DataType::Bigint),
                        LambdaParameter::new("x", DataType::Bigint),
                    ],
                    RowExpression::arithmetic(
                        OperatorType::Add,
                        RowExpression::variable("x", DataType::Bigint),
                        RowExpression::variable("offset", DataType::Bigint),
                    ),
                ),
            ),
        ],
        array_type,
    );
    let compiled = compiler().compile(&expr).unwrap();

    let row = vec![bigint_array(&[Some(1), None, Some(3)]), bigint(10)];
    assert_eq!(
        compiled.evaluate(&row).unwrap(),
        bigint_array(&[Some(11), None, Some(13)])
    );

    // A NULL capture reaches the lambda as NULL
    let row = vec![bigint_array(&[Some(1)]), None];
    assert_eq!(compiled.evaluate(&row).unwrap(), bigint_array(&[None]));

    let row = vec![None, bigint(10)];
    assert_eq!(compiled.evaluate(&row).unwrap(), None);
}

#[test]
fn test_filter_with_lambda() {
    let array_type = DataType::array(DataType::Bigint);
    // filter(#0, x -> x > 2)
    let expr = RowExpression::call(
        "filter",
        vec![
            RowExpression::field(0, array_type.clone()),
            RowExpression::lambda(
                vec![LambdaParameter::new("x", DataType::Bigint)],
                RowExpression::compare(
                    OperatorType::GreaterThan,
                    RowExpression::variable("x", DataType::Bigint),
                    RowExpression::bigint(2),
                ),
            ),
        ],
        array_type,
    );

    let row = vec![bigint_array(&[Some(1), Some(3), None, Some(5)])];
    assert_eq!(
        compiler().compile(&expr).unwrap().evaluate(&row).unwrap(),
        bigint_array(&[Some(3), Some(5)])
    );
}

#[test]
fn test_lambda_cannot_read_row_fields() {
    let array_type = DataType::array(DataType::Bigint);
    let expr = RowExpression::call(
        "transform",
        vec![
            RowExpression::field(0, array_type.clone()),
            RowExpression::lambda(
                vec![LambdaParameter::new("x", DataType::Bigint)],
                RowExpression::field(1, DataType::Bigint),
            ),
        ],
        array_type,
    );
    assert_eq!(
        compiler().compile(&expr).unwrap_err(),
        CompileError::FieldReferenceInLambda { index: 1 }
    );
}

#[test]
fn test_depth_limit() {
    let mut expr = RowExpression::field(0, DataType::Boolean);
    for _ in 0..20 {
        expr = RowExpression::and(expr, RowExpression::boolean(true));
    }

    let shallow = ExpressionCompiler::new(
        Arc::new(FunctionRegistry::with_builtins()),
        CompilerConfig::default().with_max_expression_depth(8),
    );
    assert_eq!(
        shallow.compile(&expr).unwrap_err(),
        CompileError::ExpressionTooDeep { max_depth: 8 }
    );
    assert!(compiler().compile(&expr).is_ok());
}

#[test]
fn test_unknown_function() {
    let expr = RowExpression::call("no_such_function", vec![], DataType::Bigint);
    assert!(matches!(
        compiler().compile(&expr),
        Err(CompileError::UnknownFunction { .. })
    ));
}
