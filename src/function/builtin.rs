//! Built-in operators and scalar functions.

use crate::block::{DataType, Value};
use crate::error::{EvalResult, EvaluationError};
use crate::eval::BoundLambda;
use crate::function::{FunctionDefinition, FunctionRegistry, OperatorType, ScalarImplementation};
use std::cmp::Ordering;
use std::num::IntErrorKind;

/// Register every built-in into `registry`
pub fn register_all(registry: &mut FunctionRegistry) {
    register_arithmetic(registry);
    register_comparison(registry);
    register_cast(registry);
    register_scalar(registry);
    register_array(registry);
}

fn arguments2(args: &[Value]) -> EvalResult<(&Value, &Value)> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(EvaluationError::internal(format!(
            "expected 2 arguments, got {}",
            args.len()
        ))),
    }
}

fn arguments1(args: &[Value]) -> EvalResult<&Value> {
    match args {
        [a] => Ok(a),
        _ => Err(EvaluationError::internal(format!(
            "expected 1 argument, got {}",
            args.len()
        ))),
    }
}

fn first_lambda(lambdas: &[BoundLambda]) -> EvalResult<&BoundLambda> {
    lambdas
        .first()
        .ok_or_else(|| EvaluationError::internal("missing function argument"))
}

fn expect_bigint(value: &Value) -> EvalResult<i64> {
    value.as_bigint().ok_or_else(|| {
        EvaluationError::type_mismatch(format!("expected bigint, got {}", value.type_name()))
    })
}

fn expect_double(value: &Value) -> EvalResult<f64> {
    value.as_double().ok_or_else(|| {
        EvaluationError::type_mismatch(format!("expected double, got {}", value.type_name()))
    })
}

fn expect_bool(value: &Value) -> EvalResult<bool> {
    value.as_bool().ok_or_else(|| {
        EvaluationError::type_mismatch(format!("expected boolean, got {}", value.type_name()))
    })
}

fn expect_str(value: &Value) -> EvalResult<&str> {
    value.as_str().ok_or_else(|| {
        EvaluationError::type_mismatch(format!("expected varchar, got {}", value.type_name()))
    })
}

fn expect_elements(value: &Value) -> EvalResult<&[Option<Value>]> {
    value.as_elements().ok_or_else(|| {
        EvaluationError::type_mismatch(format!("expected array, got {}", value.type_name()))
    })
}

// Arithmetic

fn bigint_binary(
    operation: &'static str,
    symbol: &'static str,
    apply: fn(i64, i64) -> Option<i64>,
) -> ScalarImplementation {
    ScalarImplementation::return_null_on_null(move |args, _| {
        let (a, b) = arguments2(args)?;
        let (a, b) = (expect_bigint(a)?, expect_bigint(b)?);
        match apply(a, b) {
            Some(result) => Ok(Some(Value::Bigint(result))),
            None => Err(EvaluationError::out_of_range(format!(
                "bigint {} overflow: {} {} {}",
                operation, a, symbol, b
            ))),
        }
    })
}

fn bigint_division(
    operation: &'static str,
    symbol: &'static str,
    apply: fn(i64, i64) -> Option<i64>,
) -> ScalarImplementation {
    ScalarImplementation::return_null_on_null(move |args, _| {
        let (a, b) = arguments2(args)?;
        let (a, b) = (expect_bigint(a)?, expect_bigint(b)?);
        if b == 0 {
            return Err(EvaluationError::division_by_zero());
        }
        match apply(a, b) {
            Some(result) => Ok(Some(Value::Bigint(result))),
            None => Err(EvaluationError::out_of_range(format!(
                "bigint {} overflow: {} {} {}",
                operation, a, symbol, b
            ))),
        }
    })
}

fn double_binary(apply: fn(f64, f64) -> f64) -> ScalarImplementation {
    ScalarImplementation::return_null_on_null(move |args, _| {
        let (a, b) = arguments2(args)?;
        Ok(Some(Value::Double(apply(expect_double(a)?, expect_double(b)?))))
    })
}

fn register_arithmetic(registry: &mut FunctionRegistry) {
    let bigints = vec![DataType::Bigint, DataType::Bigint];
    let doubles = vec![DataType::Double, DataType::Double];

    let bigint_operators = [
        (
            OperatorType::Add,
            bigint_binary("addition", "+", i64::checked_add),
        ),
        (
            OperatorType::Subtract,
            bigint_binary("subtraction", "-", i64::checked_sub),
        ),
        (
            OperatorType::Multiply,
            bigint_binary("multiplication", "*", i64::checked_mul),
        ),
        (
            OperatorType::Divide,
            bigint_division("division", "/", i64::checked_div),
        ),
        // i64::MIN % -1 is mathematically 0
        (
            OperatorType::Modulus,
            bigint_division("modulus", "%", |a, b| Some(a.wrapping_rem(b))),
        ),
    ];
    for (operator, implementation) in bigint_operators {
        registry.register(
            FunctionDefinition::fixed(
                operator.function_name(),
                bigints.clone(),
                DataType::Bigint,
                implementation,
            )
            .can_fail(),
        );
    }

    let double_operators: [(OperatorType, fn(f64, f64) -> f64); 5] = [
        (OperatorType::Add, |a, b| a + b),
        (OperatorType::Subtract, |a, b| a - b),
        (OperatorType::Multiply, |a, b| a * b),
        (OperatorType::Divide, |a, b| a / b),
        (OperatorType::Modulus, |a, b| a % b),
    ];
    for (operator, apply) in double_operators {
        registry.register(FunctionDefinition::fixed(
            operator.function_name(),
            doubles.clone(),
            DataType::Double,
            double_binary(apply),
        ));
    }

    registry.register(
        FunctionDefinition::fixed(
            OperatorType::Negation.function_name(),
            vec![DataType::Bigint],
            DataType::Bigint,
            ScalarImplementation::return_null_on_null(|args, _| {
                let n = expect_bigint(arguments1(args)?)?;
                n.checked_neg().map(|n| Some(Value::Bigint(n))).ok_or_else(|| {
                    EvaluationError::out_of_range(format!("bigint negation overflow: -{}", n))
                })
            }),
        )
        .can_fail(),
    );
    registry.register(FunctionDefinition::fixed(
        OperatorType::Negation.function_name(),
        vec![DataType::Double],
        DataType::Double,
        ScalarImplementation::return_null_on_null(|args, _| {
            Ok(Some(Value::Double(-expect_double(arguments1(args)?)?)))
        }),
    ));
}

// Comparison

/// Three-valued structural equality. Arrays and rows compare element-wise:
/// any unequal pair makes the result false, otherwise any null makes it null.
pub fn values_equal(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => Some(x == y),
        (Value::Bigint(x), Value::Bigint(y)) => Some(x == y),
        (Value::Double(x), Value::Double(y)) => Some(x == y),
        (Value::Varchar(x), Value::Varchar(y)) => Some(x == y),
        (Value::Array(x), Value::Array(y)) | (Value::Row(x), Value::Row(y)) => {
            if x.len() != y.len() {
                return Some(false);
            }
            let mut saw_null = false;
            for pair in x.iter().zip(y.iter()) {
                match pair {
                    (Some(x), Some(y)) => match values_equal(x, y) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => saw_null = true,
                    },
                    _ => saw_null = true,
                }
            }
            if saw_null {
                None
            } else {
                Some(true)
            }
        }
        _ => Some(false),
    }
}

/// Equality where null equals null, used by IS DISTINCT FROM
fn not_distinct(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(Value::Array(x)), Some(Value::Array(y)))
        | (Some(Value::Row(x)), Some(Value::Row(y))) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y.iter())
                    .all(|(x, y)| not_distinct(x.as_ref(), y.as_ref()))
        }
        (Some(x), Some(y)) => values_equal(x, y).unwrap_or(false),
    }
}

fn compare_scalar(a: &Value, b: &Value) -> EvalResult<Option<Ordering>> {
    match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => Ok(Some(x.cmp(y))),
        (Value::Bigint(x), Value::Bigint(y)) => Ok(Some(x.cmp(y))),
        (Value::Double(x), Value::Double(y)) => Ok(x.partial_cmp(y)),
        (Value::Varchar(x), Value::Varchar(y)) => Ok(Some(x.cmp(y))),
        _ => Err(EvaluationError::type_mismatch(format!(
            "cannot order {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn is_scalar(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Boolean | DataType::Bigint | DataType::Double | DataType::Varchar
    )
}

/// Both operands compatible and comparable, result boolean
fn is_comparison_signature(types: &[DataType], return_type: &DataType) -> bool {
    match types {
        [a, b] => {
            *return_type == DataType::Boolean
                && a.is_comparable()
                && (a.accepts(b) || b.accepts(a))
        }
        _ => false,
    }
}

fn register_comparison(registry: &mut FunctionRegistry) {
    registry.register(FunctionDefinition::generic(
        OperatorType::Equal.function_name(),
        |signature| {
            is_comparison_signature(&signature.argument_types, &signature.return_type).then(|| {
                ScalarImplementation::return_null_on_null(|args, _| {
                    let (a, b) = arguments2(args)?;
                    Ok(values_equal(a, b).map(Value::Boolean))
                })
            })
        },
    ));

    registry.register(FunctionDefinition::generic(
        OperatorType::NotEqual.function_name(),
        |signature| {
            is_comparison_signature(&signature.argument_types, &signature.return_type).then(|| {
                ScalarImplementation::return_null_on_null(|args, _| {
                    let (a, b) = arguments2(args)?;
                    Ok(values_equal(a, b).map(|equal| Value::Boolean(!equal)))
                })
            })
        },
    ));

    registry.register(FunctionDefinition::generic(
        OperatorType::IsDistinctFrom.function_name(),
        |signature| {
            is_comparison_signature(&signature.argument_types, &signature.return_type).then(|| {
                ScalarImplementation::null_flags(|args, nulls, _| {
                    let (a, b) = arguments2(args)?;
                    let a = (!nulls[0]).then_some(a);
                    let b = (!nulls[1]).then_some(b);
                    Ok(Some(Value::Boolean(!not_distinct(a, b))))
                })
            })
        },
    ));

    let orderings: [(OperatorType, fn(Ordering) -> bool); 4] = [
        (OperatorType::LessThan, |o| o == Ordering::Less),
        (OperatorType::LessThanOrEqual, |o| o != Ordering::Greater),
        (OperatorType::GreaterThan, |o| o == Ordering::Greater),
        (OperatorType::GreaterThanOrEqual, |o| o != Ordering::Less),
    ];
    for (operator, test) in orderings {
        registry.register(FunctionDefinition::generic(
            operator.function_name(),
            move |signature| {
                let supported = is_comparison_signature(
                    &signature.argument_types,
                    &signature.return_type,
                ) && signature.argument_types.iter().all(|t| {
                    is_scalar(t) || *t == DataType::Unknown
                });
                supported.then(|| {
                    ScalarImplementation::return_null_on_null(move |args, _| {
                        let (a, b) = arguments2(args)?;
                        // NaN is unordered; every ordering test on it is false
                        let ordering = compare_scalar(a, b)?;
                        Ok(Some(Value::Boolean(ordering.map_or(false, test))))
                    })
                })
            },
        ));
    }
}

// Cast

fn parse_bigint(s: &str) -> EvalResult<i64> {
    s.trim().parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            EvaluationError::out_of_range(format!("'{}' is out of range for bigint", s))
        }
        _ => EvaluationError::invalid_format(format!("cannot cast '{}' to bigint", s)),
    })
}

fn double_to_bigint(n: f64) -> EvalResult<i64> {
    let rounded = n.round();
    // i64::MAX is not representable as f64; 2^63 is the first value past it
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if rounded.is_nan() || rounded < -LIMIT || rounded >= LIMIT {
        return Err(EvaluationError::out_of_range(format!(
            "{:?} is out of range for bigint",
            n
        )));
    }
    Ok(rounded as i64)
}

fn cast_value(value: &Value, target: &DataType) -> EvalResult<Value> {
    let cast = match (value, target) {
        (Value::Boolean(_), DataType::Boolean)
        | (Value::Bigint(_), DataType::Bigint)
        | (Value::Double(_), DataType::Double)
        | (Value::Varchar(_), DataType::Varchar) => value.clone(),

        (Value::Bigint(n), DataType::Double) => Value::Double(*n as f64),
        (Value::Bigint(n), DataType::Boolean) => Value::Boolean(*n != 0),
        (Value::Bigint(n), DataType::Varchar) => Value::varchar(n.to_string()),

        (Value::Double(n), DataType::Bigint) => Value::Bigint(double_to_bigint(*n)?),
        (Value::Double(n), DataType::Varchar) => Value::varchar(format!("{:?}", n)),

        (Value::Boolean(b), DataType::Bigint) => Value::Bigint(i64::from(*b)),
        (Value::Boolean(b), DataType::Varchar) => Value::varchar(b.to_string()),

        (Value::Varchar(s), DataType::Bigint) => Value::Bigint(parse_bigint(s)?),
        (Value::Varchar(s), DataType::Double) => {
            Value::Double(s.trim().parse::<f64>().map_err(|_| {
                EvaluationError::invalid_format(format!("cannot cast '{}' to double", s))
            })?)
        }
        (Value::Varchar(s), DataType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => {
                return Err(EvaluationError::invalid_format(format!(
                    "cannot cast '{}' to boolean",
                    s
                )))
            }
        },

        _ => {
            return Err(EvaluationError::type_mismatch(format!(
                "cannot cast {} to {}",
                value.type_name(),
                target
            )))
        }
    };
    Ok(cast)
}

fn is_castable(from: &DataType, to: &DataType) -> bool {
    from == to
        || matches!(
            (from, to),
            (DataType::Bigint, DataType::Double)
                | (DataType::Bigint, DataType::Boolean)
                | (DataType::Bigint, DataType::Varchar)
                | (DataType::Double, DataType::Bigint)
                | (DataType::Double, DataType::Varchar)
                | (DataType::Boolean, DataType::Bigint)
                | (DataType::Boolean, DataType::Varchar)
                | (DataType::Varchar, DataType::Bigint)
                | (DataType::Varchar, DataType::Double)
                | (DataType::Varchar, DataType::Boolean)
                | (DataType::Unknown, _)
        )
}

fn register_cast(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionDefinition::generic(OperatorType::Cast.function_name(), |signature| {
            let target = signature.return_type.clone();
            match &signature.argument_types[..] {
                [from] if is_castable(from, &target) => {
                    Some(ScalarImplementation::return_null_on_null(move |args, _| {
                        cast_value(arguments1(args)?, &target).map(Some)
                    }))
                }
                _ => None,
            }
        })
        .can_fail(),
    );
}

// Scalar functions

fn register_scalar(registry: &mut FunctionRegistry) {
    registry.register(FunctionDefinition::fixed(
        "not",
        vec![DataType::Boolean],
        DataType::Boolean,
        ScalarImplementation::return_null_on_null(|args, _| {
            Ok(Some(Value::Boolean(!expect_bool(arguments1(args)?)?)))
        }),
    ));

    registry.register(FunctionDefinition::generic("concat", |signature| {
        let supported = !signature.argument_types.is_empty()
            && signature
                .argument_types
                .iter()
                .all(|t| *t == DataType::Varchar)
            && signature.return_type == DataType::Varchar;
        supported.then(|| {
            ScalarImplementation::return_null_on_null(|args, _| {
                let mut result = String::new();
                for argument in args {
                    result.push_str(expect_str(argument)?);
                }
                Ok(Some(Value::varchar(result)))
            })
        })
    }));

    registry.register(FunctionDefinition::fixed(
        "length",
        vec![DataType::Varchar],
        DataType::Bigint,
        ScalarImplementation::return_null_on_null(|args, _| {
            let s = expect_str(arguments1(args)?)?;
            Ok(Some(Value::Bigint(s.chars().count() as i64)))
        }),
    ));

    registry.register(
        FunctionDefinition::generic("fail", |signature| {
            (signature.argument_types == [DataType::Varchar]).then(|| {
                ScalarImplementation::boxed_nullable(|args, _| {
                    let message = args
                        .first()
                        .and_then(|a| a.as_ref())
                        .and_then(Value::as_str)
                        .unwrap_or("fail() called");
                    Err(EvaluationError::function_error(message))
                })
            })
        })
        .can_fail(),
    );

    registry.register(
        FunctionDefinition::fixed(
            "random",
            vec![],
            DataType::Double,
            ScalarImplementation::return_null_on_null(|_, _| {
                Ok(Some(Value::Double(rand::random::<f64>())))
            }),
        )
        .nondeterministic(),
    );
}

// Arrays and lambdas

fn register_array(registry: &mut FunctionRegistry) {
    registry.register(FunctionDefinition::generic("cardinality", |signature| {
        let supported = matches!(&signature.argument_types[..], [DataType::Array(_)])
            && signature.return_type == DataType::Bigint;
        supported.then(|| {
            ScalarImplementation::return_null_on_null(|args, _| {
                let elements = expect_elements(arguments1(args)?)?;
                Ok(Some(Value::Bigint(elements.len() as i64)))
            })
        })
    }));

    registry.register(FunctionDefinition::generic(
        "array_constructor",
        |signature| {
            let element = match &signature.return_type {
                DataType::Array(element) => element,
                _ => return None,
            };
            signature
                .argument_types
                .iter()
                .all(|t| element.accepts(t))
                .then(|| {
                    ScalarImplementation::boxed_nullable(|args, _| {
                        Ok(Some(Value::array(args.to_vec())))
                    })
                })
        },
    ));

    // transform(array(T), function(T, U)) -> array(U)
    registry.register(
        FunctionDefinition::generic("transform", |signature| {
            let supported = match (&signature.argument_types[..], &signature.return_type) {
                (
                    [DataType::Array(element), DataType::Function {
                        arguments,
                        return_type,
                    }],
                    DataType::Array(output),
                ) => arguments.len() == 1 && arguments[0].accepts(element) && output.accepts(return_type),
                _ => false,
            };
            supported.then(|| {
                ScalarImplementation::return_null_on_null(|args, lambdas| {
                    let elements = expect_elements(arguments1(args)?)?;
                    let function = first_lambda(lambdas)?;
                    let mut output = Vec::with_capacity(elements.len());
                    for element in elements {
                        output.push(function.invoke(std::slice::from_ref(element))?);
                    }
                    Ok(Some(Value::array(output)))
                })
            })
        })
        .can_fail(),
    );

    // filter(array(T), function(T, boolean)) -> array(T)
    registry.register(
        FunctionDefinition::generic("filter", |signature| {
            let supported = match (&signature.argument_types[..], &signature.return_type) {
                (
                    [DataType::Array(element), DataType::Function {
                        arguments,
                        return_type,
                    }],
                    DataType::Array(output),
                ) => {
                    arguments.len() == 1
                        && arguments[0].accepts(element)
                        && **return_type == DataType::Boolean
                        && output == element
                }
                _ => false,
            };
            supported.then(|| {
                ScalarImplementation::return_null_on_null(|args, lambdas| {
                    let elements = expect_elements(arguments1(args)?)?;
                    let predicate = first_lambda(lambdas)?;
                    let mut output = Vec::new();
                    for element in elements {
                        let keep = predicate.invoke(std::slice::from_ref(element))?;
                        if keep.as_ref().and_then(Value::as_bool) == Some(true) {
                            output.push(element.clone());
                        }
                    }
                    Ok(Some(Value::array(output)))
                })
            })
        })
        .can_fail(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn bigint(n: i64) -> Value {
        Value::Bigint(n)
    }

    fn array(values: Vec<Option<i64>>) -> Value {
        Value::array(values.into_iter().map(|v| v.map(Value::Bigint)).collect())
    }

    #[test]
    fn test_values_equal_three_valued() {
        assert_eq!(values_equal(&bigint(1), &bigint(1)), Some(true));
        assert_eq!(values_equal(&bigint(1), &bigint(2)), Some(false));
        assert_eq!(
            values_equal(&array(vec![Some(1), None]), &array(vec![Some(1), None])),
            None
        );
        assert_eq!(
            values_equal(&array(vec![Some(1), None]), &array(vec![Some(2), None])),
            Some(false)
        );
        assert_eq!(
            values_equal(&array(vec![Some(1)]), &array(vec![Some(1), Some(2)])),
            Some(false)
        );
        assert_eq!(
            values_equal(&Value::Double(f64::NAN), &Value::Double(f64::NAN)),
            Some(false)
        );
    }

    #[test]
    fn test_not_distinct() {
        assert!(not_distinct(None, None));
        assert!(!not_distinct(Some(&bigint(1)), None));
        let a = array(vec![Some(1), None]);
        assert!(not_distinct(Some(&a), Some(&a.clone())));
    }

    #[test]
    fn test_cast_value() {
        assert_eq!(
            cast_value(&Value::varchar(" 42 "), &DataType::Bigint),
            Ok(bigint(42))
        );
        assert_eq!(
            cast_value(&Value::varchar("abc"), &DataType::Bigint)
                .unwrap_err()
                .code,
            ErrorCode::InvalidFormat
        );
        assert_eq!(
            cast_value(&Value::varchar("99999999999999999999"), &DataType::Bigint)
                .unwrap_err()
                .code,
            ErrorCode::NumericValueOutOfRange
        );
        assert_eq!(
            cast_value(&Value::Double(2.5), &DataType::Bigint),
            Ok(bigint(3))
        );
        assert_eq!(
            cast_value(&Value::Double(1e19), &DataType::Bigint)
                .unwrap_err()
                .code,
            ErrorCode::NumericValueOutOfRange
        );
        assert_eq!(
            cast_value(&Value::Double(1.0), &DataType::Varchar),
            Ok(Value::varchar("1.0"))
        );
        assert_eq!(
            cast_value(&Value::varchar("TRUE"), &DataType::Boolean),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn test_compare_scalar_nan() {
        assert_eq!(
            compare_scalar(&Value::Double(f64::NAN), &Value::Double(1.0)),
            Ok(None)
        );
        assert_eq!(
            compare_scalar(&Value::varchar("a"), &Value::varchar("b")),
            Ok(Some(Ordering::Less))
        );
        assert!(compare_scalar(&bigint(1), &Value::varchar("b")).is_err());
    }

    #[test]
    fn test_double_to_bigint_bounds() {
        assert_eq!(double_to_bigint(-9_223_372_036_854_775_808.0), Ok(i64::MIN));
        assert!(double_to_bigint(9_223_372_036_854_775_808.0).is_err());
        assert!(double_to_bigint(f64::NAN).is_err());
    }
}
