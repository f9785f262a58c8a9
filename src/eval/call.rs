//! Calling conventions around resolved functions.

use crate::block::Value;
use crate::compiler::{CompiledArgument, CompiledCall};
use crate::error::{EvalResult, EvaluationError};
use crate::eval::{expect_boolean, BoundLambda, EvalContext};
use crate::function::{FunctionBinding, ScalarImplementation};

/// Evaluate arguments in order and invoke the function.
///
/// Under return-null-on-null the first null argument ends the call: the
/// result is null and the remaining arguments are not evaluated.
pub(super) fn evaluate_call(
    call: &CompiledCall,
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    let mut lambdas = Vec::new();
    match &call.binding.implementation {
        ScalarImplementation::ReturnNullOnNull(function) => {
            let mut values = Vec::with_capacity(call.placeholders.len());
            for argument in &call.arguments {
                match argument {
                    CompiledArgument::Value(expr) => match expr.evaluate(ctx)? {
                        Some(value) => values.push(value),
                        None => return Ok(None),
                    },
                    CompiledArgument::Function(lambda) => lambdas.push(lambda.bind(ctx)?),
                }
            }
            function(&values, &lambdas)
        }
        ScalarImplementation::NullFlags(function) => {
            let mut values = Vec::with_capacity(call.placeholders.len());
            let mut nulls = Vec::with_capacity(call.placeholders.len());
            for argument in &call.arguments {
                match argument {
                    CompiledArgument::Value(expr) => {
                        let value = expr.evaluate(ctx)?;
                        let position = values.len();
                        nulls.push(value.is_none());
                        values.push(value.unwrap_or_else(|| call.placeholders[position].clone()));
                    }
                    CompiledArgument::Function(lambda) => lambdas.push(lambda.bind(ctx)?),
                }
            }
            function(&values, &nulls, &lambdas)
        }
        ScalarImplementation::BoxedNullable(function) => {
            let mut values = Vec::with_capacity(call.placeholders.len());
            for argument in &call.arguments {
                match argument {
                    CompiledArgument::Value(expr) => values.push(expr.evaluate(ctx)?),
                    CompiledArgument::Function(lambda) => lambdas.push(lambda.bind(ctx)?),
                }
            }
            function(&values, &lambdas)
        }
    }
}

/// Invoke a binding on already evaluated value arguments
pub(crate) fn invoke_values(
    binding: &FunctionBinding,
    arguments: Vec<Option<Value>>,
) -> EvalResult<Option<Value>> {
    match &binding.implementation {
        ScalarImplementation::ReturnNullOnNull(function) => {
            match arguments.into_iter().collect::<Option<Vec<_>>>() {
                Some(values) => function(&values, &[]),
                None => Ok(None),
            }
        }
        ScalarImplementation::NullFlags(function) => {
            let nulls: Vec<bool> = arguments.iter().map(Option::is_none).collect();
            let values: Vec<Value> = arguments
                .into_iter()
                .zip(&binding.signature.argument_types)
                .map(|(value, data_type)| value.unwrap_or_else(|| Value::placeholder(data_type)))
                .collect();
            function(&values, &nulls, &[])
        }
        ScalarImplementation::BoxedNullable(function) => function(&arguments, &[]),
    }
}

/// Three-valued `left = right` through a resolved equality binding
pub(crate) fn invoke_equal(
    equal: &FunctionBinding,
    left: Option<Value>,
    right: Option<Value>,
) -> EvalResult<Option<bool>> {
    let result = invoke_values(equal, vec![left, right])?;
    expect_boolean(result, "equality result").map_err(|e| {
        EvaluationError::internal(format!("{} returned a non-boolean: {}", equal.signature, e))
    })
}
