//! COALESCE, SWITCH/WHEN, IF and NULL_IF.

use crate::block::Value;
use crate::compiler::{CompiledExpr, CompiledSwitch, CompiledWhen};
use crate::error::EvalResult;
use crate::eval::call::invoke_equal;
use crate::eval::{expect_boolean, EvalContext};
use crate::function::FunctionBinding;

/// First non-null argument; later arguments are not evaluated
pub(super) fn evaluate_coalesce(
    arguments: &[CompiledExpr],
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    for argument in arguments {
        if let Some(value) = argument.evaluate(ctx)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Arms are tried in order; an arm whose test is null does not match.
/// A null operand cannot match any arm, so it goes straight to the else.
pub(super) fn evaluate_switch(
    switch: &CompiledSwitch,
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    let operand = match &switch.operand {
        Some(operand) => match operand.evaluate(ctx)? {
            Some(value) => Some(value),
            None => return evaluate_otherwise(switch.otherwise.as_ref(), ctx),
        },
        None => None,
    };

    for arm in &switch.arms {
        let (matched, result) = match (arm, &operand) {
            (CompiledWhen::Condition { condition, result }, _) => (
                expect_boolean(condition.evaluate(ctx)?, "WHEN condition")?,
                result,
            ),
            (CompiledWhen::Match { value, result }, Some(operand)) => {
                let candidate = value.value.evaluate(ctx)?;
                (
                    invoke_equal(&value.equal, Some(operand.clone()), candidate)?,
                    result,
                )
            }
            (CompiledWhen::Match { result, .. }, None) => (None, result),
        };
        if matched == Some(true) {
            return result.evaluate(ctx);
        }
    }
    evaluate_otherwise(switch.otherwise.as_ref(), ctx)
}

fn evaluate_otherwise(
    otherwise: Option<&CompiledExpr>,
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    match otherwise {
        Some(expr) => expr.evaluate(ctx),
        None => Ok(None),
    }
}

pub(super) fn evaluate_if(
    condition: &CompiledExpr,
    then: &CompiledExpr,
    otherwise: Option<&CompiledExpr>,
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    match expect_boolean(condition.evaluate(ctx)?, "IF condition")? {
        Some(true) => then.evaluate(ctx),
        _ => evaluate_otherwise(otherwise, ctx),
    }
}

/// Both operands are always evaluated. Null unless `first = second` is
/// definitely true, in which case the result is null.
pub(super) fn evaluate_null_if(
    first: &CompiledExpr,
    second: &CompiledExpr,
    equal: &FunctionBinding,
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    let first = first.evaluate(ctx)?;
    let second = second.evaluate(ctx)?;
    if first.is_none() || second.is_none() {
        return Ok(first);
    }
    match invoke_equal(equal, first.clone(), second)? {
        Some(true) => Ok(None),
        _ => Ok(first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bigint(n: i64) -> CompiledExpr {
        CompiledExpr::Constant(Some(Value::Bigint(n)))
    }

    #[test]
    fn test_coalesce_stops_at_first_value() {
        let ctx = EvalContext::empty();
        // Field(0) would fail without a row
        let arguments = vec![CompiledExpr::Constant(None), bigint(2), CompiledExpr::Field(0)];
        assert_eq!(
            evaluate_coalesce(&arguments, &ctx),
            Ok(Some(Value::Bigint(2)))
        );
        assert_eq!(
            evaluate_coalesce(&[CompiledExpr::Constant(None)], &ctx),
            Ok(None)
        );
    }

    #[test]
    fn test_if_null_condition_takes_else() {
        let ctx = EvalContext::empty();
        assert_eq!(
            evaluate_if(&CompiledExpr::Constant(None), &bigint(1), Some(&bigint(2)), &ctx),
            Ok(Some(Value::Bigint(2)))
        );
        assert_eq!(
            evaluate_if(&CompiledExpr::Constant(None), &bigint(1), None, &ctx),
            Ok(None)
        );
        assert_eq!(
            evaluate_if(
                &CompiledExpr::Constant(Some(Value::Boolean(true))),
                &bigint(1),
                Some(&CompiledExpr::Field(0)),
                &ctx
            ),
            Ok(Some(Value::Bigint(1)))
        );
    }

    #[test]
    fn test_searched_switch_skips_null_condition() {
        let switch = CompiledSwitch {
            operand: None,
            arms: vec![
                CompiledWhen::Condition {
                    condition: CompiledExpr::Constant(None),
                    result: bigint(1),
                },
                CompiledWhen::Condition {
                    condition: CompiledExpr::Constant(Some(Value::Boolean(true))),
                    result: bigint(2),
                },
            ],
            otherwise: Some(CompiledExpr::Field(0)),
        };
        assert_eq!(
            evaluate_switch(&switch, &EvalContext::empty()),
            Ok(Some(Value::Bigint(2)))
        );
    }
}
