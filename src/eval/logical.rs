//! Short-circuiting AND / OR under three-valued logic.
//!
//! The left operand is always evaluated first. The right operand is evaluated
//! only when the left one does not decide the result: for OR when left is
//! false or null, for AND when left is true or null.

use crate::block::Value;
use crate::compiler::CompiledExpr;
use crate::error::EvalResult;
use crate::eval::{expect_boolean, EvalContext};

pub(super) fn evaluate_or(
    left: &CompiledExpr,
    right: &CompiledExpr,
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    let left = expect_boolean(left.evaluate(ctx)?, "OR operand")?;
    if left == Some(true) {
        return Ok(Some(Value::Boolean(true)));
    }
    let right = expect_boolean(right.evaluate(ctx)?, "OR operand")?;
    let result = match (left, right) {
        (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    };
    Ok(result.map(Value::Boolean))
}

pub(super) fn evaluate_and(
    left: &CompiledExpr,
    right: &CompiledExpr,
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    let left = expect_boolean(left.evaluate(ctx)?, "AND operand")?;
    if left == Some(false) {
        return Ok(Some(Value::Boolean(false)));
    }
    let right = expect_boolean(right.evaluate(ctx)?, "AND operand")?;
    let result = match (left, right) {
        (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    };
    Ok(result.map(Value::Boolean))
}
