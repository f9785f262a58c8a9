use crate::block::Value;
use crate::compiler::{CompiledComparison, CompiledExpr};
use crate::error::EvalResult;
use crate::eval::call::invoke_equal;
use crate::eval::EvalContext;

/// `target IN (candidates...)`.
///
/// A null target is null without looking at any candidate. Otherwise the
/// first candidate equal to the target returns true immediately; if none
/// matches, any unknown comparison makes the result null, else false.
pub(super) fn evaluate_in(
    target: &CompiledExpr,
    candidates: &[CompiledComparison],
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    let target = match target.evaluate(ctx)? {
        Some(target) => target,
        None => return Ok(None),
    };

    let mut unknown = false;
    for candidate in candidates {
        let value = candidate.value.evaluate(ctx)?;
        match invoke_equal(&candidate.equal, Some(target.clone()), value)? {
            Some(true) => return Ok(Some(Value::Boolean(true))),
            Some(false) => {}
            None => unknown = true,
        }
    }

    if unknown {
        Ok(None)
    } else {
        Ok(Some(Value::Boolean(false)))
    }
}
