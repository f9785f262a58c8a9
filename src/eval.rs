//! Evaluation of compiled expressions.
//!
//! Every evaluator returns `Option<Value>` directly; there is no null flag
//! shared between sub-evaluations. Special forms evaluate their operands
//! strictly left to right and never touch an operand whose value cannot
//! change the result, so failures in skipped branches never surface.

mod call;
mod conditional;
mod in_list;
mod lambda;
mod logical;

pub use lambda::BoundLambda;

use crate::block::{DataType, OutputSink, RowCursor, Value};
use crate::compiler::CompiledExpr;
use crate::error::{EvalResult, EvaluationError};

/// Inputs visible to an evaluator: the current row, or a lambda frame
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    row: Option<&'a dyn RowCursor>,
    frame: &'a [Option<Value>],
}

impl<'a> EvalContext<'a> {
    pub fn row(row: &'a dyn RowCursor) -> Self {
        Self {
            row: Some(row),
            frame: &[],
        }
    }

    /// Context of a lambda body: captured values followed by arguments
    pub fn frame(frame: &'a [Option<Value>]) -> Self {
        Self { row: None, frame }
    }

    /// Context for constant folding
    pub fn empty() -> Self {
        Self {
            row: None,
            frame: &[],
        }
    }

    fn cursor(&self) -> EvalResult<&'a dyn RowCursor> {
        self.row
            .ok_or_else(|| EvaluationError::internal("field reference evaluated without a row"))
    }
}

/// Compiled expression, safe to share across threads.
///
/// Holds no mutable state; each call supplies its own row and sink.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    root: CompiledExpr,
    return_type: DataType,
}

impl CompiledExpression {
    pub fn new(root: CompiledExpr, return_type: DataType) -> Self {
        Self { root, return_type }
    }

    /// Evaluate against one row
    pub fn evaluate(&self, row: &dyn RowCursor) -> EvalResult<Option<Value>> {
        self.root.evaluate(&EvalContext::row(row))
    }

    /// Evaluate against one row and append the result to `sink`
    pub fn evaluate_into(&self, row: &dyn RowCursor, sink: &mut dyn OutputSink) -> EvalResult<()> {
        let value = self.evaluate(row)?;
        sink.append_nullable(value)
    }

    pub fn return_type(&self) -> &DataType {
        &self.return_type
    }

    pub fn root(&self) -> &CompiledExpr {
        &self.root
    }

    /// True when the whole expression folded to a constant
    pub fn is_constant(&self) -> bool {
        self.root.as_constant().is_some()
    }
}

impl CompiledExpr {
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> EvalResult<Option<Value>> {
        match self {
            CompiledExpr::Constant(value) => Ok(value.clone()),
            CompiledExpr::Field(index) => ctx.cursor()?.read(*index),
            CompiledExpr::Variable(slot) => ctx.frame.get(*slot).cloned().ok_or_else(|| {
                EvaluationError::internal(format!(
                    "lambda slot {} out of bounds for frame of {}",
                    slot,
                    ctx.frame.len()
                ))
            }),
            CompiledExpr::Call(call) => call::evaluate_call(call, ctx),
            CompiledExpr::And { left, right } => logical::evaluate_and(left, right, ctx),
            CompiledExpr::Or { left, right } => logical::evaluate_or(left, right, ctx),
            CompiledExpr::IsNull(operand) => evaluate_is_null(operand, ctx),
            CompiledExpr::Coalesce(arguments) => conditional::evaluate_coalesce(arguments, ctx),
            CompiledExpr::In { target, candidates } => {
                in_list::evaluate_in(target, candidates, ctx)
            }
            CompiledExpr::Switch(switch) => conditional::evaluate_switch(switch, ctx),
            CompiledExpr::If {
                condition,
                then,
                otherwise,
            } => conditional::evaluate_if(condition, then, otherwise.as_deref(), ctx),
            CompiledExpr::NullIf {
                first,
                second,
                equal,
            } => conditional::evaluate_null_if(first, second, equal, ctx),
            CompiledExpr::Dereference { base, index } => evaluate_dereference(base, *index, ctx),
            CompiledExpr::RowConstructor(fields) => {
                let values = fields
                    .iter()
                    .map(|f| f.evaluate(ctx))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Some(Value::row(values)))
            }
        }
    }
}

/// Only nullness is needed, so fields are checked without decoding
fn evaluate_is_null(operand: &CompiledExpr, ctx: &EvalContext<'_>) -> EvalResult<Option<Value>> {
    let is_null = match operand {
        CompiledExpr::Field(index) => ctx.cursor()?.is_null(*index)?,
        other => other.evaluate(ctx)?.is_none(),
    };
    Ok(Some(Value::Boolean(is_null)))
}

fn evaluate_dereference(
    base: &CompiledExpr,
    index: usize,
    ctx: &EvalContext<'_>,
) -> EvalResult<Option<Value>> {
    let row = match base.evaluate(ctx)? {
        Some(row) => row,
        None => return Ok(None),
    };
    let fields = row.as_fields().ok_or_else(|| {
        EvaluationError::type_mismatch(format!("cannot dereference {}", row.type_name()))
    })?;
    fields.get(index).cloned().ok_or_else(|| {
        EvaluationError::internal(format!(
            "field {} out of bounds for row of {} fields",
            index,
            fields.len()
        ))
    })
}

/// Interpret an operand of a boolean form
pub(crate) fn expect_boolean(value: Option<Value>, context: &str) -> EvalResult<Option<bool>> {
    match value {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(b)),
        Some(other) => Err(EvaluationError::type_mismatch(format!(
            "{} must be boolean, got {}",
            context,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_field_without_row() {
        let err = CompiledExpr::Field(0)
            .evaluate(&EvalContext::empty())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[test]
    fn test_variable_reads_frame() {
        let frame = vec![Some(Value::Bigint(7)), None];
        let ctx = EvalContext::frame(&frame);
        assert_eq!(
            CompiledExpr::Variable(0).evaluate(&ctx),
            Ok(Some(Value::Bigint(7)))
        );
        assert_eq!(CompiledExpr::Variable(1).evaluate(&ctx), Ok(None));
        assert!(CompiledExpr::Variable(2).evaluate(&ctx).is_err());
    }

    #[test]
    fn test_is_null_on_field_uses_cursor() {
        let row: Vec<Option<Value>> = vec![None, Some(Value::Bigint(1))];
        let ctx = EvalContext::row(&row);
        assert_eq!(
            evaluate_is_null(&CompiledExpr::Field(0), &ctx),
            Ok(Some(Value::Boolean(true)))
        );
        assert_eq!(
            evaluate_is_null(&CompiledExpr::Field(1), &ctx),
            Ok(Some(Value::Boolean(false)))
        );
    }

    #[test]
    fn test_dereference() {
        let row = Some(Value::row(vec![Some(Value::Bigint(1)), None]));
        let ctx = EvalContext::empty();
        let base = CompiledExpr::Constant(row);
        assert_eq!(
            evaluate_dereference(&base, 0, &ctx),
            Ok(Some(Value::Bigint(1)))
        );
        assert_eq!(evaluate_dereference(&base, 1, &ctx), Ok(None));
        assert_eq!(
            evaluate_dereference(&CompiledExpr::Constant(None), 0, &ctx),
            Ok(None)
        );
        assert_eq!(
            evaluate_dereference(&CompiledExpr::Constant(Some(Value::Bigint(1))), 0, &ctx)
                .unwrap_err()
                .code,
            ErrorCode::TypeMismatch
        );
    }

    #[test]
    fn test_row_constructor_is_never_null() {
        let expr = CompiledExpr::RowConstructor(vec![
            CompiledExpr::Constant(None),
            CompiledExpr::Constant(None),
        ]);
        assert_eq!(
            expr.evaluate(&EvalContext::empty()),
            Ok(Some(Value::row(vec![None, None])))
        );
    }

    #[test]
    fn test_expect_boolean() {
        assert_eq!(expect_boolean(None, "x"), Ok(None));
        assert_eq!(expect_boolean(Some(Value::Boolean(false)), "x"), Ok(Some(false)));
        let err = expect_boolean(Some(Value::Bigint(1)), "AND operand").unwrap_err();
        assert_eq!(err.message, "AND operand must be boolean, got bigint");
    }
}
