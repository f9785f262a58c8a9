use crate::block::Value;
use crate::compiler::{CompiledFunction, CompiledLambda};
use crate::error::{EvalResult, EvaluationError};
use crate::eval::EvalContext;
use std::fmt;
use std::sync::Arc;

/// A lambda with its captured values fixed, handed to higher-order
/// functions. The body runs only when [`BoundLambda::invoke`] is called.
#[derive(Clone)]
pub struct BoundLambda {
    lambda: Arc<CompiledLambda>,
    captured: Vec<Option<Value>>,
}

impl BoundLambda {
    /// Number of arguments `invoke` expects
    pub fn arity(&self) -> usize {
        self.lambda.parameter_count - self.captured.len()
    }

    /// Evaluate the body with captured values followed by `arguments`
    pub fn invoke(&self, arguments: &[Option<Value>]) -> EvalResult<Option<Value>> {
        if arguments.len() != self.arity() {
            return Err(EvaluationError::internal(format!(
                "lambda expects {} arguments, got {}",
                self.arity(),
                arguments.len()
            )));
        }
        let mut frame = Vec::with_capacity(self.lambda.parameter_count);
        frame.extend(self.captured.iter().cloned());
        frame.extend(arguments.iter().cloned());
        self.lambda.body.evaluate(&EvalContext::frame(&frame))
    }
}

impl fmt::Debug for BoundLambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundLambda")
            .field("arity", &self.arity())
            .field("captured", &self.captured)
            .finish()
    }
}

impl CompiledFunction {
    /// Evaluate the captured expressions in the caller's context
    pub(crate) fn bind(&self, ctx: &EvalContext<'_>) -> EvalResult<BoundLambda> {
        let captured = self
            .captured
            .iter()
            .map(|expr| expr.evaluate(ctx))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(BoundLambda {
            lambda: Arc::clone(&self.lambda),
            captured,
        })
    }
}
