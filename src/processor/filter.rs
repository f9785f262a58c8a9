//! Page filter.
//!
//! Evaluates a boolean predicate at every position of a page and keeps the
//! positions where it is true. NULL is treated as false, as in a WHERE clause.

use crate::block::{Page, Value};
use crate::error::{EvalResult, EvaluationError};
use crate::eval::CompiledExpression;

#[derive(Debug, Clone)]
pub struct PageFilter {
    predicate: CompiledExpression,
}

impl PageFilter {
    pub fn new(predicate: CompiledExpression) -> Self {
        Self { predicate }
    }

    /// Positions of `page` that satisfy the predicate, in ascending order
    pub fn filter(&self, page: &Page) -> EvalResult<Vec<usize>> {
        let mut selected = Vec::new();
        let mut cursor = page.cursor(0);
        for position in 0..page.position_count() {
            cursor.set_position(position);
            match self.predicate.evaluate(&cursor)? {
                Some(Value::Boolean(true)) => selected.push(position),
                Some(Value::Boolean(false)) | None => {}
                Some(other) => {
                    return Err(EvaluationError::type_mismatch(format!(
                        "filter predicate evaluated to {}, expected boolean",
                        other.type_name()
                    )))
                }
            }
        }
        Ok(selected)
    }
}
