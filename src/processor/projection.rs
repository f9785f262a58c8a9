//! Page projection.

use crate::block::{Block, BlockBuilder, DataType, Page};
use crate::error::EvalResult;
use crate::eval::CompiledExpression;

/// Evaluates one expression at selected positions of a page into a block
#[derive(Debug, Clone)]
pub struct PageProjection {
    expression: CompiledExpression,
}

impl PageProjection {
    pub fn new(expression: CompiledExpression) -> Self {
        Self { expression }
    }

    pub fn output_type(&self) -> &DataType {
        self.expression.return_type()
    }

    /// Build a block with one entry per position in `positions`
    pub fn project(&self, page: &Page, positions: &[usize]) -> EvalResult<Block> {
        let mut builder = BlockBuilder::with_capacity(self.output_type().clone(), positions.len());
        let mut cursor = page.cursor(0);
        for &position in positions {
            cursor.set_position(position);
            self.expression.evaluate_into(&cursor, &mut builder)?;
        }
        Ok(builder.build())
    }
}
