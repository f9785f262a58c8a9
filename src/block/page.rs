//! Columnar batches.
//!
//! A [`Page`] is a set of equally long [`Block`]s, one per input column. Rows
//! are addressed by position and read through a [`PageCursor`].

use crate::block::{DataType, OutputSink, RowCursor, Value};
use crate::error::{EvalResult, EvaluationError};
use anyhow::{bail, Result};

/// A single typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    data_type: DataType,
    values: Vec<Option<Value>>,
}

impl Block {
    /// Create a block, validating every non-null value against `data_type`
    pub fn new(data_type: DataType, values: Vec<Option<Value>>) -> Result<Self> {
        for (position, value) in values.iter().enumerate() {
            if let Some(value) = value {
                if !value.is_compatible_with(&data_type) {
                    bail!(
                        "Value {} at position {} is not compatible with type {}",
                        value,
                        position,
                        data_type
                    );
                }
            }
        }
        Ok(Self { data_type, values })
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn position_count(&self) -> usize {
        self.values.len()
    }

    pub fn is_null(&self, position: usize) -> bool {
        matches!(self.values.get(position), Some(None))
    }

    /// Borrow the value at `position`, `None` if null or out of range
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position).and_then(|v| v.as_ref())
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }
}

/// Builds a [`Block`] one position at a time
#[derive(Debug)]
pub struct BlockBuilder {
    data_type: DataType,
    values: Vec<Option<Value>>,
}

impl BlockBuilder {
    pub fn new(data_type: DataType) -> Self {
        Self::with_capacity(data_type, 0)
    }

    pub fn with_capacity(data_type: DataType, capacity: usize) -> Self {
        Self {
            data_type,
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn position_count(&self) -> usize {
        self.values.len()
    }

    pub fn build(self) -> Block {
        // append() already validated every value
        Block {
            data_type: self.data_type,
            values: self.values,
        }
    }
}

impl OutputSink for BlockBuilder {
    fn append(&mut self, value: Value) -> EvalResult<()> {
        if !value.is_compatible_with(&self.data_type) {
            return Err(EvaluationError::type_mismatch(format!(
                "cannot write {} value {} to {} block",
                value.type_name(),
                value,
                self.data_type
            )));
        }
        self.values.push(Some(value));
        Ok(())
    }

    fn append_null(&mut self) {
        self.values.push(None);
    }
}

/// A batch of rows stored column by column
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    blocks: Vec<Block>,
    position_count: usize,
}

impl Page {
    pub fn new(blocks: Vec<Block>) -> Result<Self> {
        let position_count = blocks.first().map(|b| b.position_count()).unwrap_or(0);
        for (channel, block) in blocks.iter().enumerate() {
            if block.position_count() != position_count {
                bail!(
                    "Block {} has {} positions, expected {}",
                    channel,
                    block.position_count(),
                    position_count
                );
            }
        }
        Ok(Self {
            blocks,
            position_count,
        })
    }

    /// Assemble a page from blocks already known to share `position_count`
    pub(crate) fn from_parts(blocks: Vec<Block>, position_count: usize) -> Self {
        debug_assert!(blocks.iter().all(|b| b.position_count() == position_count));
        Self {
            blocks,
            position_count,
        }
    }

    /// A page with rows but no columns, e.g. the input of a constant projection
    pub fn with_position_count(position_count: usize) -> Self {
        Self {
            blocks: Vec::new(),
            position_count,
        }
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn channel_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, channel: usize) -> Option<&Block> {
        self.blocks.get(channel)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Cursor positioned on row `position`
    pub fn cursor(&self, position: usize) -> PageCursor<'_> {
        PageCursor {
            page: self,
            position,
        }
    }
}

/// A [`RowCursor`] over one position of a [`Page`]
#[derive(Debug, Clone, Copy)]
pub struct PageCursor<'a> {
    page: &'a Page,
    position: usize,
}

impl<'a> PageCursor<'a> {
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move to another row of the same page
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    fn block(&self, field: usize) -> EvalResult<&'a Block> {
        let page = self.page;
        page.blocks.get(field).ok_or_else(|| {
            EvaluationError::internal(format!(
                "field {} out of bounds for page with {} channels",
                field,
                page.blocks.len()
            ))
        })
    }

    fn entry(&self, field: usize) -> EvalResult<&'a Option<Value>> {
        let block = self.block(field)?;
        block.values.get(self.position).ok_or_else(|| {
            EvaluationError::internal(format!(
                "position {} out of bounds for field {} with {} positions",
                self.position,
                field,
                block.position_count()
            ))
        })
    }
}

impl RowCursor for PageCursor<'_> {
    fn field_count(&self) -> usize {
        self.page.channel_count()
    }

    fn read(&self, field: usize) -> EvalResult<Option<Value>> {
        self.entry(field).cloned()
    }

    fn is_null(&self, field: usize) -> EvalResult<bool> {
        self.entry(field).map(Option::is_none)
    }
}
