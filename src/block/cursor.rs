//! Read and write contracts between evaluators and the batches they run over.

use crate::block::Value;
use crate::error::EvalResult;

/// Read access to the fields of the current input row.
///
/// Reads are pure. The returned value is owned by the caller and does not
/// borrow from the row, so the backing batch may be recycled once evaluation
/// of the row finishes.
pub trait RowCursor {
    /// Number of fields in the row
    fn field_count(&self) -> usize;

    /// Read a field as a `(value, isNull)` pair, `None` meaning NULL
    fn read(&self, field: usize) -> EvalResult<Option<Value>>;

    /// Read only the nullness of a field
    fn is_null(&self, field: usize) -> EvalResult<bool> {
        Ok(self.read(field)?.is_none())
    }
}

/// Append-only destination for evaluation results
pub trait OutputSink {
    /// Append a non-null value; fails if the value does not fit the sink's type
    fn append(&mut self, value: Value) -> EvalResult<()>;

    /// Append an explicit NULL marker
    fn append_null(&mut self);

    /// Append a `(value, isNull)` pair
    fn append_nullable(&mut self, value: Option<Value>) -> EvalResult<()> {
        match value {
            Some(value) => self.append(value),
            None => {
                self.append_null();
                Ok(())
            }
        }
    }
}

/// A plain vector of values is the simplest row
impl RowCursor for Vec<Option<Value>> {
    fn field_count(&self) -> usize {
        self.len()
    }

    fn read(&self, field: usize) -> EvalResult<Option<Value>> {
        self.get(field).cloned().ok_or_else(|| {
            crate::error::EvaluationError::internal(format!(
                "field {} out of bounds for row with {} fields",
                field,
                self.len()
            ))
        })
    }
}

/// Collects results into memory, mainly for tests and ad-hoc evaluation
impl OutputSink for Vec<Option<Value>> {
    fn append(&mut self, value: Value) -> EvalResult<()> {
        self.push(Some(value));
        Ok(())
    }

    fn append_null(&mut self) {
        self.push(None);
    }
}
