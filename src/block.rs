//! Value and null model shared by every evaluator.
//!
//! This module provides:
//! - SQL types and runtime values
//! - The row read contract ([`RowCursor`]) and output contract ([`OutputSink`])
//! - Columnar batches ([`Block`], [`Page`]) and encoded rows ([`EncodedRow`])

pub mod codec;
pub mod cursor;
pub mod page;
pub mod types;
pub mod value;

pub use codec::{encode_row, EncodedRow};
pub use cursor::{OutputSink, RowCursor};
pub use page::{Block, BlockBuilder, Page, PageCursor};
pub use types::DataType;
pub use value::Value;
