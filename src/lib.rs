//! Row expression compiler and evaluator.
//!
//! Typed expression trees ([`RowExpression`]) are validated and lowered by an
//! [`ExpressionCompiler`] into [`CompiledExpression`]s that evaluate one row at
//! a time with SQL three-valued logic, or into page processors that run a
//! filter and projections over columnar [`Page`]s.

pub mod block;
pub mod compiler;
pub mod config;
pub mod error;
pub mod eval;
pub mod expression;
pub mod function;
pub mod processor;

pub use block::{
    encode_row, Block, BlockBuilder, DataType, EncodedRow, OutputSink, Page, PageCursor,
    RowCursor, Value,
};
pub use compiler::ExpressionCompiler;
pub use config::CompilerConfig;
pub use error::{CompileError, CompileResult, ErrorCode, EvalResult, EvaluationError};
pub use eval::{BoundLambda, CompiledExpression};
pub use expression::{Form, LambdaParameter, RowExpression};
pub use function::{
    FunctionBinding, FunctionDefinition, FunctionRegistry, FunctionResolver, NullConvention,
    OperatorType, ScalarImplementation, Signature,
};
pub use processor::{PageFilter, PageProcessor, PageProjection};
