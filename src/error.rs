//! Error types for expression compilation and evaluation.
//!
//! Two classes of failure exist:
//! - [`CompileError`]: the expression tree handed to the compiler is malformed.
//!   This always points at a bug in whatever produced the tree and aborts
//!   compilation.
//! - [`EvaluationError`]: a data-dependent failure raised while evaluating a
//!   row (overflow, bad cast, division by zero, ...). It carries a stable
//!   [`ErrorCode`] so callers can classify it.

use crate::block::DataType;
use std::fmt;
use thiserror::Error;

/// Stable classification of evaluation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    TypeMismatch,
    NumericValueOutOfRange,
    InvalidFormat,
    DivisionByZero,
    /// Raised on purpose by a function body, e.g. `fail('...')`
    FunctionError,
    /// Broken runtime invariant such as reading past the end of a row
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::NumericValueOutOfRange => "NUMERIC_VALUE_OUT_OF_RANGE",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::DivisionByZero => "DIVISION_BY_ZERO",
            ErrorCode::FunctionError => "FUNCTION_ERROR",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure raised while evaluating a row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct EvaluationError {
    pub code: ErrorCode,
    pub message: String,
}

impl EvaluationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeMismatch, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NumericValueOutOfRange, message)
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFormat, message)
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorCode::DivisionByZero, "Division by zero")
    }

    pub fn function_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FunctionError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Prefix the message with the sub-expression that raised it
    pub fn with_context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }
}

/// Result type for row evaluation
pub type EvalResult<T> = Result<T, EvaluationError>;

/// Structural problems found while compiling an expression tree
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("{form} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        form: &'static str,
        expected: String,
        actual: usize,
    },

    #[error("Malformed {form}: {reason}")]
    InvalidShape { form: &'static str, reason: String },

    #[error("Type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: DataType,
        actual: DataType,
        context: String,
    },

    #[error("Unknown function: {signature}")]
    UnknownFunction { signature: String },

    #[error("Unresolved lambda variable: {name}")]
    UnresolvedVariable { name: String },

    #[error("Field reference #{index} inside a lambda body")]
    FieldReferenceInLambda { index: usize },

    #[error("Function-typed expression used as a value: {expression}")]
    FunctionInValuePosition { expression: String },

    #[error("Expression exceeds maximum depth of {max_depth}")]
    ExpressionTooDeep { max_depth: usize },

    #[error("Invalid compiler configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
