//! Row expression IR consumed by the compiler.
//!
//! This module provides:
//! - The typed expression tree produced by the planner
//! - Builders for constructing trees by hand
//! - Structural validation of special-form shapes and types

pub mod expr;
pub mod validate;

pub use expr::{
    Call, Constant, FieldReference, Form, LambdaDefinition, LambdaParameter, RowExpression,
    SpecialForm, VariableReference,
};
pub use validate::{validate_expression, ShapeChecker};
