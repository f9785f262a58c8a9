//! Lowered form of an expression tree.
//!
//! Every special form maps to exactly one variant, so the evaluator is a
//! single exhaustive match. Function-typed expressions only exist as call
//! arguments ([`CompiledArgument::Function`]).

use crate::block::Value;
use crate::function::FunctionBinding;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum CompiledExpr {
    Constant(Option<Value>),
    /// Column of the input row
    Field(usize),
    /// Slot in the current lambda frame
    Variable(usize),
    Call(Box<CompiledCall>),
    And {
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    Or {
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    IsNull(Box<CompiledExpr>),
    Coalesce(Vec<CompiledExpr>),
    In {
        target: Box<CompiledExpr>,
        candidates: Vec<CompiledComparison>,
    },
    Switch(Box<CompiledSwitch>),
    If {
        condition: Box<CompiledExpr>,
        then: Box<CompiledExpr>,
        otherwise: Option<Box<CompiledExpr>>,
    },
    NullIf {
        first: Box<CompiledExpr>,
        second: Box<CompiledExpr>,
        equal: Arc<FunctionBinding>,
    },
    Dereference {
        base: Box<CompiledExpr>,
        index: usize,
    },
    RowConstructor(Vec<CompiledExpr>),
}

impl CompiledExpr {
    pub fn as_constant(&self) -> Option<&Option<Value>> {
        match self {
            CompiledExpr::Constant(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledCall {
    pub binding: Arc<FunctionBinding>,
    pub arguments: Vec<CompiledArgument>,
    /// Stand-ins for null value arguments under the null-flags convention,
    /// one per value argument
    pub placeholders: Vec<Value>,
}

#[derive(Debug, Clone)]
pub enum CompiledArgument {
    Value(CompiledExpr),
    Function(CompiledFunction),
}

/// A lambda together with the expressions whose values it captures
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub captured: Vec<CompiledExpr>,
    pub lambda: Arc<CompiledLambda>,
}

#[derive(Debug)]
pub struct CompiledLambda {
    /// Total frame size: captured values followed by call arguments
    pub parameter_count: usize,
    pub body: CompiledExpr,
}

/// Candidate of an `IN` list or operand of a `WHEN` arm, paired with the
/// equality used to test it
#[derive(Debug, Clone)]
pub struct CompiledComparison {
    pub value: CompiledExpr,
    pub equal: Arc<FunctionBinding>,
}

#[derive(Debug, Clone)]
pub struct CompiledSwitch {
    /// `None` for a searched CASE, whose arms are conditions
    pub operand: Option<CompiledExpr>,
    pub arms: Vec<CompiledWhen>,
    pub otherwise: Option<CompiledExpr>,
}

#[derive(Debug, Clone)]
pub enum CompiledWhen {
    /// `CASE WHEN condition THEN result`
    Condition {
        condition: CompiledExpr,
        result: CompiledExpr,
    },
    /// `CASE operand WHEN value THEN result`
    Match {
        value: CompiledComparison,
        result: CompiledExpr,
    },
}
