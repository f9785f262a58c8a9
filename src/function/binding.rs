use crate::block::Value;
use crate::error::EvalResult;
use crate::eval::BoundLambda;
use crate::function::Signature;
use std::fmt;
use std::sync::Arc;

/// How a function receives null arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullConvention {
    /// Any null argument makes the result null without calling the function
    ReturnNullOnNull,
    /// Nulls arrive as a type placeholder plus a per-argument flag
    NullFlags,
    /// Arguments arrive as `Option<Value>`
    BoxedNullable,
}

pub type ReturnNullOnNullFn =
    dyn Fn(&[Value], &[BoundLambda]) -> EvalResult<Option<Value>> + Send + Sync;
pub type NullFlagsFn =
    dyn Fn(&[Value], &[bool], &[BoundLambda]) -> EvalResult<Option<Value>> + Send + Sync;
pub type BoxedNullableFn =
    dyn Fn(&[Option<Value>], &[BoundLambda]) -> EvalResult<Option<Value>> + Send + Sync;

/// Function body, tagged with the null convention it expects.
///
/// Value arguments and function-typed arguments are passed separately, each
/// in call order.
#[derive(Clone)]
pub enum ScalarImplementation {
    ReturnNullOnNull(Arc<ReturnNullOnNullFn>),
    NullFlags(Arc<NullFlagsFn>),
    BoxedNullable(Arc<BoxedNullableFn>),
}

impl ScalarImplementation {
    pub fn return_null_on_null<F>(f: F) -> Self
    where
        F: Fn(&[Value], &[BoundLambda]) -> EvalResult<Option<Value>> + Send + Sync + 'static,
    {
        ScalarImplementation::ReturnNullOnNull(Arc::new(f))
    }

    pub fn null_flags<F>(f: F) -> Self
    where
        F: Fn(&[Value], &[bool], &[BoundLambda]) -> EvalResult<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        ScalarImplementation::NullFlags(Arc::new(f))
    }

    pub fn boxed_nullable<F>(f: F) -> Self
    where
        F: Fn(&[Option<Value>], &[BoundLambda]) -> EvalResult<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        ScalarImplementation::BoxedNullable(Arc::new(f))
    }

    pub fn convention(&self) -> NullConvention {
        match self {
            ScalarImplementation::ReturnNullOnNull(_) => NullConvention::ReturnNullOnNull,
            ScalarImplementation::NullFlags(_) => NullConvention::NullFlags,
            ScalarImplementation::BoxedNullable(_) => NullConvention::BoxedNullable,
        }
    }
}

impl fmt::Debug for ScalarImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarImplementation({:?})", self.convention())
    }
}

/// A resolved function, ready to be called by compiled code
#[derive(Debug, Clone)]
pub struct FunctionBinding {
    pub signature: Signature,
    pub implementation: ScalarImplementation,
    /// May raise an evaluation error for some inputs
    pub can_fail: bool,
    /// Same inputs always produce the same output
    pub deterministic: bool,
}

impl FunctionBinding {
    pub fn new(signature: Signature, implementation: ScalarImplementation) -> Self {
        Self {
            signature,
            implementation,
            can_fail: false,
            deterministic: true,
        }
    }

    pub fn with_can_fail(mut self, can_fail: bool) -> Self {
        self.can_fail = can_fail;
        self
    }

    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub fn null_convention(&self) -> NullConvention {
        self.implementation.convention()
    }

    /// Safe to evaluate once at compile time when all arguments are constant
    pub fn is_foldable(&self) -> bool {
        self.deterministic && !self.can_fail
    }
}
