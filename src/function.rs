//! Scalar function resolution.
//!
//! Calls in an expression tree carry a concrete [`Signature`]. The compiler
//! asks a [`FunctionResolver`] to turn each one into a [`FunctionBinding`]:
//! the implementation plus the facts the compiler needs about it (its null
//! convention, whether it can fail, whether it is deterministic).

pub mod binding;
pub mod builtin;
pub mod operator;
pub mod registry;
pub mod signature;

pub use binding::{FunctionBinding, NullConvention, ScalarImplementation};
pub use operator::OperatorType;
pub use registry::{FunctionDefinition, FunctionRegistry, FunctionResolver};
pub use signature::Signature;
