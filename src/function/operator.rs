//! Operators resolved through the function registry under mangled names.

use serde::{Deserialize, Serialize};

/// Operators the compiler and planner refer to by kind rather than by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorType {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Negation,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    IsDistinctFrom,

    Cast,
}

impl OperatorType {
    /// Name under which the operator is registered
    pub fn function_name(&self) -> &'static str {
        match self {
            OperatorType::Add => "$operator$add",
            OperatorType::Subtract => "$operator$subtract",
            OperatorType::Multiply => "$operator$multiply",
            OperatorType::Divide => "$operator$divide",
            OperatorType::Modulus => "$operator$modulus",
            OperatorType::Negation => "$operator$negation",
            OperatorType::Equal => "$operator$equal",
            OperatorType::NotEqual => "$operator$not_equal",
            OperatorType::LessThan => "$operator$less_than",
            OperatorType::LessThanOrEqual => "$operator$less_than_or_equal",
            OperatorType::GreaterThan => "$operator$greater_than",
            OperatorType::GreaterThanOrEqual => "$operator$greater_than_or_equal",
            OperatorType::IsDistinctFrom => "$operator$is_distinct_from",
            OperatorType::Cast => "$operator$cast",
        }
    }

    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorType::Add => "+",
            OperatorType::Subtract => "-",
            OperatorType::Multiply => "*",
            OperatorType::Divide => "/",
            OperatorType::Modulus => "%",
            OperatorType::Negation => "-",
            OperatorType::Equal => "=",
            OperatorType::NotEqual => "<>",
            OperatorType::LessThan => "<",
            OperatorType::LessThanOrEqual => "<=",
            OperatorType::GreaterThan => ">",
            OperatorType::GreaterThanOrEqual => ">=",
            OperatorType::IsDistinctFrom => "IS DISTINCT FROM",
            OperatorType::Cast => "CAST",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            OperatorType::Equal
                | OperatorType::NotEqual
                | OperatorType::LessThan
                | OperatorType::LessThanOrEqual
                | OperatorType::GreaterThan
                | OperatorType::GreaterThanOrEqual
                | OperatorType::IsDistinctFrom
        )
    }

    /// Reverse of [`OperatorType::function_name`]
    pub fn from_function_name(name: &str) -> Option<Self> {
        const ALL: [OperatorType; 14] = [
            OperatorType::Add,
            OperatorType::Subtract,
            OperatorType::Multiply,
            OperatorType::Divide,
            OperatorType::Modulus,
            OperatorType::Negation,
            OperatorType::Equal,
            OperatorType::NotEqual,
            OperatorType::LessThan,
            OperatorType::LessThanOrEqual,
            OperatorType::GreaterThan,
            OperatorType::GreaterThanOrEqual,
            OperatorType::IsDistinctFrom,
            OperatorType::Cast,
        ];
        ALL.into_iter().find(|op| op.function_name() == name)
    }
}
