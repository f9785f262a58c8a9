use crate::block::DataType;
use crate::function::OperatorType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concrete signature of a resolved function, attached to every call node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub argument_types: Vec<DataType>,
    pub return_type: DataType,
}

impl Signature {
    pub fn new(
        name: impl Into<String>,
        argument_types: Vec<DataType>,
        return_type: DataType,
    ) -> Self {
        Self {
            name: name.into(),
            argument_types,
            return_type,
        }
    }

    pub fn operator(
        operator: OperatorType,
        argument_types: Vec<DataType>,
        return_type: DataType,
    ) -> Self {
        Self::new(operator.function_name(), argument_types, return_type)
    }

    pub fn arity(&self) -> usize {
        self.argument_types.len()
    }

    /// Operator this signature refers to, if it is one
    pub fn operator_type(&self) -> Option<OperatorType> {
        OperatorType::from_function_name(&self.name)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, argument) in self.argument_types.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", argument)?;
        }
        write!(f, "):{}", self.return_type)
    }
}
