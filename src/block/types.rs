//! SQL data types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type attached to every expression node and column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Bigint,
    Double,
    Varchar,
    Array(Box<DataType>),
    Row(Vec<DataType>),
    Function {
        arguments: Vec<DataType>,
        return_type: Box<DataType>,
    },
    /// Type of an untyped NULL literal
    Unknown,
}

impl DataType {
    pub fn array(element: DataType) -> Self {
        DataType::Array(Box::new(element))
    }

    pub fn row(fields: Vec<DataType>) -> Self {
        DataType::Row(fields)
    }

    pub fn function(arguments: Vec<DataType>, return_type: DataType) -> Self {
        DataType::Function {
            arguments,
            return_type: Box::new(return_type),
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, DataType::Function { .. })
    }

    /// Types that can be compared with `=` and friends
    pub fn is_comparable(&self) -> bool {
        match self {
            DataType::Boolean
            | DataType::Bigint
            | DataType::Double
            | DataType::Varchar
            | DataType::Unknown => true,
            DataType::Array(element) => element.is_comparable(),
            DataType::Row(fields) => fields.iter().all(|f| f.is_comparable()),
            DataType::Function { .. } => false,
        }
    }

    /// Whether a value of `other` may flow where `self` is declared.
    /// `Unknown` (a bare NULL) fits anywhere.
    pub fn accepts(&self, other: &DataType) -> bool {
        if self == other || *other == DataType::Unknown {
            return true;
        }
        match (self, other) {
            (DataType::Array(a), DataType::Array(b)) => a.accepts(b),
            (DataType::Row(a), DataType::Row(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.accepts(y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "boolean"),
            DataType::Bigint => write!(f, "bigint"),
            DataType::Double => write!(f, "double"),
            DataType::Varchar => write!(f, "varchar"),
            DataType::Array(element) => write!(f, "array({})", element),
            DataType::Row(fields) => {
                write!(f, "row(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
            DataType::Function {
                arguments,
                return_type,
            } => {
                write!(f, "function(")?;
                for argument in arguments {
                    write!(f, "{},", argument)?;
                }
                write!(f, "{})", return_type)
            }
            DataType::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(DataType::Bigint.to_string(), "bigint");
        assert_eq!(
            DataType::array(DataType::Varchar).to_string(),
            "array(varchar)"
        );
        assert_eq!(
            DataType::row(vec![DataType::Bigint, DataType::Boolean]).to_string(),
            "row(bigint,boolean)"
        );
        assert_eq!(
            DataType::function(vec![DataType::Bigint], DataType::Double).to_string(),
            "function(bigint,double)"
        );
    }

    #[test]
    fn test_accepts() {
        assert!(DataType::Bigint.accepts(&DataType::Bigint));
        assert!(DataType::Bigint.accepts(&DataType::Unknown));
        assert!(!DataType::Bigint.accepts(&DataType::Double));
        assert!(DataType::array(DataType::Bigint).accepts(&DataType::array(DataType::Unknown)));
        assert!(!DataType::row(vec![DataType::Bigint])
            .accepts(&DataType::row(vec![DataType::Bigint, DataType::Bigint])));
    }

    #[test]
    fn test_comparable() {
        assert!(DataType::row(vec![DataType::Bigint, DataType::Varchar]).is_comparable());
        assert!(!DataType::function(vec![], DataType::Bigint).is_comparable());
        assert!(!DataType::array(DataType::function(vec![], DataType::Bigint)).is_comparable());
    }
}
