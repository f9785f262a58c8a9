use crate::block::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A non-null SQL value.
///
/// Nullness is never encoded inside a `Value`; evaluators return
/// `Option<Value>` where `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Bigint(i64),
    Double(f64),
    Varchar(Arc<str>),
    Array(Arc<[Option<Value>]>),
    Row(Arc<[Option<Value>]>),
}

impl Value {
    pub fn varchar(s: impl AsRef<str>) -> Self {
        Value::Varchar(Arc::from(s.as_ref()))
    }

    pub fn array(elements: Vec<Option<Value>>) -> Self {
        Value::Array(Arc::from(elements))
    }

    pub fn row(fields: Vec<Option<Value>>) -> Self {
        Value::Row(Arc::from(fields))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            Value::Bigint(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_elements(&self) -> Option<&[Option<Value>]> {
        match self {
            Value::Array(elements) => Some(&**elements),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&[Option<Value>]> {
        match self {
            Value::Row(fields) => Some(&**fields),
            _ => None,
        }
    }

    /// Check if this value can be stored in a column of `data_type`
    pub fn is_compatible_with(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean) => true,
            (Value::Bigint(_), DataType::Bigint) => true,
            (Value::Double(_), DataType::Double) => true,
            (Value::Varchar(_), DataType::Varchar) => true,
            (Value::Array(elements), DataType::Array(element_type)) => elements
                .iter()
                .flatten()
                .all(|e| e.is_compatible_with(element_type)),
            (Value::Row(fields), DataType::Row(field_types)) => {
                fields.len() == field_types.len()
                    && fields
                        .iter()
                        .zip(field_types)
                        .all(|(f, t)| f.as_ref().map_or(true, |v| v.is_compatible_with(t)))
            }
            _ => false,
        }
    }

    /// Stand-in passed for a null argument under the null-flags convention.
    /// Callees must consult the flag and never interpret this value.
    pub fn placeholder(data_type: &DataType) -> Value {
        match data_type {
            DataType::Boolean | DataType::Unknown | DataType::Function { .. } => {
                Value::Boolean(false)
            }
            DataType::Bigint => Value::Bigint(0),
            DataType::Double => Value::Double(0.0),
            DataType::Varchar => Value::varchar(""),
            DataType::Array(_) => Value::array(Vec::new()),
            DataType::Row(fields) => Value::row(vec![None; fields.len()]),
        }
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Bigint(_) => "bigint",
            Value::Double(_) => "double",
            Value::Varchar(_) => "varchar",
            Value::Array(_) => "array",
            Value::Row(_) => "row",
        }
    }
}

fn write_nullable_list(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[Option<Value>],
    close: &str,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match item {
            Some(v) => write!(f, "{}", v)?,
            None => write!(f, "NULL")?,
        }
    }
    write!(f, "{}", close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Bigint(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{:?}", n),
            Value::Varchar(s) => write!(f, "'{}'", s),
            Value::Array(elements) => write_nullable_list(f, "[", elements, "]"),
            Value::Row(fields) => write_nullable_list(f, "{", fields, "}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Bigint(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::varchar(s)
    }
}
