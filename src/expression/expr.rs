//! Expression tree definitions.

use crate::block::{DataType, Value};
use crate::function::{OperatorType, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal value; `value == None` is a typed NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: Option<Value>,
    pub data_type: DataType,
}

/// Reads a column of the current input row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldReference {
    /// Column index in the row (0-based)
    pub field: usize,
    pub data_type: DataType,
}

/// Invocation of a resolved function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub signature: Signature,
    pub arguments: Vec<RowExpression>,
}

/// Control-flow-bearing constructs with custom evaluation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Form {
    And,
    Or,
    In,
    /// `SWITCH(operand, WHEN(..)..., else?)`
    Switch,
    /// `WHEN(operand, result)`, only valid as an arm of `Switch`
    When,
    /// `IF(condition, then, else?)`
    If,
    IsNull,
    Coalesce,
    NullIf,
    /// `DEREFERENCE(row, field_index)`
    Dereference,
    RowConstructor,
    /// `BIND(captured..., lambda)`
    Bind,
}

impl Form {
    pub fn as_str(&self) -> &'static str {
        match self {
            Form::And => "AND",
            Form::Or => "OR",
            Form::In => "IN",
            Form::Switch => "SWITCH",
            Form::When => "WHEN",
            Form::If => "IF",
            Form::IsNull => "IS_NULL",
            Form::Coalesce => "COALESCE",
            Form::NullIf => "NULL_IF",
            Form::Dereference => "DEREFERENCE",
            Form::RowConstructor => "ROW_CONSTRUCTOR",
            Form::Bind => "BIND",
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialForm {
    pub form: Form,
    pub arguments: Vec<RowExpression>,
    pub return_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LambdaParameter {
    pub name: String,
    pub data_type: DataType,
}

impl LambdaParameter {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Deferred expression over named parameters.
///
/// A lambda sees only its own parameters. Outer values reach the body by
/// being captured through `BIND`, which supplies the leading parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaDefinition {
    pub parameters: Vec<LambdaParameter>,
    pub body: Box<RowExpression>,
}

/// Reference to a lambda parameter by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableReference {
    pub name: String,
    pub data_type: DataType,
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowExpression {
    Constant(Constant),
    FieldReference(FieldReference),
    Call(Call),
    SpecialForm(SpecialForm),
    Lambda(LambdaDefinition),
    Variable(VariableReference),
}

impl RowExpression {
    /// Create a constant of an explicit type
    pub fn constant(value: Option<Value>, data_type: DataType) -> Self {
        RowExpression::Constant(Constant { value, data_type })
    }

    pub fn null(data_type: DataType) -> Self {
        Self::constant(None, data_type)
    }

    pub fn boolean(b: bool) -> Self {
        Self::constant(Some(Value::Boolean(b)), DataType::Boolean)
    }

    pub fn bigint(n: i64) -> Self {
        Self::constant(Some(Value::Bigint(n)), DataType::Bigint)
    }

    pub fn double(n: f64) -> Self {
        Self::constant(Some(Value::Double(n)), DataType::Double)
    }

    pub fn varchar(s: impl AsRef<str>) -> Self {
        Self::constant(Some(Value::varchar(s)), DataType::Varchar)
    }

    /// Create a field reference expression
    pub fn field(field: usize, data_type: DataType) -> Self {
        RowExpression::FieldReference(FieldReference { field, data_type })
    }

    /// Call a function; the signature's argument types are taken from the
    /// arguments themselves
    pub fn call(
        name: impl Into<String>,
        arguments: Vec<RowExpression>,
        return_type: DataType,
    ) -> Self {
        let argument_types = arguments.iter().map(|a| a.data_type()).collect();
        RowExpression::Call(Call {
            signature: Signature::new(name, argument_types, return_type),
            arguments,
        })
    }

    pub fn operator(
        operator: OperatorType,
        arguments: Vec<RowExpression>,
        return_type: DataType,
    ) -> Self {
        Self::call(operator.function_name(), arguments, return_type)
    }

    /// Comparison operator returning boolean
    pub fn compare(operator: OperatorType, left: RowExpression, right: RowExpression) -> Self {
        Self::operator(operator, vec![left, right], DataType::Boolean)
    }

    /// Arithmetic operator whose result has the left operand's type
    pub fn arithmetic(operator: OperatorType, left: RowExpression, right: RowExpression) -> Self {
        let return_type = left.data_type();
        Self::operator(operator, vec![left, right], return_type)
    }

    pub fn cast(operand: RowExpression, target: DataType) -> Self {
        Self::operator(OperatorType::Cast, vec![operand], target)
    }

    pub fn special_form(form: Form, arguments: Vec<RowExpression>, return_type: DataType) -> Self {
        RowExpression::SpecialForm(SpecialForm {
            form,
            arguments,
            return_type,
        })
    }

    pub fn and(left: RowExpression, right: RowExpression) -> Self {
        Self::special_form(Form::And, vec![left, right], DataType::Boolean)
    }

    pub fn or(left: RowExpression, right: RowExpression) -> Self {
        Self::special_form(Form::Or, vec![left, right], DataType::Boolean)
    }

    pub fn is_null(operand: RowExpression) -> Self {
        Self::special_form(Form::IsNull, vec![operand], DataType::Boolean)
    }

    /// The result type is the first argument type that is not `unknown`
    pub fn coalesce(arguments: Vec<RowExpression>) -> Self {
        let return_type = common_type(&arguments);
        Self::special_form(Form::Coalesce, arguments, return_type)
    }

    pub fn in_list(target: RowExpression, candidates: Vec<RowExpression>) -> Self {
        let mut arguments = Vec::with_capacity(candidates.len() + 1);
        arguments.push(target);
        arguments.extend(candidates);
        Self::special_form(Form::In, arguments, DataType::Boolean)
    }

    pub fn when(operand: RowExpression, result: RowExpression) -> Self {
        let return_type = result.data_type();
        Self::special_form(Form::When, vec![operand, result], return_type)
    }

    /// `CASE operand WHEN ... THEN ... ELSE ... END`
    pub fn switch(
        operand: RowExpression,
        whens: Vec<RowExpression>,
        otherwise: Option<RowExpression>,
        return_type: DataType,
    ) -> Self {
        let mut arguments = Vec::with_capacity(whens.len() + 2);
        arguments.push(operand);
        arguments.extend(whens);
        arguments.extend(otherwise);
        Self::special_form(Form::Switch, arguments, return_type)
    }

    /// `CASE WHEN condition THEN ... END`, a switch over constant `true`
    pub fn searched_case(
        whens: Vec<RowExpression>,
        otherwise: Option<RowExpression>,
        return_type: DataType,
    ) -> Self {
        Self::switch(Self::boolean(true), whens, otherwise, return_type)
    }

    /// The result type is the first branch type that is not `unknown`
    pub fn if_then_else(
        condition: RowExpression,
        then: RowExpression,
        otherwise: Option<RowExpression>,
    ) -> Self {
        let mut arguments = vec![condition, then];
        arguments.extend(otherwise);
        let return_type = common_type(&arguments[1..]);
        Self::special_form(Form::If, arguments, return_type)
    }

    pub fn null_if(first: RowExpression, second: RowExpression) -> Self {
        let return_type = first.data_type();
        Self::special_form(Form::NullIf, vec![first, second], return_type)
    }

    /// Extract field `index` of a row-typed expression
    pub fn dereference(base: RowExpression, index: usize) -> Self {
        let return_type = match base.data_type() {
            DataType::Row(fields) => fields.get(index).cloned().unwrap_or(DataType::Unknown),
            _ => DataType::Unknown,
        };
        Self::special_form(
            Form::Dereference,
            vec![base, Self::bigint(index as i64)],
            return_type,
        )
    }

    pub fn row_constructor(fields: Vec<RowExpression>) -> Self {
        let return_type = DataType::Row(fields.iter().map(|f| f.data_type()).collect());
        Self::special_form(Form::RowConstructor, fields, return_type)
    }

    pub fn lambda(parameters: Vec<LambdaParameter>, body: RowExpression) -> Self {
        RowExpression::Lambda(LambdaDefinition {
            parameters,
            body: Box::new(body),
        })
    }

    /// Bind the leading parameters of `lambda` to `captured`
    pub fn bind(captured: Vec<RowExpression>, lambda: RowExpression) -> Self {
        let return_type = match lambda.data_type() {
            DataType::Function {
                arguments,
                return_type,
            } => DataType::Function {
                arguments: arguments.into_iter().skip(captured.len()).collect(),
                return_type,
            },
            other => other,
        };
        let mut arguments = captured;
        arguments.push(lambda);
        Self::special_form(Form::Bind, arguments, return_type)
    }

    pub fn variable(name: impl Into<String>, data_type: DataType) -> Self {
        RowExpression::Variable(VariableReference {
            name: name.into(),
            data_type,
        })
    }

    /// Static result type of this node
    pub fn data_type(&self) -> DataType {
        match self {
            RowExpression::Constant(c) => c.data_type.clone(),
            RowExpression::FieldReference(f) => f.data_type.clone(),
            RowExpression::Call(call) => call.signature.return_type.clone(),
            RowExpression::SpecialForm(form) => form.return_type.clone(),
            RowExpression::Lambda(lambda) => DataType::Function {
                arguments: lambda.parameters.iter().map(|p| p.data_type.clone()).collect(),
                return_type: Box::new(lambda.body.data_type()),
            },
            RowExpression::Variable(v) => v.data_type.clone(),
        }
    }

    /// Check if this expression is a constant (reads no row field and no variable)
    pub fn is_constant(&self) -> bool {
        match self {
            RowExpression::Constant(_) => true,
            RowExpression::FieldReference(_) | RowExpression::Variable(_) => false,
            RowExpression::Call(call) => call.arguments.iter().all(|a| a.is_constant()),
            RowExpression::SpecialForm(form) => form.arguments.iter().all(|a| a.is_constant()),
            RowExpression::Lambda(_) => false,
        }
    }

    /// Serialize for shipping inside a plan fragment
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

fn common_type(arguments: &[RowExpression]) -> DataType {
    arguments
        .iter()
        .map(|a| a.data_type())
        .find(|t| *t != DataType::Unknown)
        .unwrap_or(DataType::Unknown)
}

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[RowExpression]) -> fmt::Result {
    for (i, argument) in arguments.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", argument)?;
    }
    Ok(())
}

impl fmt::Display for RowExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowExpression::Constant(c) => match &c.value {
                Some(value) => write!(f, "{}", value),
                None => write!(f, "null"),
            },
            RowExpression::FieldReference(r) => write!(f, "#{}", r.field),
            RowExpression::Call(call) => match (call.signature.operator_type(), &call.arguments[..]) {
                (Some(OperatorType::Cast), [operand]) => {
                    write!(f, "CAST({} AS {})", operand, call.signature.return_type)
                }
                (Some(OperatorType::Negation), [operand]) => write!(f, "-({})", operand),
                (Some(op), [left, right]) => write!(f, "({} {} {})", left, op.as_str(), right),
                _ => {
                    write!(f, "{}(", call.signature.name)?;
                    write_arguments(f, &call.arguments)?;
                    write!(f, ")")
                }
            },
            RowExpression::SpecialForm(form) => {
                write!(f, "{}(", form.form)?;
                write_arguments(f, &form.arguments)?;
                write!(f, ")")
            }
            RowExpression::Lambda(lambda) => {
                write!(f, "(")?;
                for (i, parameter) in lambda.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", parameter.name)?;
                }
                write!(f, ") -> {}", lambda.body)
            }
            RowExpression::Variable(v) => write!(f, "{}", v.name),
        }
    }
}
