//! Structural validation of expression trees.
//!
//! Special forms have fixed shapes the evaluator relies on. Trees that break
//! them are rejected here, before any code is generated.

use crate::block::{DataType, Value};
use crate::error::{CompileError, CompileResult};
use crate::expression::{Form, LambdaDefinition, RowExpression, SpecialForm};
use std::collections::HashSet;

/// Validates arity, operand types and nesting depth
pub struct ShapeChecker {
    max_depth: usize,
}

impl ShapeChecker {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Check an expression tree
    pub fn check(&self, expr: &RowExpression) -> CompileResult<()> {
        self.check_node(expr, 1)
    }

    fn check_node(&self, expr: &RowExpression, depth: usize) -> CompileResult<()> {
        if depth > self.max_depth {
            return Err(CompileError::ExpressionTooDeep {
                max_depth: self.max_depth,
            });
        }

        match expr {
            RowExpression::Constant(constant) => match &constant.value {
                Some(value) if !value.is_compatible_with(&constant.data_type) => {
                    Err(CompileError::TypeMismatch {
                        expected: constant.data_type.clone(),
                        actual: value_type(value),
                        context: format!("constant {}", value),
                    })
                }
                _ => Ok(()),
            },

            RowExpression::FieldReference(_) | RowExpression::Variable(_) => Ok(()),

            RowExpression::Call(call) => {
                let signature = &call.signature;
                if call.arguments.len() != signature.arity() {
                    return Err(CompileError::InvalidShape {
                        form: "CALL",
                        reason: format!(
                            "{} has {} arguments, signature declares {}",
                            signature.name,
                            call.arguments.len(),
                            signature.arity()
                        ),
                    });
                }
                for (i, (argument, declared)) in call
                    .arguments
                    .iter()
                    .zip(&signature.argument_types)
                    .enumerate()
                {
                    expect_type(declared, argument, || {
                        format!("argument {} of {}", i, signature.name)
                    })?;
                    self.check_node(argument, depth + 1)?;
                }
                Ok(())
            }

            RowExpression::SpecialForm(form) => {
                self.check_form(form)?;
                form.arguments
                    .iter()
                    .try_for_each(|argument| self.check_argument(form.form, argument, depth + 1))
            }

            RowExpression::Lambda(lambda) => {
                check_parameter_names(lambda)?;
                self.check_node(&lambda.body, depth + 1)
            }
        }
    }

    /// `WHEN` is only legal directly under `SWITCH`, so it is checked here
    /// with its parent in hand rather than in `check_node`.
    fn check_argument(
        &self,
        parent: Form,
        argument: &RowExpression,
        depth: usize,
    ) -> CompileResult<()> {
        match argument {
            RowExpression::SpecialForm(form) if form.form == Form::When => {
                if parent != Form::Switch {
                    return Err(CompileError::InvalidShape {
                        form: "WHEN",
                        reason: format!("WHEN arm outside SWITCH (inside {})", parent),
                    });
                }
                if depth > self.max_depth {
                    return Err(CompileError::ExpressionTooDeep {
                        max_depth: self.max_depth,
                    });
                }
                expect_arity(form, 2, 2)?;
                form.arguments
                    .iter()
                    .try_for_each(|a| self.check_node(a, depth + 1))
            }
            _ => self.check_node(argument, depth),
        }
    }

    fn check_form(&self, form: &SpecialForm) -> CompileResult<()> {
        let arguments = &form.arguments;
        match form.form {
            Form::And | Form::Or => {
                expect_arity(form, 2, 2)?;
                for argument in arguments {
                    expect_type(&DataType::Boolean, argument, || {
                        format!("{} operand", form.form)
                    })?;
                }
                Ok(())
            }

            Form::IsNull => expect_arity(form, 1, 1),

            Form::Coalesce => {
                expect_arity(form, 1, usize::MAX)?;
                for argument in arguments {
                    expect_type(&form.return_type, argument, || "COALESCE argument".to_string())?;
                }
                Ok(())
            }

            Form::In => {
                expect_arity(form, 2, usize::MAX)?;
                let target_type = arguments[0].data_type();
                if !target_type.is_comparable() {
                    return Err(CompileError::InvalidShape {
                        form: "IN",
                        reason: format!("{} values cannot be compared", target_type),
                    });
                }
                for candidate in &arguments[1..] {
                    expect_comparable(&target_type, candidate, "IN candidate")?;
                }
                Ok(())
            }

            Form::Switch => self.check_switch(form),

            Form::When => Err(CompileError::InvalidShape {
                form: "WHEN",
                reason: "WHEN arm outside SWITCH".to_string(),
            }),

            Form::If => {
                expect_arity(form, 2, 3)?;
                expect_type(&DataType::Boolean, &arguments[0], || "IF condition".to_string())?;
                for branch in &arguments[1..] {
                    expect_type(&form.return_type, branch, || "IF branch".to_string())?;
                }
                Ok(())
            }

            Form::NullIf => {
                expect_arity(form, 2, 2)?;
                expect_comparable(&arguments[0].data_type(), &arguments[1], "NULL_IF operand")
            }

            Form::Dereference => {
                expect_arity(form, 2, 2)?;
                let fields = match arguments[0].data_type() {
                    DataType::Row(fields) => fields,
                    other => {
                        return Err(CompileError::InvalidShape {
                            form: "DEREFERENCE",
                            reason: format!("base must be a row, got {}", other),
                        })
                    }
                };
                let index = match &arguments[1] {
                    RowExpression::Constant(c) => c.value.as_ref().and_then(Value::as_bigint),
                    _ => None,
                };
                match index {
                    Some(i) if i >= 0 && (i as usize) < fields.len() => {
                        let field = &fields[i as usize];
                        if form.return_type.accepts(field) {
                            Ok(())
                        } else {
                            Err(CompileError::TypeMismatch {
                                expected: form.return_type.clone(),
                                actual: field.clone(),
                                context: format!("DEREFERENCE field {}", i),
                            })
                        }
                    }
                    Some(i) => Err(CompileError::InvalidShape {
                        form: "DEREFERENCE",
                        reason: format!("field index {} out of range for {} fields", i, fields.len()),
                    }),
                    None => Err(CompileError::InvalidShape {
                        form: "DEREFERENCE",
                        reason: "field index must be a non-null bigint constant".to_string(),
                    }),
                }
            }

            Form::RowConstructor => {
                expect_arity(form, 1, usize::MAX)?;
                match &form.return_type {
                    DataType::Row(fields) if fields.len() == arguments.len() => {
                        for (i, (field, argument)) in fields.iter().zip(arguments).enumerate() {
                            expect_type(field, argument, || format!("ROW_CONSTRUCTOR field {}", i))?;
                        }
                        Ok(())
                    }
                    other => Err(CompileError::InvalidShape {
                        form: "ROW_CONSTRUCTOR",
                        reason: format!(
                            "return type {} does not describe {} fields",
                            other,
                            arguments.len()
                        ),
                    }),
                }
            }

            Form::Bind => {
                expect_arity(form, 1, usize::MAX)?;
                let (lambda, captured) = match arguments.split_last() {
                    Some((RowExpression::Lambda(lambda), captured)) => (lambda, captured),
                    _ => {
                        return Err(CompileError::InvalidShape {
                            form: "BIND",
                            reason: "last argument must be a lambda".to_string(),
                        })
                    }
                };
                if captured.len() > lambda.parameters.len() {
                    return Err(CompileError::InvalidShape {
                        form: "BIND",
                        reason: format!(
                            "{} captured values for a lambda of {} parameters",
                            captured.len(),
                            lambda.parameters.len()
                        ),
                    });
                }
                for (value, parameter) in captured.iter().zip(&lambda.parameters) {
                    expect_type(&parameter.data_type, value, || {
                        format!("BIND capture {}", parameter.name)
                    })?;
                }
                Ok(())
            }
        }
    }

    fn check_switch(&self, form: &SpecialForm) -> CompileResult<()> {
        expect_arity(form, 2, usize::MAX)?;
        let operand_type = form.arguments[0].data_type();
        let rest = &form.arguments[1..];

        let (whens, otherwise) = match rest.split_last() {
            Some((last, whens)) if !is_when(last) => (whens, Some(last)),
            _ => (rest, None),
        };
        if whens.is_empty() {
            return Err(CompileError::InvalidShape {
                form: "SWITCH",
                reason: "at least one WHEN arm is required".to_string(),
            });
        }

        for arm in whens {
            let arm = match arm {
                RowExpression::SpecialForm(f) if f.form == Form::When => f,
                other => {
                    return Err(CompileError::InvalidShape {
                        form: "SWITCH",
                        reason: format!("expected WHEN arm, got {}", other),
                    })
                }
            };
            expect_arity(arm, 2, 2)?;
            expect_comparable(&operand_type, &arm.arguments[0], "WHEN operand")?;
            expect_type(&form.return_type, &arm.arguments[1], || "WHEN result".to_string())?;
        }
        if let Some(otherwise) = otherwise {
            expect_type(&form.return_type, otherwise, || "SWITCH else".to_string())?;
        }
        Ok(())
    }
}

/// Validate an expression tree with the given depth limit
pub fn validate_expression(expr: &RowExpression, max_depth: usize) -> CompileResult<()> {
    ShapeChecker::new(max_depth).check(expr)
}

fn is_when(expr: &RowExpression) -> bool {
    matches!(expr, RowExpression::SpecialForm(f) if f.form == Form::When)
}

fn expect_arity(form: &SpecialForm, min: usize, max: usize) -> CompileResult<()> {
    let actual = form.arguments.len();
    if actual >= min && actual <= max {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else if max == usize::MAX {
        format!("at least {}", min)
    } else {
        format!("{} to {}", min, max)
    };
    Err(CompileError::ArityMismatch {
        form: form.form.as_str(),
        expected,
        actual,
    })
}

fn expect_type(
    expected: &DataType,
    expr: &RowExpression,
    context: impl FnOnce() -> String,
) -> CompileResult<()> {
    let actual = expr.data_type();
    if expected.accepts(&actual) {
        Ok(())
    } else {
        Err(CompileError::TypeMismatch {
            expected: expected.clone(),
            actual,
            context: context(),
        })
    }
}

/// Either side may be an untyped NULL
fn expect_comparable(target: &DataType, expr: &RowExpression, context: &str) -> CompileResult<()> {
    let actual = expr.data_type();
    if target.accepts(&actual) || actual.accepts(target) {
        Ok(())
    } else {
        Err(CompileError::TypeMismatch {
            expected: target.clone(),
            actual,
            context: context.to_string(),
        })
    }
}

fn check_parameter_names(lambda: &LambdaDefinition) -> CompileResult<()> {
    let mut seen = HashSet::new();
    for parameter in &lambda.parameters {
        if !seen.insert(parameter.name.as_str()) {
            return Err(CompileError::InvalidShape {
                form: "LAMBDA",
                reason: format!("duplicate parameter {}", parameter.name),
            });
        }
    }
    Ok(())
}

fn value_type(value: &Value) -> DataType {
    match value {
        Value::Boolean(_) => DataType::Boolean,
        Value::Bigint(_) => DataType::Bigint,
        Value::Double(_) => DataType::Double,
        Value::Varchar(_) => DataType::Varchar,
        Value::Array(_) => DataType::array(DataType::Unknown),
        Value::Row(fields) => DataType::row(vec![DataType::Unknown; fields.len()]),
    }
}
