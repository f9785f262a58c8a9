//! Lowers validated expression trees into evaluators.
//!
//! The compiler dispatches strictly on node kind, keeps argument order as
//! written, and resolves every call (including the equality used by `IN`,
//! `SWITCH` and `NULL_IF`) through the injected [`FunctionResolver`].

pub mod compiled;

pub use compiled::{
    CompiledArgument, CompiledCall, CompiledComparison, CompiledExpr, CompiledFunction,
    CompiledLambda, CompiledSwitch, CompiledWhen,
};

use crate::block::{DataType, Value};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult};
use crate::eval::{CompiledExpression, EvalContext};
use crate::expression::{
    validate_expression, Call, Form, LambdaDefinition, RowExpression, SpecialForm,
};
use crate::function::{FunctionBinding, FunctionResolver, OperatorType, Signature};
use crate::processor::{PageFilter, PageProcessor, PageProjection};
use log::{debug, trace};
use std::sync::Arc;

/// Parameters visible inside a lambda body, in frame order
struct LambdaScope<'a> {
    parameters: Vec<(&'a str, &'a DataType)>,
}

impl<'a> LambdaScope<'a> {
    fn new(lambda: &'a LambdaDefinition) -> Self {
        Self {
            parameters: lambda
                .parameters
                .iter()
                .map(|p| (p.name.as_str(), &p.data_type))
                .collect(),
        }
    }

    fn lookup(&self, name: &str) -> Option<(usize, &'a DataType)> {
        self.parameters
            .iter()
            .position(|(parameter, _)| *parameter == name)
            .map(|slot| (slot, self.parameters[slot].1))
    }
}

/// Expression compiler
pub struct ExpressionCompiler {
    resolver: Arc<dyn FunctionResolver>,
    config: CompilerConfig,
}

impl ExpressionCompiler {
    pub fn new(resolver: Arc<dyn FunctionResolver>, config: CompilerConfig) -> Self {
        Self { resolver, config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile an expression into a reusable evaluator
    pub fn compile(&self, expr: &RowExpression) -> CompileResult<CompiledExpression> {
        self.config.validate()?;
        validate_expression(expr, self.config.max_expression_depth)?;
        let root = self.lower(expr, None)?;
        debug!("Compiled expression {}", expr);
        Ok(CompiledExpression::new(root, expr.data_type()))
    }

    /// Compile a predicate for selecting positions of a page
    pub fn compile_filter(&self, predicate: &RowExpression) -> CompileResult<PageFilter> {
        let actual = predicate.data_type();
        if !DataType::Boolean.accepts(&actual) {
            return Err(CompileError::TypeMismatch {
                expected: DataType::Boolean,
                actual,
                context: "filter predicate".to_string(),
            });
        }
        Ok(PageFilter::new(self.compile(predicate)?))
    }

    /// Compile an expression producing one output block per page
    pub fn compile_projection(&self, expr: &RowExpression) -> CompileResult<PageProjection> {
        Ok(PageProjection::new(self.compile(expr)?))
    }

    /// Compile an optional filter and a list of projections into a processor
    pub fn compile_page_processor(
        &self,
        filter: Option<&RowExpression>,
        projections: &[RowExpression],
    ) -> CompileResult<PageProcessor> {
        let filter = filter.map(|f| self.compile_filter(f)).transpose()?;
        let projections = projections
            .iter()
            .map(|p| self.compile_projection(p))
            .collect::<CompileResult<Vec<_>>>()?;
        debug!(
            "Built page processor with {} projections (filter: {}, batch size: {})",
            projections.len(),
            filter.is_some(),
            self.config.max_batch_size
        );
        Ok(PageProcessor::new(
            filter,
            projections,
            self.config.max_batch_size,
        ))
    }

    fn resolve(&self, signature: &Signature) -> CompileResult<Arc<FunctionBinding>> {
        self.resolver
            .resolve(signature)
            .ok_or_else(|| CompileError::UnknownFunction {
                signature: signature.to_string(),
            })
    }

    fn resolve_equal(
        &self,
        left: DataType,
        right: DataType,
    ) -> CompileResult<Arc<FunctionBinding>> {
        self.resolve(&Signature::operator(
            OperatorType::Equal,
            vec![left, right],
            DataType::Boolean,
        ))
    }

    fn lower(
        &self,
        expr: &RowExpression,
        scope: Option<&LambdaScope<'_>>,
    ) -> CompileResult<CompiledExpr> {
        match expr {
            RowExpression::Constant(constant) => {
                Ok(CompiledExpr::Constant(constant.value.clone()))
            }

            RowExpression::FieldReference(field) => match scope {
                Some(_) => Err(CompileError::FieldReferenceInLambda {
                    index: field.field,
                }),
                None => Ok(CompiledExpr::Field(field.field)),
            },

            RowExpression::Variable(variable) => {
                let (slot, parameter_type) = scope
                    .and_then(|s| s.lookup(&variable.name))
                    .ok_or_else(|| CompileError::UnresolvedVariable {
                        name: variable.name.clone(),
                    })?;
                if !variable.data_type.accepts(parameter_type) {
                    return Err(CompileError::TypeMismatch {
                        expected: variable.data_type.clone(),
                        actual: parameter_type.clone(),
                        context: format!("lambda parameter {}", variable.name),
                    });
                }
                Ok(CompiledExpr::Variable(slot))
            }

            RowExpression::Lambda(_) => Err(CompileError::FunctionInValuePosition {
                expression: expr.to_string(),
            }),

            RowExpression::Call(call) => self.lower_call(call, scope),

            RowExpression::SpecialForm(form) => self.lower_form(expr, form, scope),
        }
    }

    fn lower_all(
        &self,
        exprs: &[RowExpression],
        scope: Option<&LambdaScope<'_>>,
    ) -> CompileResult<Vec<CompiledExpr>> {
        exprs.iter().map(|e| self.lower(e, scope)).collect()
    }

    fn lower_boxed(
        &self,
        expr: &RowExpression,
        scope: Option<&LambdaScope<'_>>,
    ) -> CompileResult<Box<CompiledExpr>> {
        self.lower(expr, scope).map(Box::new)
    }

    fn lower_call(
        &self,
        call: &Call,
        scope: Option<&LambdaScope<'_>>,
    ) -> CompileResult<CompiledExpr> {
        let binding = self.resolve(&call.signature)?;

        let mut arguments = Vec::with_capacity(call.arguments.len());
        let mut placeholders = Vec::new();
        for argument in &call.arguments {
            let data_type = argument.data_type();
            if data_type.is_function() {
                let function = self.lower_function(argument, scope)?;
                arguments.push(CompiledArgument::Function(function));
            } else {
                placeholders.push(Value::placeholder(&data_type));
                arguments.push(CompiledArgument::Value(self.lower(argument, scope)?));
            }
        }

        let compiled = CompiledExpr::Call(Box::new(CompiledCall {
            binding,
            arguments,
            placeholders,
        }));
        Ok(self.fold(compiled))
    }

    /// Evaluate a call over constants once, when that cannot change behavior
    fn fold(&self, expr: CompiledExpr) -> CompiledExpr {
        let signature = match &expr {
            CompiledExpr::Call(call) if self.config.fold_constants && is_foldable(call) => {
                call.binding.signature.to_string()
            }
            _ => return expr,
        };
        match expr.evaluate(&EvalContext::empty()) {
            Ok(value) => {
                trace!("Folded {} to {:?}", signature, value);
                CompiledExpr::Constant(value)
            }
            Err(e) => {
                trace!("Not folding {}: {}", signature, e);
                expr
            }
        }
    }

    /// Lower a function-typed call argument: a lambda or a `BIND`
    fn lower_function(
        &self,
        expr: &RowExpression,
        scope: Option<&LambdaScope<'_>>,
    ) -> CompileResult<CompiledFunction> {
        match expr {
            RowExpression::Lambda(lambda) => Ok(CompiledFunction {
                captured: Vec::new(),
                lambda: self.lower_lambda(lambda)?,
            }),
            RowExpression::SpecialForm(form) if form.form == Form::Bind => {
                match form.arguments.split_last() {
                    Some((RowExpression::Lambda(lambda), captured)) => Ok(CompiledFunction {
                        captured: self.lower_all(captured, scope)?,
                        lambda: self.lower_lambda(lambda)?,
                    }),
                    _ => Err(CompileError::InvalidShape {
                        form: "BIND",
                        reason: "last argument must be a lambda".to_string(),
                    }),
                }
            }
            other => Err(CompileError::InvalidShape {
                form: "CALL",
                reason: format!("function argument {} is not a lambda or BIND", other),
            }),
        }
    }

    /// The body sees only the lambda's own parameters
    fn lower_lambda(&self, lambda: &LambdaDefinition) -> CompileResult<Arc<CompiledLambda>> {
        let scope = LambdaScope::new(lambda);
        let body = self.lower(&lambda.body, Some(&scope))?;
        Ok(Arc::new(CompiledLambda {
            parameter_count: lambda.parameters.len(),
            body,
        }))
    }

    fn lower_form(
        &self,
        expr: &RowExpression,
        form: &SpecialForm,
        scope: Option<&LambdaScope<'_>>,
    ) -> CompileResult<CompiledExpr> {
        let arguments = &form.arguments;
        let compiled = match form.form {
            Form::And => CompiledExpr::And {
                left: self.lower_boxed(&arguments[0], scope)?,
                right: self.lower_boxed(&arguments[1], scope)?,
            },
            Form::Or => CompiledExpr::Or {
                left: self.lower_boxed(&arguments[0], scope)?,
                right: self.lower_boxed(&arguments[1], scope)?,
            },
            Form::IsNull => CompiledExpr::IsNull(self.lower_boxed(&arguments[0], scope)?),
            Form::Coalesce => CompiledExpr::Coalesce(self.lower_all(arguments, scope)?),
            Form::In => {
                let target_type = arguments[0].data_type();
                let candidates = arguments[1..]
                    .iter()
                    .map(|candidate| {
                        Ok(CompiledComparison {
                            value: self.lower(candidate, scope)?,
                            equal: self.resolve_equal(target_type.clone(), candidate.data_type())?,
                        })
                    })
                    .collect::<CompileResult<Vec<_>>>()?;
                CompiledExpr::In {
                    target: self.lower_boxed(&arguments[0], scope)?,
                    candidates,
                }
            }
            Form::Switch => CompiledExpr::Switch(Box::new(self.lower_switch(form, scope)?)),
            Form::If => CompiledExpr::If {
                condition: self.lower_boxed(&arguments[0], scope)?,
                then: self.lower_boxed(&arguments[1], scope)?,
                otherwise: arguments
                    .get(2)
                    .map(|e| self.lower_boxed(e, scope))
                    .transpose()?,
            },
            Form::NullIf => CompiledExpr::NullIf {
                first: self.lower_boxed(&arguments[0], scope)?,
                second: self.lower_boxed(&arguments[1], scope)?,
                equal: self.resolve_equal(arguments[0].data_type(), arguments[1].data_type())?,
            },
            Form::Dereference => {
                let index = match &arguments[1] {
                    RowExpression::Constant(c) => c.value.as_ref().and_then(Value::as_bigint),
                    _ => None,
                };
                let index = index
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| CompileError::InvalidShape {
                        form: "DEREFERENCE",
                        reason: "field index must be a non-negative bigint constant".to_string(),
                    })?;
                CompiledExpr::Dereference {
                    base: self.lower_boxed(&arguments[0], scope)?,
                    index,
                }
            }
            Form::RowConstructor => CompiledExpr::RowConstructor(self.lower_all(arguments, scope)?),
            Form::Bind => {
                return Err(CompileError::FunctionInValuePosition {
                    expression: expr.to_string(),
                })
            }
            Form::When => {
                return Err(CompileError::InvalidShape {
                    form: "WHEN",
                    reason: "WHEN arm outside SWITCH".to_string(),
                })
            }
        };
        Ok(compiled)
    }

    fn lower_switch(
        &self,
        form: &SpecialForm,
        scope: Option<&LambdaScope<'_>>,
    ) -> CompileResult<CompiledSwitch> {
        let operand = &form.arguments[0];
        let searched = matches!(
            operand,
            RowExpression::Constant(c) if c.value == Some(Value::Boolean(true))
        );
        let operand_type = operand.data_type();

        let mut arms = Vec::new();
        let mut otherwise = None;
        for argument in &form.arguments[1..] {
            match argument {
                RowExpression::SpecialForm(arm) if arm.form == Form::When => {
                    let (value, result) = (&arm.arguments[0], &arm.arguments[1]);
                    let result = self.lower(result, scope)?;
                    arms.push(if searched {
                        CompiledWhen::Condition {
                            condition: self.lower(value, scope)?,
                            result,
                        }
                    } else {
                        CompiledWhen::Match {
                            value: CompiledComparison {
                                value: self.lower(value, scope)?,
                                equal: self.resolve_equal(operand_type.clone(), value.data_type())?,
                            },
                            result,
                        }
                    });
                }
                other => otherwise = Some(self.lower(other, scope)?),
            }
        }

        Ok(CompiledSwitch {
            operand: if searched {
                None
            } else {
                Some(self.lower(operand, scope)?)
            },
            arms,
            otherwise,
        })
    }
}

fn is_foldable(call: &CompiledCall) -> bool {
    call.binding.is_foldable()
        && call.arguments.iter().all(|a| match a {
            CompiledArgument::Value(value) => value.as_constant().is_some(),
            CompiledArgument::Function(_) => false,
        })
}
