//! Lowering of the provider-neutral query tree into SQL expressions.

use crate::dependencies::TranslationDependencies;
use crate::error::{QueryError, Result};
use crate::expression::{
    OrderingExpression, ProjectionExpression, SelectExpression, SqlBinaryOperator, SqlExpr,
    TableExpression,
};
use crate::query::{QueryExpression, ShapedQuery};
use crate::types::ValueType;
use tracing::debug;

/// Structural (value-independent) translation of query shapes.
pub struct SqlTranslator<'a> {
    dependencies: &'a TranslationDependencies,
}

impl<'a> SqlTranslator<'a> {
    pub fn new(dependencies: &'a TranslationDependencies) -> Self {
        Self { dependencies }
    }

    /// Lower one expression. `Ok(None)` when some part of it (a method call
    /// no translator accepts) has no SQL equivalent.
    pub fn translate(&self, expr: &QueryExpression) -> Result<Option<SqlExpr>> {
        let factory = self.dependencies.sql_expression_factory.as_ref();
        let lowered = match expr {
            QueryExpression::Constant { value, value_type } => match value_type {
                Some(value_type) => factory.constant_of(value.clone(), value_type)?,
                None => factory.constant(value.clone())?,
            },
            QueryExpression::Parameter { name, value_type } => {
                factory.parameter(name.clone(), value_type.clone())?
            }
            QueryExpression::Column {
                table,
                name,
                value_type,
                nullable,
            } => factory.column(table.clone(), name.clone(), value_type, *nullable)?,
            QueryExpression::Binary { op, left, right } => {
                let Some(left) = self.translate(left)? else {
                    return Ok(None);
                };
                let Some(right) = self.translate(right)? else {
                    return Ok(None);
                };
                match op {
                    SqlBinaryOperator::AndAlso => factory.and_also(left, right)?,
                    SqlBinaryOperator::OrElse => factory.or_else(left, right)?,
                    SqlBinaryOperator::Add => factory.add(left, right)?,
                    SqlBinaryOperator::Subtract => factory.subtract(left, right)?,
                    comparison => factory.comparison(*comparison, left, right)?,
                }
            }
            QueryExpression::Not { operand } => {
                let Some(operand) = self.translate(operand)? else {
                    return Ok(None);
                };
                factory.not(operand)?
            }
            QueryExpression::Convert { operand, target } => {
                let Some(operand) = self.translate(operand)? else {
                    return Ok(None);
                };
                factory.convert(operand, target)?
            }
            QueryExpression::MethodCall {
                instance,
                method,
                arguments,
            } => {
                let instance = match instance {
                    Some(instance) => match self.translate(instance)? {
                        Some(lowered) => Some(lowered),
                        None => return Ok(None),
                    },
                    None => None,
                };
                let mut lowered_arguments = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    let Some(lowered) = self.translate(argument)? else {
                        return Ok(None);
                    };
                    lowered_arguments.push(lowered);
                }
                return self.dependencies.method_call_translators.translate(
                    instance.as_ref(),
                    method,
                    &lowered_arguments,
                    factory,
                );
            }
        };
        Ok(Some(lowered))
    }

    /// Lower a whole query shape. Any part without a SQL equivalent fails
    /// the shape with `Untranslatable`.
    pub fn translate_query(&self, query: &ShapedQuery) -> Result<SelectExpression> {
        let projections = query
            .projections
            .iter()
            .map(|p| {
                Ok(ProjectionExpression {
                    alias: p.alias.clone(),
                    expression: self.translate_required(&p.expression)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let predicate = match &query.predicate {
            Some(predicate) => {
                let lowered = self.translate_required(predicate)?;
                if lowered.value_type() != &ValueType::Bool {
                    return Err(QueryError::TypeMismatch {
                        operation: "WHERE".to_string(),
                        left: ValueType::Bool,
                        right: lowered.value_type().clone(),
                    });
                }
                Some(lowered)
            }
            None => None,
        };

        let orderings = query
            .orderings
            .iter()
            .map(|o| {
                Ok(OrderingExpression {
                    expression: self.translate_required(&o.expression)?,
                    ascending: o.ascending,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let limit = match &query.limit {
            Some(limit) => {
                let lowered = self.translate_required(limit)?;
                if !matches!(
                    lowered.value_type(),
                    ValueType::Byte | ValueType::Int32 | ValueType::Int64
                ) {
                    return Err(QueryError::TypeMismatch {
                        operation: "LIMIT".to_string(),
                        left: ValueType::Int32,
                        right: lowered.value_type().clone(),
                    });
                }
                Some(lowered)
            }
            None => None,
        };

        debug!(
            table = %query.table,
            projections = projections.len(),
            has_predicate = predicate.is_some(),
            "Translated query shape"
        );

        Ok(SelectExpression {
            table: TableExpression {
                name: query.table.clone(),
                alias: query.alias.clone(),
            },
            projections,
            predicate,
            orderings,
            limit,
        })
    }

    fn translate_required(&self, expr: &QueryExpression) -> Result<SqlExpr> {
        self.translate(expr)?
            .ok_or_else(|| QueryError::Untranslatable {
                expression: expr.to_string(),
            })
    }
}
