//! Null-aware rewriting of equality and null tests.
//!
//! SQL `=` yields UNKNOWN when either side is null; the query model expects
//! two-valued equality where null equals null. Comparisons against a known
//! null become `IS NULL` / `IS NOT NULL`, and comparisons between operands
//! that may be null at runtime get compensation terms unless relational
//! null semantics were requested.

use super::ProcessingContext;
use crate::error::Result;
use crate::expression::{SqlBinaryOperator, SqlExpr, SqlExpression, SqlUnaryOperator};
use std::sync::Arc;

impl<'a> ProcessingContext<'a> {
    pub(super) fn rewrite_equality(
        &mut self,
        expr: &SqlExpr,
        op: SqlBinaryOperator,
        left: &SqlExpr,
        right: &SqlExpr,
    ) -> Result<SqlExpr> {
        let equal = op == SqlBinaryOperator::Equal;
        let left_null = self.known_nullness(left)? == Some(true);
        let right_null = self.known_nullness(right)? == Some(true);

        match (left_null, right_null) {
            (true, true) => return Ok(self.factory.bool_constant(equal)),
            (true, false) => return self.null_test(right, equal),
            (false, true) => return self.null_test(left, equal),
            (false, false) => {}
        }

        let (left_nullable, right_nullable) = if self.options.use_relational_nulls {
            (false, false)
        } else if equal {
            // Equality only needs compensation when both sides may be null.
            let l = self.may_be_null(left)?;
            (l, l && self.may_be_null(right)?)
        } else {
            (self.may_be_null(left)?, self.may_be_null(right)?)
        };

        let visited_left = self.visit(left)?;
        let visited_right = self.visit(right)?;
        let comparison = if Arc::ptr_eq(&visited_left, left) && Arc::ptr_eq(&visited_right, right) {
            Arc::clone(expr)
        } else {
            Arc::new(SqlExpression::Binary {
                op,
                left: Arc::clone(&visited_left),
                right: Arc::clone(&visited_right),
                type_mapping: expr.type_mapping().clone(),
            })
        };

        let f = self.factory;
        match (equal, left_nullable, right_nullable) {
            // a = b OR (a IS NULL AND b IS NULL)
            (true, true, true) => {
                let both_null = f.and_also(
                    f.is_null(Arc::clone(&visited_left)),
                    f.is_null(Arc::clone(&visited_right)),
                )?;
                f.or_else(comparison, both_null)
            }
            // (a <> b OR a IS NULL OR b IS NULL) AND (a IS NOT NULL OR b IS NOT NULL)
            (false, true, true) => {
                let differs = f.or_else(
                    f.or_else(comparison, f.is_null(Arc::clone(&visited_left)))?,
                    f.is_null(Arc::clone(&visited_right)),
                )?;
                let not_both_null = f.or_else(
                    f.is_not_null(visited_left),
                    f.is_not_null(visited_right),
                )?;
                f.and_also(differs, not_both_null)
            }
            (false, true, false) => f.or_else(comparison, f.is_null(visited_left)),
            (false, false, true) => f.or_else(comparison, f.is_null(visited_right)),
            _ => Ok(comparison),
        }
    }

    fn null_test(&mut self, operand: &SqlExpr, is_null: bool) -> Result<SqlExpr> {
        let operand = self.visit(operand)?;
        Ok(if is_null {
            self.factory.is_null(operand)
        } else {
            self.factory.is_not_null(operand)
        })
    }

    /// Whether `expr` is null, when that is known before execution.
    ///
    /// Reading a parameter's nullness makes the output depend on it, so the
    /// parameter is recorded for cacheability.
    pub(super) fn known_nullness(&mut self, expr: &SqlExpr) -> Result<Option<bool>> {
        Ok(match expr.as_ref() {
            SqlExpression::Constant { value, .. } => Some(value.is_null()),
            SqlExpression::Parameter {
                name, value_type, ..
            } if value_type.element_type().is_none() => {
                let is_null = self.lookup(name)?.is_null();
                self.consulted.insert(name.clone());
                Some(is_null)
            }
            SqlExpression::Column {
                nullable: false, ..
            } => Some(false),
            SqlExpression::Convert { operand, .. } => self.known_nullness(operand)?,
            _ => None,
        })
    }

    /// Whether `expr` can evaluate to null at runtime
    pub(super) fn may_be_null(&mut self, expr: &SqlExpr) -> Result<bool> {
        Ok(match expr.as_ref() {
            SqlExpression::Constant { .. } | SqlExpression::Parameter { .. } => {
                self.known_nullness(expr)?.unwrap_or(true)
            }
            SqlExpression::Column { nullable, .. } => *nullable,
            SqlExpression::Unary {
                op: SqlUnaryOperator::IsNull | SqlUnaryOperator::IsNotNull,
                ..
            } => false,
            SqlExpression::Function {
                nullable,
                arguments,
                ..
            } => {
                if *nullable {
                    return Ok(true);
                }
                for argument in arguments {
                    if self.may_be_null(argument)? {
                        return Ok(true);
                    }
                }
                false
            }
            other => {
                for child in other.children() {
                    if self.may_be_null(child)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }
}
