//! Negation pushed onto the predicates it applies to.
//!
//! Null compensation for `=` and `IN` only makes a match TRUE; a non-match
//! between a null and a non-null operand can still be UNKNOWN, and `NOT`
//! keeps UNKNOWN as UNKNOWN. So a `NOT` is never left above a rewritten
//! comparison: `NOT (a = b)` becomes `a <> b`, `NOT (x IN ...)` becomes
//! `x NOT IN ...`, and AND/OR are inverted by De Morgan. Each comparison
//! then gets the compensation of the form it ends up in.

use super::ProcessingContext;
use crate::error::Result;
use crate::expression::{InValues, SqlBinaryOperator, SqlExpr, SqlExpression, SqlUnaryOperator};
use crate::types::TypeMapping;
use std::sync::Arc;

impl<'a> ProcessingContext<'a> {
    /// Visit `NOT operand`. `original` is the NOT node when the negation is
    /// written out, so an untouched one keeps its handle.
    pub(super) fn visit_not(&mut self, original: Option<&SqlExpr>, operand: &SqlExpr) -> Result<SqlExpr> {
        match operand.as_ref() {
            SqlExpression::Unary {
                op: SqlUnaryOperator::Not,
                operand: inner,
                ..
            } => self.visit(inner),
            SqlExpression::Unary {
                op: SqlUnaryOperator::IsNull | SqlUnaryOperator::IsNotNull,
                ..
            } => {
                let flipped = self.factory.not(Arc::clone(operand))?;
                self.visit(&flipped)
            }
            SqlExpression::Binary {
                op: op @ (SqlBinaryOperator::AndAlso | SqlBinaryOperator::OrElse),
                left,
                right,
                ..
            } => {
                let left = self.visit_not(None, left)?;
                let right = self.visit_not(None, right)?;
                let inverted = if *op == SqlBinaryOperator::AndAlso {
                    self.factory.or_else(left, right)?
                } else {
                    self.factory.and_also(left, right)?
                };
                self.simplify(inverted)
            }
            SqlExpression::Binary {
                op,
                left,
                right,
                type_mapping,
            } => match op.negated_comparison() {
                Some(negated) => self.visit_negated_comparison(negated, left, right, type_mapping),
                None => self.negate_visited(original, operand),
            },
            SqlExpression::In {
                item,
                values: InValues::Parameter(parameter),
                negated,
                type_mapping,
            } => self.expand_in(item, parameter, !negated, type_mapping),
            SqlExpression::In {
                item,
                values: InValues::List(list),
                negated,
                type_mapping,
            } => {
                let flipped = Arc::new(SqlExpression::In {
                    item: Arc::clone(item),
                    values: InValues::List(list.clone()),
                    negated: !negated,
                    type_mapping: type_mapping.clone(),
                });
                let visited = self.visit_children(&flipped)?;
                if *negated || self.any_may_be_null(list)? {
                    // `x IN` needs nothing; a null in the list makes every
                    // non-match of `x NOT IN` UNKNOWN regardless of `x`.
                    Ok(visited)
                } else {
                    self.or_null_arms(visited, &[item])
                }
            }
            SqlExpression::Like {
                match_expr,
                pattern,
                ..
            } => {
                let negation = self.negate_visited(original, operand)?;
                self.or_null_arms(negation, &[match_expr, pattern])
            }
            _ => self.negate_visited(original, operand),
        }
    }

    fn visit_negated_comparison(
        &mut self,
        op: SqlBinaryOperator,
        left: &SqlExpr,
        right: &SqlExpr,
        type_mapping: &TypeMapping,
    ) -> Result<SqlExpr> {
        let comparison = Arc::new(SqlExpression::Binary {
            op,
            left: Arc::clone(left),
            right: Arc::clone(right),
            type_mapping: type_mapping.clone(),
        });
        match op {
            SqlBinaryOperator::Equal | SqlBinaryOperator::NotEqual => {
                self.rewrite_equality(&comparison, op, left, right)
            }
            _ => {
                let visited = self.visit_children(&comparison)?;
                self.or_null_arms(visited, &[left, right])
            }
        }
    }

    fn negate_visited(&mut self, original: Option<&SqlExpr>, operand: &SqlExpr) -> Result<SqlExpr> {
        let visited = self.visit(operand)?;
        match original {
            Some(original) if Arc::ptr_eq(&visited, operand) => Ok(Arc::clone(original)),
            _ => self.factory.not(visited),
        }
    }

    /// `predicate OR operand IS NULL` for every operand that may be null.
    ///
    /// A comparison with a null operand is false in the query model, so its
    /// negation holds. A known null operand makes the whole result TRUE.
    fn or_null_arms(&mut self, predicate: SqlExpr, operands: &[&SqlExpr]) -> Result<SqlExpr> {
        if self.options.use_relational_nulls {
            return Ok(predicate);
        }
        let mut result = predicate;
        for operand in operands {
            match self.known_nullness(operand)? {
                Some(true) => return Ok(self.factory.bool_constant(true)),
                Some(false) => {}
                None => {
                    if self.may_be_null(operand)? {
                        let visited = self.visit(operand)?;
                        result = self.factory.or_else(result, self.factory.is_null(visited))?;
                    }
                }
            }
        }
        self.simplify(result)
    }

    fn any_may_be_null(&mut self, exprs: &[SqlExpr]) -> Result<bool> {
        for expr in exprs {
            if self.may_be_null(expr)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
