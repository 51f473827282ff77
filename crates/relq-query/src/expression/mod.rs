//! SQL expression model.
//!
//! Nodes are immutable and shared through `Arc`. A structurally translated
//! tree may be cached per query shape and specialized concurrently for
//! different parameter values, so every transformation builds new nodes and
//! reuses the subtrees it did not touch.
//!
//! Nodes should be built through [`SqlExpressionFactory`](crate::factory::SqlExpressionFactory),
//! which resolves type mappings and validates operand types.

mod select;

pub use select::{OrderingExpression, ProjectionExpression, SelectExpression, TableExpression};

use crate::error::Result;
use crate::types::{TypeMapping, ValueType};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared handle to an immutable SQL expression node
pub type SqlExpr = Arc<SqlExpression>;

/// Binary SQL operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlBinaryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    AndAlso,
    OrElse,
    Add,
    Subtract,
}

impl SqlBinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
                | Self::LessThan
                | Self::LessThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::AndAlso | Self::OrElse)
    }

    /// The comparison that holds exactly when `self` does not, for non-null
    /// operands. `None` for non-comparisons.
    pub fn negated_comparison(self) -> Option<Self> {
        Some(match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::GreaterThan => Self::LessThanOrEqual,
            Self::GreaterThanOrEqual => Self::LessThan,
            Self::LessThan => Self::GreaterThanOrEqual,
            Self::LessThanOrEqual => Self::GreaterThan,
            _ => return None,
        })
    }

    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            Self::OrElse => 1,
            Self::AndAlso => 2,
            Self::Equal
            | Self::NotEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => 4,
            Self::Add | Self::Subtract => 5,
        }
    }
}

impl fmt::Display for SqlBinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::AndAlso => "AND",
            Self::OrElse => "OR",
            Self::Add => "+",
            Self::Subtract => "-",
        };
        f.write_str(symbol)
    }
}

/// Unary SQL operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlUnaryOperator {
    Not,
    IsNull,
    IsNotNull,
}

/// Right-hand side of an `IN` test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InValues {
    /// Explicit list of scalar expressions
    List(Vec<SqlExpr>),
    /// A sequence-typed parameter, expanded once its value is known
    Parameter(SqlExpr),
}

/// A node in the SQL intermediate representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlExpression {
    Constant {
        value: Value,
        type_mapping: TypeMapping,
    },
    /// Placeholder for a runtime value. `value_type` differs from the
    /// mapping's type only for sequence parameters, which carry the mapping
    /// of their element.
    Parameter {
        name: String,
        value_type: ValueType,
        type_mapping: TypeMapping,
    },
    Column {
        table: String,
        name: String,
        type_mapping: TypeMapping,
        nullable: bool,
    },
    Function {
        name: String,
        arguments: Vec<SqlExpr>,
        type_mapping: TypeMapping,
        nullable: bool,
    },
    Binary {
        op: SqlBinaryOperator,
        left: SqlExpr,
        right: SqlExpr,
        type_mapping: TypeMapping,
    },
    Unary {
        op: SqlUnaryOperator,
        operand: SqlExpr,
        type_mapping: TypeMapping,
    },
    Convert {
        operand: SqlExpr,
        type_mapping: TypeMapping,
    },
    In {
        item: SqlExpr,
        values: InValues,
        negated: bool,
        type_mapping: TypeMapping,
    },
    Like {
        match_expr: SqlExpr,
        pattern: SqlExpr,
        escape: Option<SqlExpr>,
        type_mapping: TypeMapping,
    },
}

impl SqlExpression {
    pub fn type_mapping(&self) -> &TypeMapping {
        match self {
            Self::Constant { type_mapping, .. }
            | Self::Parameter { type_mapping, .. }
            | Self::Column { type_mapping, .. }
            | Self::Function { type_mapping, .. }
            | Self::Binary { type_mapping, .. }
            | Self::Unary { type_mapping, .. }
            | Self::Convert { type_mapping, .. }
            | Self::In { type_mapping, .. }
            | Self::Like { type_mapping, .. } => type_mapping,
        }
    }

    /// Logical type of the value this expression produces
    pub fn value_type(&self) -> &ValueType {
        match self {
            Self::Parameter { value_type, .. } => value_type,
            other => &other.type_mapping().value_type,
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Self::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_bool_constant(&self) -> Option<bool> {
        match self {
            Self::Constant {
                value: Value::Bool(b),
                ..
            } => Some(*b),
            _ => None,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(
            self,
            Self::Constant {
                value: Value::Null,
                ..
            }
        )
    }

    /// Parameter name when this is a placeholder
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            Self::Parameter { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<&SqlExpr> {
        match self {
            Self::Constant { .. } | Self::Parameter { .. } | Self::Column { .. } => Vec::new(),
            Self::Function { arguments, .. } => arguments.iter().collect(),
            Self::Binary { left, right, .. } => vec![left, right],
            Self::Unary { operand, .. } | Self::Convert { operand, .. } => vec![operand],
            Self::In { item, values, .. } => {
                let mut children = vec![item];
                match values {
                    InValues::List(list) => children.extend(list.iter()),
                    InValues::Parameter(parameter) => children.push(parameter),
                }
                children
            }
            Self::Like {
                match_expr,
                pattern,
                escape,
                ..
            } => {
                let mut children = vec![match_expr, pattern];
                children.extend(escape.iter());
                children
            }
        }
    }
}

/// Rebuild `expr` with every direct child replaced by `f(child)`.
///
/// Returns the original handle when `f` hands back every child unchanged,
/// so untouched subtrees stay shared.
pub fn map_children<F>(expr: &SqlExpr, mut f: F) -> Result<SqlExpr>
where
    F: FnMut(&SqlExpr) -> Result<SqlExpr>,
{
    let mut changed = false;
    let mut visit = |child: &SqlExpr| -> Result<SqlExpr> {
        let mapped = f(child)?;
        if !Arc::ptr_eq(&mapped, child) {
            changed = true;
        }
        Ok(mapped)
    };

    let rebuilt = match expr.as_ref() {
        SqlExpression::Constant { .. }
        | SqlExpression::Parameter { .. }
        | SqlExpression::Column { .. } => return Ok(Arc::clone(expr)),
        SqlExpression::Function {
            name,
            arguments,
            type_mapping,
            nullable,
        } => SqlExpression::Function {
            name: name.clone(),
            arguments: arguments.iter().map(&mut visit).collect::<Result<_>>()?,
            type_mapping: type_mapping.clone(),
            nullable: *nullable,
        },
        SqlExpression::Binary {
            op,
            left,
            right,
            type_mapping,
        } => SqlExpression::Binary {
            op: *op,
            left: visit(left)?,
            right: visit(right)?,
            type_mapping: type_mapping.clone(),
        },
        SqlExpression::Unary {
            op,
            operand,
            type_mapping,
        } => SqlExpression::Unary {
            op: *op,
            operand: visit(operand)?,
            type_mapping: type_mapping.clone(),
        },
        SqlExpression::Convert {
            operand,
            type_mapping,
        } => SqlExpression::Convert {
            operand: visit(operand)?,
            type_mapping: type_mapping.clone(),
        },
        SqlExpression::In {
            item,
            values,
            negated,
            type_mapping,
        } => SqlExpression::In {
            item: visit(item)?,
            values: match values {
                InValues::List(list) => {
                    InValues::List(list.iter().map(&mut visit).collect::<Result<_>>()?)
                }
                InValues::Parameter(parameter) => InValues::Parameter(visit(parameter)?),
            },
            negated: *negated,
            type_mapping: type_mapping.clone(),
        },
        SqlExpression::Like {
            match_expr,
            pattern,
            escape,
            type_mapping,
        } => SqlExpression::Like {
            match_expr: visit(match_expr)?,
            pattern: visit(pattern)?,
            escape: escape.as_ref().map(&mut visit).transpose()?,
            type_mapping: type_mapping.clone(),
        },
    };

    if changed {
        Ok(Arc::new(rebuilt))
    } else {
        Ok(Arc::clone(expr))
    }
}

/// Pre-order walk over `expr` and all of its descendants.
pub fn walk<'a, F>(expr: &'a SqlExpr, f: &mut F)
where
    F: FnMut(&'a SqlExpr),
{
    f(expr);
    for child in expr.children() {
        walk(child, f);
    }
}
