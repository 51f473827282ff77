//! SQL text generator for the built-in dialects.
//!
//! Renders:
//! - `SELECT TOP(n) ...` on SQL Server, `... LIMIT n` on SQLite
//! - bracket or double-quote identifier quoting
//! - boolean search conditions vs boolean values (SQL Server has no
//!   boolean value type, so predicates are wrapped in `CASE` when projected
//!   and bit values are compared with `1` when filtered on)

use crate::error::{QueryError, Result};
use crate::expression::{
    InValues, SelectExpression, SqlBinaryOperator, SqlExpr, SqlExpression, SqlUnaryOperator,
};
use crate::providers::SqlDialect;
use crate::render::QueryRenderer;
use crate::types::ValueType;
use crate::value::Value;

/// Renders finalized queries for one dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct QuerySqlGenerator {
    dialect: SqlDialect,
}

impl QuerySqlGenerator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }
}

impl QueryRenderer for QuerySqlGenerator {
    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn render(&self, select: &SelectExpression) -> Result<String> {
        let mut writer = SqlWriter {
            dialect: self.dialect,
            sql: String::with_capacity(128),
        };
        writer.select(select)?;
        Ok(writer.sql)
    }
}

/// Whether the parent wants a boolean search condition or a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Condition,
    Value,
}

struct SqlWriter {
    dialect: SqlDialect,
    sql: String,
}

fn is_search_condition(expr: &SqlExpression) -> bool {
    match expr {
        SqlExpression::Binary { op, .. } => op.is_comparison() || op.is_logical(),
        SqlExpression::Unary { .. } | SqlExpression::In { .. } | SqlExpression::Like { .. } => true,
        _ => false,
    }
}

impl SqlWriter {
    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn quote(&mut self, identifier: &str) {
        let quoted = self.dialect.quote_identifier(identifier);
        self.sql.push_str(&quoted);
    }

    fn select(&mut self, select: &SelectExpression) -> Result<()> {
        self.push("SELECT ");
        if self.dialect == SqlDialect::SqlServer {
            if let Some(limit) = &select.limit {
                self.push("TOP(");
                self.expr(limit, Context::Value)?;
                self.push(") ");
            }
        }

        if select.projections.is_empty() {
            self.push("1");
        }
        for (i, projection) in select.projections.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(&projection.expression, Context::Value)?;
            self.push(" AS ");
            self.quote(&projection.alias);
        }

        self.push(" FROM ");
        self.quote(&select.table.name);
        self.push(" AS ");
        self.quote(&select.table.alias);

        if let Some(predicate) = &select.predicate {
            self.push(" WHERE ");
            self.expr(predicate, Context::Condition)?;
        }

        if !select.orderings.is_empty() {
            self.push(" ORDER BY ");
            for (i, ordering) in select.orderings.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(&ordering.expression, Context::Value)?;
                if !ordering.ascending {
                    self.push(" DESC");
                }
            }
        }

        if self.dialect == SqlDialect::Sqlite {
            if let Some(limit) = &select.limit {
                self.push(" LIMIT ");
                self.expr(limit, Context::Value)?;
            }
        }
        Ok(())
    }

    fn expr(&mut self, expr: &SqlExpr, context: Context) -> Result<()> {
        let search_condition = is_search_condition(expr);
        let bool_value = !search_condition && expr.value_type() == &ValueType::Bool;
        let sqlserver = self.dialect.requires_bool_search_condition();

        match context {
            Context::Condition if bool_value => {
                if let Some(b) = expr.as_bool_constant() {
                    self.push(if b { "1 = 1" } else { "0 = 1" });
                    return Ok(());
                }
                self.node(expr)?;
                if sqlserver {
                    self.push(" = CAST(1 AS bit)");
                }
                Ok(())
            }
            Context::Value if search_condition && sqlserver => {
                self.push("CASE WHEN ");
                self.node(expr)?;
                self.push(" THEN CAST(1 AS bit) ELSE CAST(0 AS bit) END");
                Ok(())
            }
            _ => self.node(expr),
        }
    }

    /// Render an operand, parenthesized when it binds looser than `parent`
    fn operand(
        &mut self,
        expr: &SqlExpr,
        parent: SqlBinaryOperator,
        right_side: bool,
        context: Context,
    ) -> Result<()> {
        let needs_parens = match expr.as_ref() {
            SqlExpression::Binary { op, .. } => {
                let wrapped_in_case = context == Context::Value
                    && is_search_condition(expr)
                    && self.dialect.requires_bool_search_condition();
                !wrapped_in_case
                    && (op.precedence() < parent.precedence()
                        || (op.is_logical() && parent.is_logical() && *op != parent)
                        || (op.is_comparison() && parent.is_comparison())
                        || (right_side
                            && op.precedence() == parent.precedence()
                            && !parent.is_logical()))
            }
            _ => false,
        };
        if needs_parens {
            self.push("(");
            self.expr(expr, context)?;
            self.push(")");
            Ok(())
        } else {
            self.expr(expr, context)
        }
    }

    fn node(&mut self, expr: &SqlExpr) -> Result<()> {
        match expr.as_ref() {
            SqlExpression::Constant {
                value,
                type_mapping,
            } => {
                if let Value::Double(d) = value {
                    if !d.is_finite() {
                        return Err(QueryError::UnrepresentableConstant {
                            value: d.to_string(),
                        });
                    }
                }
                let literal = self.dialect.literal(value, type_mapping);
                self.push(&literal);
            }
            SqlExpression::Parameter {
                name, value_type, ..
            } => {
                if value_type.element_type().is_some() {
                    return Err(QueryError::unsupported_shape(
                        name,
                        "sequence parameter must be expanded before rendering",
                    ));
                }
                self.push("@");
                self.push(name);
            }
            SqlExpression::Column { table, name, .. } => {
                self.quote(table);
                self.push(".");
                self.quote(name);
            }
            SqlExpression::Function {
                name, arguments, ..
            } => {
                self.push(name);
                self.push("(");
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(argument, Context::Value)?;
                }
                self.push(")");
            }
            SqlExpression::Binary {
                op, left, right, ..
            } => {
                let context = if op.is_logical() {
                    Context::Condition
                } else {
                    Context::Value
                };
                self.operand(left, *op, false, context)?;
                self.push(" ");
                self.push(&op.to_string());
                self.push(" ");
                self.operand(right, *op, true, context)?;
            }
            SqlExpression::Unary { op, operand, .. } => match op {
                SqlUnaryOperator::Not => {
                    self.push("NOT (");
                    self.expr(operand, Context::Condition)?;
                    self.push(")");
                }
                SqlUnaryOperator::IsNull | SqlUnaryOperator::IsNotNull => {
                    let parens = matches!(operand.as_ref(), SqlExpression::Binary { .. });
                    if parens {
                        self.push("(");
                    }
                    self.expr(operand, Context::Value)?;
                    if parens {
                        self.push(")");
                    }
                    self.push(if *op == SqlUnaryOperator::IsNull {
                        " IS NULL"
                    } else {
                        " IS NOT NULL"
                    });
                }
            },
            SqlExpression::Convert {
                operand,
                type_mapping,
            } => {
                self.push("CAST(");
                self.expr(operand, Context::Value)?;
                self.push(" AS ");
                self.push(&type_mapping.store_type);
                self.push(")");
            }
            SqlExpression::In {
                item,
                values,
                negated,
                ..
            } => {
                let list = match values {
                    InValues::List(list) => list,
                    InValues::Parameter(parameter) => {
                        return Err(QueryError::unsupported_shape(
                            parameter.parameter_name().unwrap_or("<expression>"),
                            "sequence parameter must be expanded before rendering",
                        ))
                    }
                };
                if list.is_empty() {
                    self.push(if *negated { "1 = 1" } else { "0 = 1" });
                    return Ok(());
                }
                self.expr(item, Context::Value)?;
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in list.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(value, Context::Value)?;
                }
                self.push(")");
            }
            SqlExpression::Like {
                match_expr,
                pattern,
                escape,
                ..
            } => {
                self.expr(match_expr, Context::Value)?;
                self.push(" LIKE ");
                self.expr(pattern, Context::Value)?;
                if let Some(escape) = escape {
                    self.push(" ESCAPE ");
                    self.expr(escape, Context::Value)?;
                }
            }
        }
        Ok(())
    }
}
