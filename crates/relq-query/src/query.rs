//! Provider-neutral query model.
//!
//! This is the shape handed over by the front end after it has resolved
//! member access and operator semantics, but before anything is lowered to
//! SQL. It is plain data: serializable, hashable, and usable as a plan-cache
//! key.

use crate::expression::SqlBinaryOperator;
use crate::translate::MethodIdentity;
use crate::types::ValueType;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Expression node in the provider-neutral query tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryExpression {
    /// Literal captured in the query shape. `value_type` is required for nulls.
    Constant {
        value: Value,
        #[serde(default)]
        value_type: Option<ValueType>,
    },
    /// Value supplied per execution
    Parameter { name: String, value_type: ValueType },
    Column {
        table: String,
        name: String,
        value_type: ValueType,
        #[serde(default)]
        nullable: bool,
    },
    Binary {
        op: SqlBinaryOperator,
        left: Box<QueryExpression>,
        right: Box<QueryExpression>,
    },
    Not { operand: Box<QueryExpression> },
    Convert {
        operand: Box<QueryExpression>,
        target: ValueType,
    },
    MethodCall {
        #[serde(default)]
        instance: Option<Box<QueryExpression>>,
        method: MethodIdentity,
        #[serde(default)]
        arguments: Vec<QueryExpression>,
    },
}

impl QueryExpression {
    pub fn constant(value: impl Into<Value>) -> Self {
        QueryExpression::Constant {
            value: value.into(),
            value_type: None,
        }
    }

    /// Typed null literal
    pub fn null(value_type: ValueType) -> Self {
        QueryExpression::Constant {
            value: Value::Null,
            value_type: Some(value_type),
        }
    }

    pub fn parameter(name: impl Into<String>, value_type: ValueType) -> Self {
        QueryExpression::Parameter {
            name: name.into(),
            value_type,
        }
    }

    pub fn column(table: impl Into<String>, name: impl Into<String>, value_type: ValueType) -> Self {
        QueryExpression::Column {
            table: table.into(),
            name: name.into(),
            value_type,
            nullable: false,
        }
    }

    pub fn nullable_column(
        table: impl Into<String>,
        name: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        QueryExpression::Column {
            table: table.into(),
            name: name.into(),
            value_type,
            nullable: true,
        }
    }

    pub fn binary(op: SqlBinaryOperator, left: QueryExpression, right: QueryExpression) -> Self {
        QueryExpression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(operand: QueryExpression) -> Self {
        QueryExpression::Not {
            operand: Box::new(operand),
        }
    }

    pub fn convert(operand: QueryExpression, target: ValueType) -> Self {
        QueryExpression::Convert {
            operand: Box::new(operand),
            target,
        }
    }

    /// Static method call
    pub fn call(method: MethodIdentity, arguments: Vec<QueryExpression>) -> Self {
        QueryExpression::MethodCall {
            instance: None,
            method,
            arguments,
        }
    }

    /// Instance method call
    pub fn call_on(
        instance: QueryExpression,
        method: MethodIdentity,
        arguments: Vec<QueryExpression>,
    ) -> Self {
        QueryExpression::MethodCall {
            instance: Some(Box::new(instance)),
            method,
            arguments,
        }
    }

    /// Collect every parameter referenced by this expression
    pub fn collect_parameters(&self, out: &mut BTreeMap<String, ValueType>) {
        match self {
            QueryExpression::Parameter { name, value_type } => {
                out.entry(name.clone()).or_insert_with(|| value_type.clone());
            }
            QueryExpression::Constant { .. } | QueryExpression::Column { .. } => {}
            QueryExpression::Binary { left, right, .. } => {
                left.collect_parameters(out);
                right.collect_parameters(out);
            }
            QueryExpression::Not { operand } | QueryExpression::Convert { operand, .. } => {
                operand.collect_parameters(out)
            }
            QueryExpression::MethodCall {
                instance,
                arguments,
                ..
            } => {
                if let Some(instance) = instance {
                    instance.collect_parameters(out);
                }
                for argument in arguments {
                    argument.collect_parameters(out);
                }
            }
        }
    }
}

impl fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpression::Constant { value, .. } => write!(f, "{:?}", value),
            QueryExpression::Parameter { name, .. } => write!(f, "@{}", name),
            QueryExpression::Column { table, name, .. } => write!(f, "{}.{}", table, name),
            QueryExpression::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            QueryExpression::Not { operand } => write!(f, "NOT {}", operand),
            QueryExpression::Convert { operand, target } => {
                write!(f, "CONVERT({}, {})", operand, target)
            }
            QueryExpression::MethodCall {
                instance,
                method,
                arguments,
            } => {
                if let Some(instance) = instance {
                    write!(f, "{}.", instance)?;
                }
                write!(f, "{}(", method)?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryProjection {
    pub alias: String,
    pub expression: QueryExpression,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryOrdering {
    pub expression: QueryExpression,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

/// A shaped single-table query: the unit of translation and caching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapedQuery {
    pub table: String,
    pub alias: String,
    pub projections: Vec<QueryProjection>,
    #[serde(default)]
    pub predicate: Option<QueryExpression>,
    #[serde(default)]
    pub orderings: Vec<QueryOrdering>,
    #[serde(default)]
    pub limit: Option<QueryExpression>,
}

impl ShapedQuery {
    pub fn from_table(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            projections: Vec::new(),
            predicate: None,
            orderings: Vec::new(),
            limit: None,
        }
    }

    pub fn project(mut self, alias: impl Into<String>, expression: QueryExpression) -> Self {
        self.projections.push(QueryProjection {
            alias: alias.into(),
            expression,
        });
        self
    }

    /// Add a filter; repeated filters are combined with AND
    pub fn filter(mut self, predicate: QueryExpression) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => {
                QueryExpression::binary(SqlBinaryOperator::AndAlso, existing, predicate)
            }
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, expression: QueryExpression, ascending: bool) -> Self {
        self.orderings.push(QueryOrdering {
            expression,
            ascending,
        });
        self
    }

    pub fn take(mut self, limit: QueryExpression) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Every parameter the query references, with its declared type
    pub fn parameters(&self) -> BTreeMap<String, ValueType> {
        let mut out = BTreeMap::new();
        for projection in &self.projections {
            projection.expression.collect_parameters(&mut out);
        }
        if let Some(predicate) = &self.predicate {
            predicate.collect_parameters(&mut out);
        }
        for ordering in &self.orderings {
            ordering.expression.collect_parameters(&mut out);
        }
        if let Some(limit) = &self.limit {
            limit.collect_parameters(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::DeclaringType;

    fn blogs() -> ShapedQuery {
        ShapedQuery::from_table("Blogs", "b")
            .project("Id", QueryExpression::column("b", "Id", ValueType::Int32))
            .filter(QueryExpression::binary(
                SqlBinaryOperator::Equal,
                QueryExpression::column("b", "Id", ValueType::Int32),
                QueryExpression::parameter("id", ValueType::Int32),
            ))
    }

    #[test]
    fn test_filters_combine_with_and() {
        let query = blogs().filter(QueryExpression::parameter("flag", ValueType::Bool));

        assert!(matches!(
            query.predicate,
            Some(QueryExpression::Binary {
                op: SqlBinaryOperator::AndAlso,
                ..
            })
        ));
    }

    #[test]
    fn test_parameters_collected_once() {
        let query = blogs()
            .order_by(QueryExpression::parameter("id", ValueType::Int32), true)
            .take(QueryExpression::parameter("n", ValueType::Int32));

        let params = query.parameters();

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("n"), Some(&ValueType::Int32));
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "table": "Blogs",
            "alias": "b",
            "projections": [
                {"alias": "Id", "expression": {"kind": "column", "table": "b", "name": "Id", "value_type": "Int32"}}
            ],
            "predicate": {
                "kind": "method_call",
                "method": {"declaring_type": "Enumerable", "name": "Contains", "generic_arity": 1},
                "arguments": [
                    {"kind": "column", "table": "b", "name": "Data", "value_type": "Bytes"},
                    {"kind": "constant", "value": {"Byte": 66}}
                ]
            }
        }"#;

        let query: ShapedQuery = serde_json::from_str(json).unwrap();

        match query.predicate {
            Some(QueryExpression::MethodCall {
                instance: None,
                method,
                arguments,
            }) => {
                assert_eq!(method, MethodIdentity::new(DeclaringType::Enumerable, "Contains", 1));
                assert_eq!(arguments.len(), 2);
            }
            other => panic!("unexpected predicate {:?}", other),
        }
        assert!(query.orderings.is_empty());
    }

    #[test]
    fn test_display_is_compact() {
        let expr = QueryExpression::call_on(
            QueryExpression::column("b", "Name", ValueType::String),
            MethodIdentity::simple(DeclaringType::String, "StartsWith"),
            vec![QueryExpression::parameter("prefix", ValueType::String)],
        );

        assert_eq!(expr.to_string(), "b.Name.String.StartsWith(@prefix)");
    }
}
