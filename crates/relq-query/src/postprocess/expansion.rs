//! Expansion of sequence parameters in membership tests.
//!
//! `item IN (@ids)` cannot be sent as is: the element count is part of the
//! command text. Once the value is known it becomes `item IN (@p0, @p1, ...)`
//! with one placeholder per non-null element. Null elements never match
//! through `IN`, so they turn into an explicit `item IS NULL` arm unless
//! the item cannot be null.

use super::ProcessingContext;
use crate::error::{QueryError, Result};
use crate::expression::{InValues, SqlExpr, SqlExpression};
use crate::types::TypeMapping;
use crate::value::Value;
use std::sync::Arc;
use tracing::debug;

impl<'a> ProcessingContext<'a> {
    pub(super) fn expand_in(
        &mut self,
        item: &SqlExpr,
        parameter: &SqlExpr,
        negated: bool,
        type_mapping: &TypeMapping,
    ) -> Result<SqlExpr> {
        let (name, element_mapping) = match parameter.as_ref() {
            SqlExpression::Parameter {
                name,
                type_mapping,
                ..
            } => (name.as_str(), type_mapping),
            _ => return self.visit_children_of_in(item, parameter, negated, type_mapping),
        };
        let element_type = &element_mapping.value_type;

        let elements: &[Value] = match self.lookup(name)? {
            Value::Null => &[],
            Value::List(items) => items,
            _ => {
                return Err(QueryError::unsupported_shape(
                    name,
                    "a sequence parameter must be bound to a list",
                ))
            }
        };
        self.expanded = true;

        // Elements are sent with the compared column's store type when they
        // widen to it, as a hand-written `IN` list would be.
        let mapping = match item.as_ref() {
            SqlExpression::Constant { .. } | SqlExpression::Parameter { .. } => {
                element_mapping.clone()
            }
            other if element_type.widens_to(&other.type_mapping().value_type) => {
                other.type_mapping().clone()
            }
            _ => element_mapping.clone(),
        };

        let mut placeholders = Vec::with_capacity(elements.len());
        let mut has_null = false;
        for (index, element) in elements.iter().enumerate() {
            match element {
                Value::Null => has_null = true,
                Value::List(_) => {
                    return Err(QueryError::unsupported_shape(
                        name,
                        format!("element {} is a nested list", index),
                    ))
                }
                value if !value.fits(element_type) => {
                    return Err(QueryError::unsupported_shape(
                        name,
                        format!(
                            "element {} does not match the sequence element type {}",
                            index, element_type
                        ),
                    ))
                }
                _ => placeholders.push(self.element_placeholder(name, index, &mapping)),
            }
        }

        debug!(
            parameter = name,
            elements = elements.len(),
            placeholders = placeholders.len(),
            "Expanded sequence parameter"
        );

        let visited_item = self.visit(item)?;
        let membership = if placeholders.is_empty() {
            self.factory.bool_constant(negated)
        } else {
            Arc::new(SqlExpression::In {
                item: Arc::clone(&visited_item),
                values: InValues::List(placeholders),
                negated,
                type_mapping: type_mapping.clone(),
            })
        };

        let f = self.factory;
        let result = if has_null && self.known_nullness(item)? != Some(false) {
            if negated {
                f.and_also(membership, f.is_not_null(visited_item))?
            } else {
                f.or_else(membership, f.is_null(visited_item))?
            }
        } else if negated && !self.options.use_relational_nulls && self.may_be_null(item)? {
            // A null item is never in a list without nulls.
            f.or_else(membership, f.is_null(visited_item))?
        } else {
            membership
        };
        self.simplify(result)
    }

    fn visit_children_of_in(
        &mut self,
        item: &SqlExpr,
        values: &SqlExpr,
        negated: bool,
        type_mapping: &TypeMapping,
    ) -> Result<SqlExpr> {
        Ok(Arc::new(SqlExpression::In {
            item: self.visit(item)?,
            values: InValues::Parameter(self.visit(values)?),
            negated,
            type_mapping: type_mapping.clone(),
        }))
    }
}
