//! Parameter-based postprocessing.
//!
//! The second translation phase. It takes a structurally translated
//! `SelectExpression` and the concrete parameter values of one execution,
//! and produces the final tree plus an ordered parameter list:
//!
//! - sequence parameters used in `IN` are expanded to one placeholder per
//!   element
//! - comparisons against null values become `IS NULL` / `IS NOT NULL`, and
//!   comparisons between nullable operands get null-safe compensation
//! - `NOT` is pushed onto the comparisons below it, so compensation is
//!   built for the form that is actually evaluated
//! - widening conversions of parameters are folded into the bound value
//! - boolean constants produced by the rewrites are simplified away
//!
//! Placeholders are named in traversal order (projections, predicate,
//! orderings, limit) by a fresh generator per call. The result records how
//! far it can be reused for other values of the same shape.

mod expansion;
mod negation;
mod nulls;

use crate::dependencies::TranslationDependencies;
use crate::error::{QueryError, Result};
use crate::expression::{
    map_children, walk, InValues, SelectExpression, SqlBinaryOperator, SqlExpr, SqlExpression,
    SqlUnaryOperator,
};
use crate::factory::SqlExpressionFactory;
use crate::naming::{ParameterNameGenerator, ParameterNameGeneratorFactory};
use crate::types::{TypeMapping, ValueType};
use crate::value::{ParameterValues, Value};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Knobs for the postprocessing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterProcessingOptions {
    /// Keep SQL three-valued comparison semantics between nullable operands
    /// instead of adding null-safe compensation terms.
    pub use_relational_nulls: bool,
}

impl ParameterProcessingOptions {
    pub fn with_use_relational_nulls(mut self, use_relational_nulls: bool) -> Self {
        self.use_relational_nulls = use_relational_nulls;
        self
    }
}

/// How far a processed query can be reused for other parameter values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "parameters", rename_all = "snake_case")]
pub enum Cacheability {
    /// Output does not depend on any value
    ByShape,
    /// Output depends only on whether the listed parameters are null
    ByNullness(Vec<String>),
    /// Output depends on the values themselves (sequence expansion)
    PerValues,
}

impl Cacheability {
    pub fn is_cacheable_by_shape(&self) -> bool {
        matches!(self, Cacheability::ByShape)
    }

    /// Cache discriminator for `values`: empty for `ByShape`, one flag per
    /// listed parameter for `ByNullness`, `None` when the output cannot be
    /// reused.
    pub fn nullness_key(&self, values: &ParameterValues) -> Option<Vec<bool>> {
        match self {
            Cacheability::ByShape => Some(Vec::new()),
            Cacheability::ByNullness(names) => Some(
                names
                    .iter()
                    .map(|name| values.get(name).map_or(true, Value::is_null))
                    .collect(),
            ),
            Cacheability::PerValues => None,
        }
    }
}

/// Where a placeholder's value comes from at bind time.
///
/// Sources are deferred so a plan cached by shape can be bound again to new
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterSource {
    /// A named binding, validated against `value_type` and converted to
    /// `convert_to` when a conversion was folded into the placeholder
    Value {
        parameter: String,
        value_type: ValueType,
        convert_to: Option<ValueType>,
    },
    /// One element of a sequence binding
    Element {
        parameter: String,
        index: usize,
        value_type: ValueType,
    },
}

impl ParameterSource {
    pub fn parameter(&self) -> &str {
        match self {
            ParameterSource::Value { parameter, .. } | ParameterSource::Element { parameter, .. } => {
                parameter
            }
        }
    }

    /// Resolve the value to send for this placeholder
    pub fn resolve(&self, values: &ParameterValues) -> Result<Value> {
        match self {
            ParameterSource::Value {
                parameter,
                value_type,
                convert_to,
            } => {
                let value = lookup(values, parameter)?;
                check_scalar(parameter, value, value_type)?;
                let target = convert_to.as_ref().unwrap_or(value_type);
                convert(parameter, value, target)
            }
            ParameterSource::Element {
                parameter,
                index,
                value_type,
            } => {
                let element = match lookup(values, parameter)? {
                    Value::List(items) => items.get(*index),
                    _ => None,
                };
                let element = element.ok_or_else(|| {
                    QueryError::unsupported_shape(
                        parameter,
                        format!("no element {} in the bound sequence", index),
                    )
                })?;
                convert(parameter, element, value_type)
            }
        }
    }
}

/// A placeholder of the final command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandParameter {
    pub name: String,
    #[serde(serialize_with = "serialize_store_type")]
    pub type_mapping: TypeMapping,
    pub source: ParameterSource,
}

fn serialize_store_type<S: serde::Serializer>(
    mapping: &TypeMapping,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&mapping.store_type)
}

/// Output of the postprocessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedQuery {
    pub select: SelectExpression,
    pub parameters: Vec<CommandParameter>,
    pub cacheability: Cacheability,
}

/// The parameter-based postprocessor.
///
/// Stateless; each call gets its own processing context and name
/// generator, so one instance serves concurrent executions.
#[derive(Clone)]
pub struct ParameterBasedSqlProcessor {
    factory: Arc<SqlExpressionFactory>,
    name_generators: Arc<dyn ParameterNameGeneratorFactory>,
    options: ParameterProcessingOptions,
}

impl std::fmt::Debug for ParameterBasedSqlProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterBasedSqlProcessor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ParameterBasedSqlProcessor {
    pub fn new(dependencies: &TranslationDependencies, options: ParameterProcessingOptions) -> Self {
        Self {
            factory: Arc::clone(&dependencies.sql_expression_factory),
            name_generators: Arc::clone(&dependencies.parameter_name_generator_factory),
            options,
        }
    }

    pub fn options(&self) -> ParameterProcessingOptions {
        self.options
    }

    /// Specialize `select` for `values`.
    pub fn process(&self, select: &SelectExpression, values: &ParameterValues) -> Result<ProcessedQuery> {
        let mut context = ProcessingContext {
            factory: &self.factory,
            values,
            options: self.options,
            scratch_names: self.name_generators.create(),
            slots: HashMap::new(),
            slot_keys: HashMap::new(),
            consulted: BTreeSet::new(),
            expanded: false,
        };

        let mut rewritten = select.try_map(|expr| context.visit(expr))?;
        if rewritten
            .predicate
            .as_ref()
            .is_some_and(|p| p.as_bool_constant() == Some(true))
        {
            rewritten.predicate = None;
        }

        let (select, parameters) =
            assign_placeholders(rewritten, &context.slots, self.name_generators.create())?;

        let cacheability = if context.expanded {
            Cacheability::PerValues
        } else if context.consulted.is_empty() {
            Cacheability::ByShape
        } else {
            Cacheability::ByNullness(context.consulted.into_iter().collect())
        };

        debug!(
            parameters = parameters.len(),
            cacheability = ?cacheability,
            "Processed query parameters"
        );

        Ok(ProcessedQuery {
            select,
            parameters,
            cacheability,
        })
    }
}

// =============================================================================
// Processing context
// =============================================================================

/// Identity of a placeholder before final naming
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Value {
        parameter: String,
        type_mapping: TypeMapping,
        convert_to: Option<ValueType>,
    },
    Element {
        parameter: String,
        index: usize,
        type_mapping: TypeMapping,
    },
}

#[derive(Debug, Clone)]
struct Slot {
    type_mapping: TypeMapping,
    source: ParameterSource,
}

/// Per-call state. Placeholders get provisional names here; the final names
/// are assigned once the tree is complete, so placeholders dropped by
/// simplification never reach the parameter list.
pub(crate) struct ProcessingContext<'a> {
    factory: &'a SqlExpressionFactory,
    values: &'a ParameterValues,
    options: ParameterProcessingOptions,
    scratch_names: ParameterNameGenerator,
    slots: HashMap<String, Slot>,
    slot_keys: HashMap<SlotKey, String>,
    /// Parameters whose nullness shaped the output
    consulted: BTreeSet<String>,
    expanded: bool,
}

impl<'a> ProcessingContext<'a> {
    pub(crate) fn visit(&mut self, expr: &SqlExpr) -> Result<SqlExpr> {
        match expr.as_ref() {
            SqlExpression::Parameter {
                name,
                value_type,
                type_mapping,
            } => {
                if value_type.element_type().is_some() {
                    return Err(QueryError::unsupported_shape(
                        name,
                        "sequence parameter used outside of a membership test",
                    ));
                }
                check_scalar(name, self.lookup(name)?, value_type)?;
                Ok(self.value_placeholder(name, value_type, type_mapping, None))
            }
            SqlExpression::Convert {
                operand,
                type_mapping,
            } => match operand.as_ref() {
                SqlExpression::Parameter {
                    name, value_type, ..
                } if value_type.element_type().is_none()
                    && value_type.widens_to(&type_mapping.value_type) =>
                {
                    check_scalar(name, self.lookup(name)?, value_type)?;
                    Ok(self.value_placeholder(
                        name,
                        value_type,
                        type_mapping,
                        Some(type_mapping.value_type.clone()),
                    ))
                }
                _ => self.visit_children(expr),
            },
            SqlExpression::Binary {
                op: op @ (SqlBinaryOperator::Equal | SqlBinaryOperator::NotEqual),
                left,
                right,
                ..
            } => self.rewrite_equality(expr, *op, left, right),
            SqlExpression::Unary {
                op: SqlUnaryOperator::Not,
                operand,
                ..
            } => self.visit_not(Some(expr), operand),
            SqlExpression::Unary {
                op: op @ (SqlUnaryOperator::IsNull | SqlUnaryOperator::IsNotNull),
                operand,
                ..
            } => match self.known_nullness(operand)? {
                Some(is_null) => Ok(self
                    .factory
                    .bool_constant(is_null == (*op == SqlUnaryOperator::IsNull))),
                None => self.visit_children(expr),
            },
            SqlExpression::In {
                item,
                values: InValues::Parameter(parameter),
                negated,
                type_mapping,
            } => self.expand_in(item, parameter, *negated, type_mapping),
            _ => self.visit_children(expr),
        }
    }

    fn visit_children(&mut self, expr: &SqlExpr) -> Result<SqlExpr> {
        let rebuilt = map_children(expr, |child| self.visit(child))?;
        self.simplify(rebuilt)
    }

    /// Fold AND/OR over boolean constants
    pub(crate) fn simplify(&self, expr: SqlExpr) -> Result<SqlExpr> {
        match expr.as_ref() {
            SqlExpression::Binary {
                op: SqlBinaryOperator::AndAlso,
                left,
                right,
                ..
            } => Ok(match (left.as_bool_constant(), right.as_bool_constant()) {
                (Some(false), _) | (_, Some(false)) => self.factory.bool_constant(false),
                (Some(true), _) => Arc::clone(right),
                (_, Some(true)) => Arc::clone(left),
                _ => expr,
            }),
            SqlExpression::Binary {
                op: SqlBinaryOperator::OrElse,
                left,
                right,
                ..
            } => Ok(match (left.as_bool_constant(), right.as_bool_constant()) {
                (Some(true), _) | (_, Some(true)) => self.factory.bool_constant(true),
                (Some(false), _) => Arc::clone(right),
                (_, Some(false)) => Arc::clone(left),
                _ => expr,
            }),
            _ => Ok(expr),
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<&'a Value> {
        lookup(self.values, name)
    }

    fn value_placeholder(
        &mut self,
        parameter: &str,
        value_type: &ValueType,
        type_mapping: &TypeMapping,
        convert_to: Option<ValueType>,
    ) -> SqlExpr {
        let key = SlotKey::Value {
            parameter: parameter.to_string(),
            type_mapping: type_mapping.clone(),
            convert_to: convert_to.clone(),
        };
        let source = ParameterSource::Value {
            parameter: parameter.to_string(),
            value_type: value_type.clone(),
            convert_to,
        };
        self.placeholder(key, source, type_mapping)
    }

    pub(crate) fn element_placeholder(
        &mut self,
        parameter: &str,
        index: usize,
        type_mapping: &TypeMapping,
    ) -> SqlExpr {
        let key = SlotKey::Element {
            parameter: parameter.to_string(),
            index,
            type_mapping: type_mapping.clone(),
        };
        let source = ParameterSource::Element {
            parameter: parameter.to_string(),
            index,
            value_type: type_mapping.value_type.clone(),
        };
        self.placeholder(key, source, type_mapping)
    }

    fn placeholder(&mut self, key: SlotKey, source: ParameterSource, type_mapping: &TypeMapping) -> SqlExpr {
        let name = match self.slot_keys.get(&key) {
            Some(name) => name.clone(),
            None => {
                let name = self.scratch_names.generate_next();
                self.slots.insert(
                    name.clone(),
                    Slot {
                        type_mapping: type_mapping.clone(),
                        source,
                    },
                );
                self.slot_keys.insert(key, name.clone());
                name
            }
        };
        Arc::new(SqlExpression::Parameter {
            name,
            value_type: type_mapping.value_type.clone(),
            type_mapping: type_mapping.clone(),
        })
    }
}

/// Give surviving placeholders their final names in traversal order.
fn assign_placeholders(
    select: SelectExpression,
    slots: &HashMap<String, Slot>,
    mut names: ParameterNameGenerator,
) -> Result<(SelectExpression, Vec<CommandParameter>)> {
    let mut order: Vec<String> = Vec::new();
    for expr in select.expressions() {
        walk(expr, &mut |node: &SqlExpr| {
            if let Some(name) = node.parameter_name() {
                if !order.iter().any(|seen| seen == name) {
                    order.push(name.to_string());
                }
            }
        });
    }

    let mut renamed: HashMap<String, SqlExpr> = HashMap::with_capacity(order.len());
    let mut parameters = Vec::with_capacity(order.len());
    for scratch in order {
        let slot = slots
            .get(&scratch)
            .ok_or_else(|| QueryError::MissingParameter {
                name: scratch.clone(),
            })?;
        let name = names.generate_next();
        renamed.insert(
            scratch,
            Arc::new(SqlExpression::Parameter {
                name: name.clone(),
                value_type: slot.type_mapping.value_type.clone(),
                type_mapping: slot.type_mapping.clone(),
            }),
        );
        parameters.push(CommandParameter {
            name,
            type_mapping: slot.type_mapping.clone(),
            source: slot.source.clone(),
        });
    }

    let select = select.try_map(|expr| rename(expr, &renamed))?;
    Ok((select, parameters))
}

fn rename(expr: &SqlExpr, renamed: &HashMap<String, SqlExpr>) -> Result<SqlExpr> {
    match expr.parameter_name().and_then(|name| renamed.get(name)) {
        Some(placeholder) => Ok(Arc::clone(placeholder)),
        None => map_children(expr, |child| rename(child, renamed)),
    }
}

// =============================================================================
// Value helpers
// =============================================================================

fn lookup<'v>(values: &'v ParameterValues, name: &str) -> Result<&'v Value> {
    values.get(name).ok_or_else(|| QueryError::MissingParameter {
        name: name.to_string(),
    })
}

/// Validate a value bound to a scalar parameter of `value_type`
fn check_scalar(parameter: &str, value: &Value, value_type: &ValueType) -> Result<()> {
    if matches!(value, Value::List(_)) {
        return Err(QueryError::unsupported_shape(
            parameter,
            "a list cannot be bound to a scalar parameter",
        ));
    }
    if !value.fits(value_type) {
        return Err(QueryError::TypeMismatch {
            operation: format!("binding of '{}'", parameter),
            left: value_type.clone(),
            right: value.value_type().unwrap_or_else(|| value_type.clone()),
        });
    }
    Ok(())
}

fn convert(parameter: &str, value: &Value, target: &ValueType) -> Result<Value> {
    value
        .convert_to(target)
        .ok_or_else(|| QueryError::TypeMismatch {
            operation: format!("binding of '{}'", parameter),
            left: target.clone(),
            right: value.value_type().unwrap_or_else(|| target.clone()),
        })
}
