//! SQL expression factory.
//!
//! The only place SQL expression nodes are constructed. It resolves type
//! mappings eagerly, so a node that exists always has a provider mapping,
//! and it rejects operand combinations the provider cannot compare.
//!
//! The factory holds no per-query state and is shared by every translation
//! running against the same provider.

use crate::error::{QueryError, Result};
use crate::expression::{
    InValues, SqlBinaryOperator, SqlExpr, SqlExpression, SqlUnaryOperator,
};
use crate::types::{TypeMapping, TypeMappingSource, ValueType};
use crate::value::Value;
use std::sync::Arc;

/// Builds and normalizes SQL expressions for one provider.
#[derive(Clone)]
pub struct SqlExpressionFactory {
    type_mappings: Arc<dyn TypeMappingSource>,
    bool_mapping: TypeMapping,
}

impl std::fmt::Debug for SqlExpressionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlExpressionFactory")
            .field("provider", &self.type_mappings.provider_name())
            .finish()
    }
}

impl SqlExpressionFactory {
    /// Create a factory over a provider's mappings.
    ///
    /// Fails when the provider cannot store booleans, since every comparison
    /// produces one.
    pub fn new(type_mappings: Arc<dyn TypeMappingSource>) -> Result<Self> {
        let bool_mapping =
            type_mappings
                .find_mapping(&ValueType::Bool)
                .ok_or(QueryError::UnmappableType {
                    value_type: ValueType::Bool,
                    provider: type_mappings.provider_name(),
                })?;
        Ok(Self {
            type_mappings,
            bool_mapping,
        })
    }

    pub fn type_mappings(&self) -> &dyn TypeMappingSource {
        self.type_mappings.as_ref()
    }

    pub fn provider_name(&self) -> &'static str {
        self.type_mappings.provider_name()
    }

    /// Resolve the mapping for a scalar type or fail with `UnmappableType`
    pub fn find_mapping(&self, value_type: &ValueType) -> Result<TypeMapping> {
        self.type_mappings
            .find_mapping(value_type)
            .ok_or_else(|| QueryError::UnmappableType {
                value_type: value_type.clone(),
                provider: self.provider_name(),
            })
    }

    // =========================================================================
    // Leaves
    // =========================================================================

    /// Constant with a mapping inferred from the value's logical type
    pub fn constant(&self, value: Value) -> Result<SqlExpr> {
        let value_type = value.value_type().ok_or_else(|| QueryError::UnknownType {
            what: format!("constant {:?}", value),
        })?;
        self.constant_of(value, &value_type)
    }

    /// Constant of an explicit logical type; required for typed nulls
    pub fn constant_of(&self, value: Value, value_type: &ValueType) -> Result<SqlExpr> {
        let type_mapping = self.find_mapping(value_type)?;
        if let Value::Double(d) = value {
            if !d.is_finite() {
                return Err(QueryError::UnrepresentableConstant {
                    value: d.to_string(),
                });
            }
        }
        if !value.fits(value_type) {
            return Err(QueryError::TypeMismatch {
                operation: "constant".to_string(),
                left: value_type.clone(),
                right: value.value_type().unwrap_or_else(|| value_type.clone()),
            });
        }
        let value = value.convert_to(value_type).unwrap_or(value);
        Ok(Arc::new(SqlExpression::Constant {
            value,
            type_mapping,
        }))
    }

    pub fn constant_with_mapping(&self, value: Value, type_mapping: TypeMapping) -> SqlExpr {
        Arc::new(SqlExpression::Constant {
            value,
            type_mapping,
        })
    }

    pub fn bool_constant(&self, value: bool) -> SqlExpr {
        self.constant_with_mapping(Value::Bool(value), self.bool_mapping.clone())
    }

    /// Named parameter placeholder.
    ///
    /// Sequence parameters carry their element's mapping; a sequence whose
    /// element has no mapping (including nested sequences) is unmappable.
    pub fn parameter(&self, name: impl Into<String>, value_type: ValueType) -> Result<SqlExpr> {
        let type_mapping = match &value_type {
            ValueType::Sequence(element) => match element.as_ref() {
                ValueType::Sequence(_) => {
                    return Err(QueryError::UnmappableType {
                        value_type: value_type.clone(),
                        provider: self.provider_name(),
                    })
                }
                scalar => self.find_mapping(scalar)?,
            },
            scalar => self.find_mapping(scalar)?,
        };
        Ok(Arc::new(SqlExpression::Parameter {
            name: name.into(),
            value_type,
            type_mapping,
        }))
    }

    pub fn column(
        &self,
        table: impl Into<String>,
        name: impl Into<String>,
        value_type: &ValueType,
        nullable: bool,
    ) -> Result<SqlExpr> {
        let type_mapping = self.find_mapping(value_type)?;
        Ok(self.column_with_mapping(table, name, type_mapping, nullable))
    }

    /// Column with a store type narrower than the provider default,
    /// e.g. `nvarchar(50)`
    pub fn column_with_mapping(
        &self,
        table: impl Into<String>,
        name: impl Into<String>,
        type_mapping: TypeMapping,
        nullable: bool,
    ) -> SqlExpr {
        Arc::new(SqlExpression::Column {
            table: table.into(),
            name: name.into(),
            type_mapping,
            nullable,
        })
    }

    // =========================================================================
    // Functions and conversions
    // =========================================================================

    /// Call to a named SQL function whose result is null only when an
    /// argument is null.
    pub fn function(
        &self,
        name: impl Into<String>,
        arguments: Vec<SqlExpr>,
        result_type: &ValueType,
    ) -> Result<SqlExpr> {
        let type_mapping = self.find_mapping(result_type)?;
        Ok(self.function_with_mapping(name, arguments, type_mapping))
    }

    pub fn function_with_mapping(
        &self,
        name: impl Into<String>,
        arguments: Vec<SqlExpr>,
        type_mapping: TypeMapping,
    ) -> SqlExpr {
        Arc::new(SqlExpression::Function {
            name: name.into(),
            arguments,
            type_mapping,
            nullable: false,
        })
    }

    /// Explicit cast; elided when the operand already has the target type
    pub fn convert(&self, operand: SqlExpr, target: &ValueType) -> Result<SqlExpr> {
        if operand.value_type() == target {
            return Ok(operand);
        }
        let type_mapping = self.find_mapping(target)?;
        Ok(Arc::new(SqlExpression::Convert {
            operand,
            type_mapping,
        }))
    }

    /// Re-type a constant or parameter with `type_mapping`. Other nodes keep
    /// the mapping they were built with.
    pub fn apply_type_mapping(&self, expr: &SqlExpr, type_mapping: &TypeMapping) -> SqlExpr {
        if expr.type_mapping() == type_mapping {
            return Arc::clone(expr);
        }
        match expr.as_ref() {
            SqlExpression::Constant { value, .. } if value.fits(&type_mapping.value_type) => {
                let value = value
                    .convert_to(&type_mapping.value_type)
                    .unwrap_or_else(|| value.clone());
                self.constant_with_mapping(value, type_mapping.clone())
            }
            SqlExpression::Parameter { name, value_type, .. }
                if value_type.widens_to(&type_mapping.value_type) =>
            {
                Arc::new(SqlExpression::Parameter {
                    name: name.clone(),
                    value_type: type_mapping.value_type.clone(),
                    type_mapping: type_mapping.clone(),
                })
            }
            _ => Arc::clone(expr),
        }
    }

    // =========================================================================
    // Comparisons
    // =========================================================================

    pub fn equal(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.comparison(SqlBinaryOperator::Equal, left, right)
    }

    pub fn not_equal(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.comparison(SqlBinaryOperator::NotEqual, left, right)
    }

    pub fn greater_than(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.comparison(SqlBinaryOperator::GreaterThan, left, right)
    }

    pub fn greater_than_or_equal(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.comparison(SqlBinaryOperator::GreaterThanOrEqual, left, right)
    }

    pub fn less_than(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.comparison(SqlBinaryOperator::LessThan, left, right)
    }

    pub fn less_than_or_equal(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.comparison(SqlBinaryOperator::LessThanOrEqual, left, right)
    }

    /// Build any comparison operator
    pub fn comparison(
        &self,
        op: SqlBinaryOperator,
        left: SqlExpr,
        right: SqlExpr,
    ) -> Result<SqlExpr> {
        debug_assert!(op.is_comparison());
        self.ensure_comparable(&op.to_string(), &left, &right)?;
        let (left, right) = self.infer_operand_mappings(left, right);
        Ok(Arc::new(SqlExpression::Binary {
            op,
            left,
            right,
            type_mapping: self.bool_mapping.clone(),
        }))
    }

    // =========================================================================
    // Logical operators and null tests
    // =========================================================================

    pub fn and_also(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.logical(SqlBinaryOperator::AndAlso, left, right)
    }

    pub fn or_else(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.logical(SqlBinaryOperator::OrElse, left, right)
    }

    fn logical(&self, op: SqlBinaryOperator, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        for operand in [&left, &right] {
            if operand.value_type() != &ValueType::Bool {
                return Err(QueryError::TypeMismatch {
                    operation: op.to_string(),
                    left: ValueType::Bool,
                    right: operand.value_type().clone(),
                });
            }
        }
        Ok(Arc::new(SqlExpression::Binary {
            op,
            left,
            right,
            type_mapping: self.bool_mapping.clone(),
        }))
    }

    /// Logical negation; folds constants, double negation and null tests
    pub fn not(&self, operand: SqlExpr) -> Result<SqlExpr> {
        if operand.value_type() != &ValueType::Bool {
            return Err(QueryError::TypeMismatch {
                operation: "NOT".to_string(),
                left: ValueType::Bool,
                right: operand.value_type().clone(),
            });
        }
        if let Some(b) = operand.as_bool_constant() {
            return Ok(self.bool_constant(!b));
        }
        if let SqlExpression::Unary {
            op,
            operand: inner,
            ..
        } = operand.as_ref()
        {
            match op {
                SqlUnaryOperator::Not => return Ok(Arc::clone(inner)),
                SqlUnaryOperator::IsNull => return Ok(self.is_not_null(Arc::clone(inner))),
                SqlUnaryOperator::IsNotNull => return Ok(self.is_null(Arc::clone(inner))),
            }
        }
        Ok(self.unary(SqlUnaryOperator::Not, operand))
    }

    pub fn is_null(&self, operand: SqlExpr) -> SqlExpr {
        self.unary(SqlUnaryOperator::IsNull, operand)
    }

    pub fn is_not_null(&self, operand: SqlExpr) -> SqlExpr {
        self.unary(SqlUnaryOperator::IsNotNull, operand)
    }

    fn unary(&self, op: SqlUnaryOperator, operand: SqlExpr) -> SqlExpr {
        Arc::new(SqlExpression::Unary {
            op,
            operand,
            type_mapping: self.bool_mapping.clone(),
        })
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    pub fn add(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.arithmetic(SqlBinaryOperator::Add, left, right)
    }

    pub fn subtract(&self, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        self.arithmetic(SqlBinaryOperator::Subtract, left, right)
    }

    fn arithmetic(&self, op: SqlBinaryOperator, left: SqlExpr, right: SqlExpr) -> Result<SqlExpr> {
        let (lt, rt) = (left.value_type(), right.value_type());
        if !lt.is_numeric() || !rt.is_numeric() {
            return Err(QueryError::TypeMismatch {
                operation: op.to_string(),
                left: lt.clone(),
                right: rt.clone(),
            });
        }
        let result_type = if rt.widens_to(lt) { lt.clone() } else { rt.clone() };
        let type_mapping = self.find_mapping(&result_type)?;
        Ok(Arc::new(SqlExpression::Binary {
            op,
            left,
            right,
            type_mapping,
        }))
    }

    // =========================================================================
    // Membership and pattern matching
    // =========================================================================

    pub fn in_list(&self, item: SqlExpr, values: Vec<SqlExpr>, negated: bool) -> Result<SqlExpr> {
        for value in &values {
            self.ensure_comparable("IN", &item, value)?;
        }
        let values = values
            .iter()
            .map(|v| self.apply_type_mapping(v, item.type_mapping()))
            .collect();
        Ok(Arc::new(SqlExpression::In {
            item,
            values: InValues::List(values),
            negated,
            type_mapping: self.bool_mapping.clone(),
        }))
    }

    /// Membership test against a sequence parameter
    pub fn in_parameter(
        &self,
        item: SqlExpr,
        parameter: SqlExpr,
        negated: bool,
    ) -> Result<SqlExpr> {
        let element = match parameter.as_ref() {
            SqlExpression::Parameter {
                value_type: ValueType::Sequence(element),
                ..
            } => element.as_ref().clone(),
            other => {
                return Err(QueryError::TypeMismatch {
                    operation: "IN".to_string(),
                    left: ValueType::sequence_of(item.value_type().clone()),
                    right: other.value_type().clone(),
                })
            }
        };
        if !self.type_mappings.is_comparable(item.value_type(), &element) {
            return Err(QueryError::TypeMismatch {
                operation: "IN".to_string(),
                left: item.value_type().clone(),
                right: element,
            });
        }
        Ok(Arc::new(SqlExpression::In {
            item,
            values: InValues::Parameter(parameter),
            negated,
            type_mapping: self.bool_mapping.clone(),
        }))
    }

    pub fn like(
        &self,
        match_expr: SqlExpr,
        pattern: SqlExpr,
        escape: Option<SqlExpr>,
    ) -> Result<SqlExpr> {
        for operand in std::iter::once(&match_expr)
            .chain(std::iter::once(&pattern))
            .chain(escape.iter())
        {
            if operand.value_type() != &ValueType::String {
                return Err(QueryError::TypeMismatch {
                    operation: "LIKE".to_string(),
                    left: ValueType::String,
                    right: operand.value_type().clone(),
                });
            }
        }
        let pattern = self.apply_type_mapping(&pattern, match_expr.type_mapping());
        Ok(Arc::new(SqlExpression::Like {
            match_expr,
            pattern,
            escape,
            type_mapping: self.bool_mapping.clone(),
        }))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_comparable(&self, operation: &str, left: &SqlExpr, right: &SqlExpr) -> Result<()> {
        if self
            .type_mappings
            .is_comparable(left.value_type(), right.value_type())
        {
            Ok(())
        } else {
            Err(QueryError::TypeMismatch {
                operation: operation.to_string(),
                left: left.value_type().clone(),
                right: right.value_type().clone(),
            })
        }
    }

    /// A constant or parameter compared with any other expression takes
    /// that expression's mapping when its value converts losslessly.
    fn infer_operand_mappings(&self, left: SqlExpr, right: SqlExpr) -> (SqlExpr, SqlExpr) {
        let is_value = |e: &SqlExpr| {
            matches!(
                e.as_ref(),
                SqlExpression::Constant { .. } | SqlExpression::Parameter { .. }
            )
        };
        match (is_value(&left), is_value(&right)) {
            (true, false) => {
                let left = self.apply_type_mapping(&left, right.type_mapping());
                (left, right)
            }
            (false, true) => {
                let right = self.apply_type_mapping(&right, left.type_mapping());
                (left, right)
            }
            _ => (left, right),
        }
    }
}
