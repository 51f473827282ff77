//! Math method translator (`Math.Abs`, `Ceiling`, `Floor`, `Round`, `Max`, `Min`).

use crate::error::{QueryError, Result};
use crate::expression::SqlExpr;
use crate::factory::SqlExpressionFactory;
use crate::providers::SqlDialect;
use crate::translate::{expect_arguments, DeclaringType, MethodCallTranslator, MethodIdentity};
use crate::types::ValueType;
use crate::value::Value;

/// Math method translator
pub struct MathMethodTranslator {
    dialect: SqlDialect,
}

impl MathMethodTranslator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    fn abs(&self, factory: &SqlExpressionFactory, operand: &SqlExpr) -> Result<SqlExpr> {
        let folded = match operand.as_constant() {
            Some(Value::Byte(b)) => Some(Value::Byte(*b)),
            Some(Value::Int(i)) => i.checked_abs().map(Value::Int),
            Some(Value::Long(l)) => l.checked_abs().map(Value::Long),
            Some(Value::Double(d)) => Some(Value::Double(d.abs())),
            _ => None,
        };
        if let Some(value) = folded {
            return Ok(factory.constant_with_mapping(value, operand.type_mapping().clone()));
        }
        Ok(factory.function_with_mapping(
            self.dialect.functions().abs,
            vec![SqlExpr::clone(operand)],
            operand.type_mapping().clone(),
        ))
    }

    fn rounding(
        &self,
        factory: &SqlExpressionFactory,
        name: &'static str,
        operand: &SqlExpr,
        fold: fn(f64) -> f64,
    ) -> Result<SqlExpr> {
        if let Some(Value::Double(d)) = operand.as_constant() {
            return Ok(factory.constant_with_mapping(
                Value::Double(fold(*d)),
                operand.type_mapping().clone(),
            ));
        }
        Ok(factory.function_with_mapping(
            name,
            vec![SqlExpr::clone(operand)],
            operand.type_mapping().clone(),
        ))
    }

    fn round(
        &self,
        factory: &SqlExpressionFactory,
        operand: &SqlExpr,
        digits: Option<&SqlExpr>,
    ) -> Result<SqlExpr> {
        let constant_digits = match digits.map(|d| d.as_constant()) {
            None => Some(0),
            Some(Some(Value::Int(n))) => Some(*n),
            Some(_) => None,
        };
        if let (Some(Value::Double(d)), Some(n)) = (operand.as_constant(), constant_digits) {
            if (0..=15).contains(&n) {
                let scale = 10f64.powi(n);
                let rounded = (d * scale).round_ties_even() / scale;
                return Ok(factory
                    .constant_with_mapping(Value::Double(rounded), operand.type_mapping().clone()));
            }
        }

        let functions = self.dialect.functions();
        let mut arguments = vec![SqlExpr::clone(operand)];
        match digits {
            Some(digits) => arguments.push(SqlExpr::clone(digits)),
            None if functions.round_takes_precision => {
                arguments.push(factory.constant(Value::Int(0))?)
            }
            None => {}
        }
        Ok(factory.function_with_mapping(
            functions.round,
            arguments,
            operand.type_mapping().clone(),
        ))
    }

    fn extremum(
        &self,
        factory: &SqlExpressionFactory,
        greatest: bool,
        left: &SqlExpr,
        right: &SqlExpr,
    ) -> Result<SqlExpr> {
        let (lt, rt) = (left.value_type(), right.value_type());
        let result_type = if rt.widens_to(lt) { lt.clone() } else { rt.clone() };

        if let (Some(a), Some(b)) = (left.as_constant(), right.as_constant()) {
            if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
                let pick_left = if greatest { x >= y } else { x <= y };
                let chosen = if pick_left { a } else { b };
                if let Some(value) = chosen.convert_to(&result_type) {
                    return factory.constant_of(value, &result_type);
                }
            }
        }

        let functions = self.dialect.functions();
        let name = if greatest {
            functions.greatest
        } else {
            functions.least
        };
        factory.function(
            name,
            vec![SqlExpr::clone(left), SqlExpr::clone(right)],
            &result_type,
        )
    }
}

impl MethodCallTranslator for MathMethodTranslator {
    fn name(&self) -> &'static str {
        "math"
    }

    fn can_translate(&self, method: &MethodIdentity) -> bool {
        method.declaring_type == DeclaringType::Math
            && matches!(
                method.name.as_str(),
                "Abs" | "Ceiling" | "Floor" | "Round" | "Max" | "Min"
            )
    }

    fn translate(
        &self,
        _instance: Option<&SqlExpr>,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        let Some(operand) = arguments.first() else {
            return Err(QueryError::invalid_call(method, "missing operand"));
        };
        if !operand.value_type().is_numeric() {
            return Ok(None);
        }

        let functions = self.dialect.functions();
        let result = match method.name.as_str() {
            "Abs" => {
                expect_arguments(method, arguments, 1)?;
                self.abs(factory, operand)?
            }
            "Ceiling" | "Floor" => {
                expect_arguments(method, arguments, 1)?;
                if operand.value_type() != &ValueType::Double {
                    return Ok(None);
                }
                if method.name == "Ceiling" {
                    self.rounding(factory, functions.ceiling, operand, f64::ceil)?
                } else {
                    self.rounding(factory, functions.floor, operand, f64::floor)?
                }
            }
            "Round" => {
                if arguments.len() > 2 {
                    expect_arguments(method, arguments, 2)?;
                }
                if operand.value_type() != &ValueType::Double {
                    return Ok(None);
                }
                let digits = arguments.get(1);
                if digits.is_some_and(|d| d.value_type() != &ValueType::Int32) {
                    return Ok(None);
                }
                self.round(factory, operand, digits)?
            }
            "Max" | "Min" => {
                expect_arguments(method, arguments, 2)?;
                if !arguments[1].value_type().is_numeric() {
                    return Ok(None);
                }
                self.extremum(factory, method.name == "Max", operand, &arguments[1])?
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }
}
