//! Sequence membership translator.
//!
//! `Enumerable.Contains<T>(values, item)` over a sequence parameter becomes
//! `item IN (values)`. The parameter is expanded into one placeholder per
//! element once its value is known.

use crate::error::Result;
use crate::expression::{SqlExpr, SqlExpression};
use crate::factory::SqlExpressionFactory;
use crate::translate::{expect_arguments, DeclaringType, MethodCallTranslator, MethodIdentity};
use crate::types::ValueType;

/// Membership test against a sequence parameter
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumerableContainsTranslator;

impl MethodCallTranslator for EnumerableContainsTranslator {
    fn name(&self) -> &'static str {
        "enumerable_contains"
    }

    fn can_translate(&self, method: &MethodIdentity) -> bool {
        method.declaring_type == DeclaringType::Enumerable
            && method.name == "Contains"
            && method.generic_arity == 1
    }

    fn translate(
        &self,
        _instance: Option<&SqlExpr>,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        expect_arguments(method, arguments, 2)?;
        let (source, item) = (&arguments[0], &arguments[1]);
        match source.as_ref() {
            SqlExpression::Parameter {
                value_type: ValueType::Sequence(_),
                ..
            } => factory
                .in_parameter(SqlExpr::clone(item), SqlExpr::clone(source), false)
                .map(Some),
            _ => Ok(None),
        }
    }
}
