//! `Object.Equals` translator, instance (`a.Equals(b)`) and static
//! (`Equals(a, b)`) forms.
//!
//! Operands the provider cannot compare are never equal, so the call folds
//! to constant FALSE instead of failing.

use crate::error::Result;
use crate::expression::SqlExpr;
use crate::factory::SqlExpressionFactory;
use crate::translate::{expect_arguments, DeclaringType, MethodCallTranslator, MethodIdentity};

#[derive(Debug, Clone, Copy, Default)]
pub struct EqualsTranslator;

impl MethodCallTranslator for EqualsTranslator {
    fn name(&self) -> &'static str {
        "equals"
    }

    fn can_translate(&self, method: &MethodIdentity) -> bool {
        method.is(DeclaringType::Object, "Equals")
    }

    fn translate(
        &self,
        instance: Option<&SqlExpr>,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        let (left, right) = match instance {
            Some(instance) => {
                expect_arguments(method, arguments, 1)?;
                (instance, &arguments[0])
            }
            None => {
                expect_arguments(method, arguments, 2)?;
                (&arguments[0], &arguments[1])
            }
        };

        if !factory
            .type_mappings()
            .is_comparable(left.value_type(), right.value_type())
        {
            return Ok(Some(factory.bool_constant(false)));
        }

        if let (Some(a), Some(b)) = (left.as_constant(), right.as_constant()) {
            let equal = a == b
                || a.convert_to(right.value_type()).as_ref() == Some(b)
                || b.convert_to(left.value_type()).as_ref() == Some(a);
            return Ok(Some(factory.bool_constant(equal)));
        }

        factory
            .equal(SqlExpr::clone(left), SqlExpr::clone(right))
            .map(Some)
    }
}
