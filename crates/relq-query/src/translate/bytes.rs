//! Byte-array method translator.
//!
//! Handles:
//! - `Enumerable.Contains<byte>(bytes, element)` as `position(pattern, bytes) > 0`
//! - `Enumerable.First<byte>(bytes)` as the first byte of a substring
//! - `Array.Length` on byte arrays as the byte length
//!
//! Priority: 60 (ahead of generic sequence membership)

use crate::error::{QueryError, Result};
use crate::expression::SqlExpr;
use crate::factory::SqlExpressionFactory;
use crate::providers::SqlDialect;
use crate::translate::{expect_arguments, expect_instance, DeclaringType, MethodCallTranslator, MethodIdentity};
use crate::types::ValueType;
use crate::value::Value;

/// Byte-array method translator
pub struct ByteArrayMethodTranslator {
    dialect: SqlDialect,
}

impl ByteArrayMethodTranslator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    fn translate_contains(
        &self,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        expect_arguments(method, arguments, 2)?;
        let (source, element) = (&arguments[0], &arguments[1]);
        if source.value_type() != &ValueType::Bytes {
            return Ok(None);
        }
        if !matches!(element.value_type(), ValueType::Byte) {
            return Err(QueryError::invalid_call(
                method,
                format!("byte sequence searched for a {}", element.value_type()),
            ));
        }

        // The position function searches byte sequences, so a scalar byte
        // is either folded into a one-byte constant or cast at runtime.
        let pattern = match element.as_constant() {
            Some(Value::Byte(b)) => {
                factory.constant_with_mapping(Value::Bytes(vec![*b]), source.type_mapping().clone())
            }
            _ => factory.convert(SqlExpr::clone(element), &ValueType::Bytes)?,
        };

        let position =
            self.dialect
                .functions()
                .position
                .call(factory, pattern, SqlExpr::clone(source))?;
        let zero = factory.constant(Value::Int(0))?;
        factory.greater_than(position, zero).map(Some)
    }

    fn translate_first(
        &self,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        expect_arguments(method, arguments, 1)?;
        let source = &arguments[0];
        if source.value_type() != &ValueType::Bytes {
            return Ok(None);
        }
        if let Some(Value::Bytes(bytes)) = source.as_constant() {
            if let Some(first) = bytes.first() {
                return factory.constant(Value::Byte(*first)).map(Some);
            }
        }
        let one = factory.constant(Value::Int(1))?;
        let head = factory.function_with_mapping(
            self.dialect.functions().substring,
            vec![SqlExpr::clone(source), SqlExpr::clone(&one), one],
            source.type_mapping().clone(),
        );
        factory.convert(head, &ValueType::Byte).map(Some)
    }

    fn translate_length(
        &self,
        instance: Option<&SqlExpr>,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        let source = expect_instance(method, instance)?;
        expect_arguments(method, arguments, 0)?;
        if source.value_type() != &ValueType::Bytes {
            return Ok(None);
        }
        if let Some(Value::Bytes(bytes)) = source.as_constant() {
            let length = i32::try_from(bytes.len()).map_err(|_| {
                QueryError::invalid_call(method, "byte constant longer than i32::MAX")
            })?;
            return factory.constant(Value::Int(length)).map(Some);
        }
        factory
            .function(
                self.dialect.functions().byte_length,
                vec![SqlExpr::clone(source)],
                &ValueType::Int32,
            )
            .map(Some)
    }
}

impl MethodCallTranslator for ByteArrayMethodTranslator {
    fn name(&self) -> &'static str {
        "byte_array"
    }

    fn can_translate(&self, method: &MethodIdentity) -> bool {
        match method.declaring_type {
            DeclaringType::Enumerable => {
                method.generic_arity == 1 && matches!(method.name.as_str(), "Contains" | "First")
            }
            DeclaringType::Array => method.name == "Length",
            _ => false,
        }
    }

    fn translate(
        &self,
        instance: Option<&SqlExpr>,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        match (method.declaring_type, method.name.as_str()) {
            (DeclaringType::Enumerable, "Contains") => {
                self.translate_contains(method, arguments, factory)
            }
            (DeclaringType::Enumerable, "First") => self.translate_first(method, arguments, factory),
            (DeclaringType::Array, "Length") => {
                self.translate_length(instance, method, arguments, factory)
            }
            _ => Ok(None),
        }
    }

    fn priority(&self) -> u8 {
        60
    }
}
