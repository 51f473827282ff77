//! String method translator.
//!
//! Handles `String.Contains`, `StartsWith`, `EndsWith`, `ToUpper`,
//! `ToLower`, `Trim`, `Length` and `Substring`. Calls on string constants
//! are evaluated directly; constant patterns become escaped `LIKE` patterns.

use crate::error::{QueryError, Result};
use crate::expression::SqlExpr;
use crate::factory::SqlExpressionFactory;
use crate::providers::SqlDialect;
use crate::translate::{expect_arguments, expect_instance, DeclaringType, MethodCallTranslator, MethodIdentity};
use crate::types::ValueType;
use crate::value::Value;

const METHODS: &[&str] = &[
    "Contains",
    "StartsWith",
    "EndsWith",
    "ToUpper",
    "ToLower",
    "Trim",
    "Length",
    "Substring",
];

/// String method translator
pub struct StringMethodTranslator {
    dialect: SqlDialect,
}

fn as_text(expr: &SqlExpr) -> Option<&str> {
    match expr.as_constant() {
        Some(Value::Text(s)) => Some(s),
        _ => None,
    }
}

fn as_int(expr: &SqlExpr) -> Option<i32> {
    match expr.as_constant() {
        Some(Value::Int(i)) => Some(*i),
        Some(Value::Byte(b)) => Some(i32::from(*b)),
        _ => None,
    }
}

impl StringMethodTranslator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    fn text(&self, factory: &SqlExpressionFactory, s: impl Into<String>) -> Result<SqlExpr> {
        factory.constant(Value::Text(s.into()))
    }

    fn length(&self, factory: &SqlExpressionFactory, operand: SqlExpr) -> Result<SqlExpr> {
        factory.function(
            self.dialect.functions().string_length,
            vec![operand],
            &ValueType::Int32,
        )
    }

    /// `LIKE` against a literal fragment with wildcards escaped
    fn like_fragment(
        &self,
        factory: &SqlExpressionFactory,
        instance: &SqlExpr,
        fragment: &str,
        prefix: bool,
    ) -> Result<SqlExpr> {
        let functions = self.dialect.functions();
        let escaped = functions.escape_like(fragment);
        let pattern = if prefix {
            format!("{}%", escaped)
        } else {
            format!("%{}", escaped)
        };
        let pattern = self.text(factory, pattern)?;
        let escape = self.text(factory, functions.like_escape.to_string())?;
        factory.like(SqlExpr::clone(instance), pattern, Some(escape))
    }

    fn contains(
        &self,
        factory: &SqlExpressionFactory,
        instance: &SqlExpr,
        pattern: &SqlExpr,
    ) -> Result<SqlExpr> {
        if let (Some(s), Some(p)) = (as_text(instance), as_text(pattern)) {
            return Ok(factory.bool_constant(s.contains(p)));
        }
        if as_text(pattern) == Some("") {
            return Ok(factory.bool_constant(true));
        }
        let position = self.dialect.functions().position.call(
            factory,
            SqlExpr::clone(pattern),
            SqlExpr::clone(instance),
        )?;
        let found = factory.greater_than(position, factory.constant(Value::Int(0))?)?;
        if as_text(pattern).is_some() {
            return Ok(found);
        }
        // An empty runtime pattern matches everything but has no position.
        let empty = factory.equal(SqlExpr::clone(pattern), self.text(factory, "")?)?;
        factory.or_else(found, empty)
    }

    fn starts_with(
        &self,
        factory: &SqlExpressionFactory,
        instance: &SqlExpr,
        pattern: &SqlExpr,
    ) -> Result<SqlExpr> {
        if let (Some(s), Some(p)) = (as_text(instance), as_text(pattern)) {
            return Ok(factory.bool_constant(s.starts_with(p)));
        }
        if let Some(p) = as_text(pattern) {
            return self.like_fragment(factory, instance, p, true);
        }
        let one = factory.constant(Value::Int(1))?;
        let length = self.length(factory, SqlExpr::clone(pattern))?;
        let head = factory.function_with_mapping(
            self.dialect.functions().substring,
            vec![SqlExpr::clone(instance), one, length],
            instance.type_mapping().clone(),
        );
        factory.equal(head, SqlExpr::clone(pattern))
    }

    fn ends_with(
        &self,
        factory: &SqlExpressionFactory,
        instance: &SqlExpr,
        pattern: &SqlExpr,
    ) -> Result<SqlExpr> {
        if let (Some(s), Some(p)) = (as_text(instance), as_text(pattern)) {
            return Ok(factory.bool_constant(s.ends_with(p)));
        }
        if let Some(p) = as_text(pattern) {
            return self.like_fragment(factory, instance, p, false);
        }
        let length = self.length(factory, SqlExpr::clone(pattern))?;
        let tail = match self.dialect {
            SqlDialect::SqlServer => factory.function_with_mapping(
                "RIGHT",
                vec![SqlExpr::clone(instance), length],
                instance.type_mapping().clone(),
            ),
            SqlDialect::Sqlite => {
                let from_end = factory.subtract(factory.constant(Value::Int(0))?, length)?;
                factory.function_with_mapping(
                    self.dialect.functions().substring,
                    vec![SqlExpr::clone(instance), from_end],
                    instance.type_mapping().clone(),
                )
            }
        };
        factory.equal(tail, SqlExpr::clone(pattern))
    }

    fn unary_function(
        &self,
        factory: &SqlExpressionFactory,
        instance: &SqlExpr,
        name: &'static str,
        fold: impl Fn(&str) -> String,
    ) -> Result<SqlExpr> {
        if let Some(s) = as_text(instance) {
            return self.text(factory, fold(s));
        }
        Ok(factory.function_with_mapping(
            name,
            vec![SqlExpr::clone(instance)],
            instance.type_mapping().clone(),
        ))
    }

    fn substring(
        &self,
        factory: &SqlExpressionFactory,
        instance: &SqlExpr,
        arguments: &[SqlExpr],
    ) -> Result<SqlExpr> {
        let start = &arguments[0];
        let length = arguments.get(1);

        if let (Some(s), Some(from)) = (as_text(instance), as_int(start)) {
            let count = s.chars().count();
            let take = match length.map(as_int) {
                None => usize::try_from(from).ok().map(|f| count.saturating_sub(f)),
                Some(Some(n)) => usize::try_from(n).ok(),
                Some(None) => None,
            };
            if let (Ok(from), Some(take)) = (usize::try_from(from), take) {
                if from + take <= count {
                    return self.text(factory, s.chars().skip(from).take(take).collect::<String>());
                }
            }
        }

        // Zero-based offsets become one-based SQL positions.
        let sql_start = match as_int(start) {
            Some(i) => factory.constant(Value::Int(i.saturating_add(1)))?,
            None => factory.add(SqlExpr::clone(start), factory.constant(Value::Int(1))?)?,
        };
        let mut sql_arguments = vec![SqlExpr::clone(instance), sql_start];
        match length {
            Some(length) => sql_arguments.push(SqlExpr::clone(length)),
            None if self.dialect == SqlDialect::SqlServer => {
                sql_arguments.push(self.length(factory, SqlExpr::clone(instance))?)
            }
            None => {}
        }
        Ok(factory.function_with_mapping(
            self.dialect.functions().substring,
            sql_arguments,
            instance.type_mapping().clone(),
        ))
    }
}

impl MethodCallTranslator for StringMethodTranslator {
    fn name(&self) -> &'static str {
        "string"
    }

    fn can_translate(&self, method: &MethodIdentity) -> bool {
        method.declaring_type == DeclaringType::String && METHODS.contains(&method.name.as_str())
    }

    fn translate(
        &self,
        instance: Option<&SqlExpr>,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        let instance = expect_instance(method, instance)?;
        if instance.value_type() != &ValueType::String
            || arguments.iter().any(|a| {
                !matches!(a.value_type(), ValueType::String | ValueType::Int32 | ValueType::Byte)
            })
        {
            return Ok(None);
        }

        let functions = self.dialect.functions();
        let result = match method.name.as_str() {
            "Contains" | "StartsWith" | "EndsWith" => {
                expect_arguments(method, arguments, 1)?;
                let pattern = &arguments[0];
                if pattern.value_type() != &ValueType::String {
                    return Ok(None);
                }
                match method.name.as_str() {
                    "Contains" => self.contains(factory, instance, pattern)?,
                    "StartsWith" => self.starts_with(factory, instance, pattern)?,
                    _ => self.ends_with(factory, instance, pattern)?,
                }
            }
            "ToUpper" => {
                expect_arguments(method, arguments, 0)?;
                self.unary_function(factory, instance, functions.upper, str::to_uppercase)?
            }
            "ToLower" => {
                expect_arguments(method, arguments, 0)?;
                self.unary_function(factory, instance, functions.lower, str::to_lowercase)?
            }
            "Trim" => {
                expect_arguments(method, arguments, 0)?;
                self.unary_function(factory, instance, functions.trim, |s| s.trim().to_string())?
            }
            "Length" => {
                expect_arguments(method, arguments, 0)?;
                match as_text(instance) {
                    Some(s) => {
                        let count = i32::try_from(s.chars().count()).unwrap_or(i32::MAX);
                        factory.constant(Value::Int(count))?
                    }
                    None => self.length(factory, SqlExpr::clone(instance))?,
                }
            }
            "Substring" => {
                if arguments.is_empty() || arguments.len() > 2 {
                    return Err(QueryError::invalid_call(
                        method,
                        format!("expected 1 or 2 arguments, got {}", arguments.len()),
                    ));
                }
                if arguments.iter().any(|a| a.value_type() == &ValueType::String) {
                    return Ok(None);
                }
                self.substring(factory, instance, arguments)?
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{SqlBinaryOperator, SqlExpression};
    use test_case::test_case;

    fn factory(dialect: SqlDialect) -> SqlExpressionFactory {
        SqlExpressionFactory::new(dialect.type_mappings()).unwrap()
    }

    fn call(
        dialect: SqlDialect,
        name: &str,
        instance: SqlExpr,
        arguments: &[SqlExpr],
    ) -> SqlExpr {
        let f = factory(dialect);
        StringMethodTranslator::new(dialect)
            .translate(
                Some(&instance),
                &MethodIdentity::simple(DeclaringType::String, name),
                arguments,
                &f,
            )
            .unwrap()
            .unwrap()
    }

    fn name_column(f: &SqlExpressionFactory) -> SqlExpr {
        f.column("b", "Name", &ValueType::String, true).unwrap()
    }

    #[test_case("StartsWith", "ab%", "ab\\%%" ; "starts with escapes wildcard")]
    #[test_case("EndsWith", "x_y", "%x\\_y" ; "ends with escapes wildcard")]
    fn test_constant_pattern_becomes_like(method: &str, pattern: &str, expected: &str) {
        let f = factory(SqlDialect::SqlServer);
        let p = f.constant(Value::from(pattern)).unwrap();

        let result = call(SqlDialect::SqlServer, method, name_column(&f), &[p]);

        match result.as_ref() {
            SqlExpression::Like {
                pattern, escape, ..
            } => {
                assert_eq!(pattern.as_constant(), Some(&Value::from(expected)));
                assert_eq!(
                    escape.as_ref().and_then(|e| e.as_constant()),
                    Some(&Value::from("\\"))
                );
            }
            other => panic!("expected LIKE, got {:?}", other),
        }
    }

    #[test_case("Contains", "hello", "ell", true ; "contains")]
    #[test_case("StartsWith", "hello", "he", true ; "starts with")]
    #[test_case("EndsWith", "hello", "he", false ; "ends with")]
    fn test_constants_fold(method: &str, s: &str, p: &str, expected: bool) {
        let f = factory(SqlDialect::Sqlite);
        let result = call(
            SqlDialect::Sqlite,
            method,
            f.constant(Value::from(s)).unwrap(),
            &[f.constant(Value::from(p)).unwrap()],
        );

        assert_eq!(result.as_bool_constant(), Some(expected));
    }

    #[test]
    fn test_empty_constant_pattern_is_true() {
        let f = factory(SqlDialect::SqlServer);
        let empty = f.constant(Value::from("")).unwrap();

        let result = call(SqlDialect::SqlServer, "Contains", name_column(&f), &[empty]);

        assert_eq!(result.as_bool_constant(), Some(true));
    }

    #[test]
    fn test_runtime_pattern_guards_empty_string() {
        let f = factory(SqlDialect::SqlServer);
        let p = f.parameter("p", ValueType::String).unwrap();

        let result = call(SqlDialect::SqlServer, "Contains", name_column(&f), &[p]);

        assert!(matches!(
            result.as_ref(),
            SqlExpression::Binary {
                op: SqlBinaryOperator::OrElse,
                ..
            }
        ));
    }

    #[test]
    fn test_to_upper_folds_and_keeps_mapping() {
        let f = factory(SqlDialect::SqlServer);
        let folded = call(
            SqlDialect::SqlServer,
            "ToUpper",
            f.constant(Value::from("abc")).unwrap(),
            &[],
        );
        assert_eq!(folded.as_constant(), Some(&Value::from("ABC")));

        let column = name_column(&f);
        let upper = call(SqlDialect::SqlServer, "ToUpper", SqlExpr::clone(&column), &[]);
        assert_eq!(upper.type_mapping(), column.type_mapping());
    }

    #[test]
    fn test_substring_folds_in_range() {
        let f = factory(SqlDialect::SqlServer);
        let result = call(
            SqlDialect::SqlServer,
            "Substring",
            f.constant(Value::from("hello")).unwrap(),
            &[
                f.constant(Value::Int(1)).unwrap(),
                f.constant(Value::Int(3)).unwrap(),
            ],
        );

        assert_eq!(result.as_constant(), Some(&Value::from("ell")));
    }

    #[test]
    fn test_substring_is_one_based_in_sql() {
        let f = factory(SqlDialect::Sqlite);
        let result = call(
            SqlDialect::Sqlite,
            "Substring",
            name_column(&f),
            &[f.constant(Value::Int(2)).unwrap()],
        );

        match result.as_ref() {
            SqlExpression::Function {
                name, arguments, ..
            } => {
                assert_eq!(name, "substr");
                assert_eq!(arguments.len(), 2);
                assert_eq!(arguments[1].as_constant(), Some(&Value::Int(3)));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_sqlserver_substring_always_has_length() {
        let f = factory(SqlDialect::SqlServer);
        let result = call(
            SqlDialect::SqlServer,
            "Substring",
            name_column(&f),
            &[f.constant(Value::Int(2)).unwrap()],
        );

        assert!(matches!(
            result.as_ref(),
            SqlExpression::Function { arguments, .. } if arguments.len() == 3
        ));
    }

    #[test]
    fn test_declines_non_string_receiver() {
        let f = factory(SqlDialect::SqlServer);
        let id = f.column("b", "Id", &ValueType::Int32, false).unwrap();

        let result = StringMethodTranslator::new(SqlDialect::SqlServer)
            .translate(
                Some(&id),
                &MethodIdentity::simple(DeclaringType::String, "ToUpper"),
                &[],
                &f,
            )
            .unwrap();

        assert!(result.is_none());
    }
}
