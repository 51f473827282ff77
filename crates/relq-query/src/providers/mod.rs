//! Built-in providers.
//!
//! A provider contributes the pieces that differ between SQL dialects: the
//! type-mapping source, literal formatting, identifier quoting, function
//! names and the ordered translator set. Everything else is shared.

mod sqlite;
mod sqlserver;

pub use sqlite::SqliteTypeMappingSource;
pub use sqlserver::SqlServerTypeMappingSource;

use crate::error::Result;
use crate::expression::SqlExpr;
use crate::factory::SqlExpressionFactory;
use crate::translate::{
    ByteArrayMethodTranslator, EnumerableContainsTranslator, EqualsTranslator,
    MathMethodTranslator, MethodCallTranslatorRegistry, MethodCallTranslatorRegistryBuilder,
    StringMethodTranslator,
};
use crate::types::{TypeMapping, TypeMappingSource, ValueType};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Target SQL dialect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    SqlServer,
    Sqlite,
}

impl SqlDialect {
    pub fn name(self) -> &'static str {
        match self {
            SqlDialect::SqlServer => "sqlserver",
            SqlDialect::Sqlite => "sqlite",
        }
    }

    pub fn type_mappings(self) -> Arc<dyn TypeMappingSource> {
        match self {
            SqlDialect::SqlServer => Arc::new(SqlServerTypeMappingSource),
            SqlDialect::Sqlite => Arc::new(SqliteTypeMappingSource),
        }
    }

    pub fn functions(self) -> &'static DialectFunctions {
        match self {
            SqlDialect::SqlServer => &sqlserver::FUNCTIONS,
            SqlDialect::Sqlite => &sqlite::FUNCTIONS,
        }
    }

    pub fn quote_identifier(self, identifier: &str) -> String {
        match self {
            SqlDialect::SqlServer => format!("[{}]", identifier.replace(']', "]]")),
            SqlDialect::Sqlite => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// Inline literal for `value` stored as `type_mapping`
    pub fn literal(self, value: &Value, type_mapping: &TypeMapping) -> String {
        match self {
            SqlDialect::SqlServer => sqlserver::literal(value, type_mapping),
            SqlDialect::Sqlite => sqlite::literal(value),
        }
    }

    /// Whether booleans need an explicit comparison in search conditions
    /// and a CASE wrapper when projected.
    pub fn requires_bool_search_condition(self) -> bool {
        matches!(self, SqlDialect::SqlServer)
    }

    /// Default translator set, most specific first.
    pub fn method_call_translators(self) -> MethodCallTranslatorRegistry {
        MethodCallTranslatorRegistryBuilder::new()
            .with_translator(ByteArrayMethodTranslator::new(self))
            .with_translator(EnumerableContainsTranslator)
            .with_translator(StringMethodTranslator::new(self))
            .with_translator(MathMethodTranslator::new(self))
            .with_translator(EqualsTranslator)
            .build()
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(SqlDialect::SqlServer),
            "sqlite" => Ok(SqlDialect::Sqlite),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Substring search returning a 1-based position, 0 when absent.
#[derive(Debug, Clone, Copy)]
pub struct PositionFunction {
    pub name: &'static str,
    /// `CHARINDEX(pattern, haystack)` vs `instr(haystack, pattern)`
    pub pattern_first: bool,
}

impl PositionFunction {
    pub fn call(
        &self,
        factory: &SqlExpressionFactory,
        pattern: SqlExpr,
        haystack: SqlExpr,
    ) -> Result<SqlExpr> {
        let arguments = if self.pattern_first {
            vec![pattern, haystack]
        } else {
            vec![haystack, pattern]
        };
        factory.function(self.name, arguments, &ValueType::Int32)
    }
}

/// Dialect function names used by the built-in translators
#[derive(Debug)]
pub struct DialectFunctions {
    pub position: PositionFunction,
    pub string_length: &'static str,
    pub byte_length: &'static str,
    pub substring: &'static str,
    pub upper: &'static str,
    pub lower: &'static str,
    pub trim: &'static str,
    pub abs: &'static str,
    pub ceiling: &'static str,
    pub floor: &'static str,
    pub round: &'static str,
    /// `ROUND` takes a mandatory precision argument
    pub round_takes_precision: bool,
    pub greatest: &'static str,
    pub least: &'static str,
    /// Escape character for LIKE patterns
    pub like_escape: char,
    /// Characters with special meaning inside LIKE patterns
    pub like_wildcards: &'static [char],
}

impl DialectFunctions {
    /// Escape LIKE wildcards in a literal fragment
    pub fn escape_like(&self, fragment: &str) -> String {
        let mut escaped = String::with_capacity(fragment.len());
        for c in fragment.chars() {
            if c == self.like_escape || self.like_wildcards.contains(&c) {
                escaped.push(self.like_escape);
            }
            escaped.push(c);
        }
        escaped
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

fn double_literal(d: f64) -> String {
    format!("{:?}", d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(SqlDialect::SqlServer, "a]b", "[a]]b]" ; "sqlserver")]
    #[test_case(SqlDialect::Sqlite, "a\"b", "\"a\"\"b\"" ; "sqlite")]
    fn test_quote_identifier(dialect: SqlDialect, ident: &str, expected: &str) {
        assert_eq!(dialect.quote_identifier(ident), expected);
    }

    #[test]
    fn test_escape_like() {
        let functions = SqlDialect::SqlServer.functions();
        assert_eq!(functions.escape_like("50%_off[1]"), "50\\%\\_off\\[1]");
        assert_eq!(SqlDialect::Sqlite.functions().escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_parse_dialect() {
        assert_eq!("SQLite".parse::<SqlDialect>(), Ok(SqlDialect::Sqlite));
        assert_eq!("mssql".parse::<SqlDialect>(), Ok(SqlDialect::SqlServer));
        assert!("oracle".parse::<SqlDialect>().is_err());
    }
}
