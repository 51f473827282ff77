//! SQL Server type mappings and literals.

use super::{double_literal, hex, DialectFunctions, PositionFunction};
use crate::types::{TypeMapping, TypeMappingSource, ValueType};
use crate::value::Value;

pub(super) static FUNCTIONS: DialectFunctions = DialectFunctions {
    position: PositionFunction {
        name: "CHARINDEX",
        pattern_first: true,
    },
    string_length: "LEN",
    byte_length: "DATALENGTH",
    substring: "SUBSTRING",
    upper: "UPPER",
    lower: "LOWER",
    trim: "TRIM",
    abs: "ABS",
    ceiling: "CEILING",
    floor: "FLOOR",
    round: "ROUND",
    round_takes_precision: true,
    greatest: "GREATEST",
    least: "LEAST",
    like_escape: '\\',
    like_wildcards: &['%', '_', '['],
};

/// Type mappings for SQL Server
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerTypeMappingSource;

impl TypeMappingSource for SqlServerTypeMappingSource {
    fn provider_name(&self) -> &'static str {
        "sqlserver"
    }

    fn find_mapping(&self, value_type: &ValueType) -> Option<TypeMapping> {
        let store_type = match value_type {
            ValueType::Bool => "bit",
            ValueType::Byte => "tinyint",
            ValueType::Int32 => "int",
            ValueType::Int64 => "bigint",
            ValueType::Double => "float",
            ValueType::String => "nvarchar(max)",
            ValueType::Bytes => "varbinary(max)",
            ValueType::Sequence(_) => return None,
        };
        Some(TypeMapping::new(store_type, value_type.clone()))
    }
}

pub(super) fn literal(value: &Value, type_mapping: &TypeMapping) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => format!("CAST({} AS bit)", u8::from(*b)),
        Value::Byte(b) => format!("CAST({} AS {})", b, type_mapping.store_type),
        Value::Int(i) => i.to_string(),
        Value::Long(l) => format!("CAST({} AS bigint)", l),
        Value::Double(d) => double_literal(*d),
        Value::Text(s) => {
            let prefix = if type_mapping.store_type.starts_with('n') {
                "N"
            } else {
                ""
            };
            format!("{}'{}'", prefix, s.replace('\'', "''"))
        }
        Value::Bytes(bytes) => format!("0x{}", hex(bytes)),
        Value::List(items) => items
            .iter()
            .map(|item| literal(item, type_mapping))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Value::Bytes(vec![0x41, 0x42, 0x43]), ValueType::Bytes, "0x414243" ; "bytes")]
    #[test_case(Value::Bool(true), ValueType::Bool, "CAST(1 AS bit)" ; "bool")]
    #[test_case(Value::Text("it's".into()), ValueType::String, "N'it''s'" ; "unicode text")]
    #[test_case(Value::Byte(7), ValueType::Byte, "CAST(7 AS tinyint)" ; "byte")]
    #[test_case(Value::Long(9), ValueType::Int64, "CAST(9 AS bigint)" ; "bigint")]
    #[test_case(Value::Double(1.5), ValueType::Double, "1.5" ; "double")]
    #[test_case(Value::Null, ValueType::Int32, "NULL" ; "null")]
    fn test_literal(value: Value, value_type: ValueType, expected: &str) {
        let mapping = SqlServerTypeMappingSource.find_mapping(&value_type).unwrap();
        assert_eq!(literal(&value, &mapping), expected);
    }

    #[test]
    fn test_varchar_literal_has_no_unicode_prefix() {
        let mapping = TypeMapping::new("varchar(20)", ValueType::String);
        assert_eq!(literal(&Value::Text("a".into()), &mapping), "'a'");
    }

    #[test]
    fn test_sequence_has_no_mapping() {
        let ty = ValueType::sequence_of(ValueType::Int32);
        assert!(SqlServerTypeMappingSource.find_mapping(&ty).is_none());
    }
}
