//! SQLite type mappings and literals.

use super::{double_literal, hex, DialectFunctions, PositionFunction};
use crate::types::{TypeMapping, TypeMappingSource, ValueType};
use crate::value::Value;

pub(super) static FUNCTIONS: DialectFunctions = DialectFunctions {
    position: PositionFunction {
        name: "instr",
        pattern_first: false,
    },
    string_length: "length",
    byte_length: "length",
    substring: "substr",
    upper: "upper",
    lower: "lower",
    trim: "trim",
    abs: "abs",
    ceiling: "ceil",
    floor: "floor",
    round: "round",
    round_takes_precision: false,
    greatest: "max",
    least: "min",
    like_escape: '\\',
    like_wildcards: &['%', '_'],
};

/// Type mappings for SQLite storage classes
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTypeMappingSource;

impl TypeMappingSource for SqliteTypeMappingSource {
    fn provider_name(&self) -> &'static str {
        "sqlite"
    }

    fn find_mapping(&self, value_type: &ValueType) -> Option<TypeMapping> {
        let store_type = match value_type {
            ValueType::Bool | ValueType::Byte | ValueType::Int32 | ValueType::Int64 => "INTEGER",
            ValueType::Double => "REAL",
            ValueType::String => "TEXT",
            ValueType::Bytes => "BLOB",
            ValueType::Sequence(_) => return None,
        };
        Some(TypeMapping::new(store_type, value_type.clone()))
    }
}

pub(super) fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => u8::from(*b).to_string(),
        Value::Byte(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Long(l) => l.to_string(),
        Value::Double(d) => double_literal(*d),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Bytes(bytes) => format!("X'{}'", hex(bytes)),
        Value::List(items) => items.iter().map(literal).collect::<Vec<_>>().join(", "),
    }
}
