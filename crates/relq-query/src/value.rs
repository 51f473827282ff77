//! Runtime values bound to parameters or embedded as constants.

use crate::types::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Parameter name → runtime value, supplied fresh for each execution.
pub type ParameterValues = HashMap<String, Value>;

/// A runtime value.
///
/// Equality and hashing treat doubles by bit pattern so that query shapes
/// carrying constants can be used as cache keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(u8),
    Int(i32),
    Long(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Logical type of this value. `None` for null, and for lists with no
    /// non-null element to infer from.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Byte(_) => Some(ValueType::Byte),
            Value::Int(_) => Some(ValueType::Int32),
            Value::Long(_) => Some(ValueType::Int64),
            Value::Double(_) => Some(ValueType::Double),
            Value::Text(_) => Some(ValueType::String),
            Value::Bytes(_) => Some(ValueType::Bytes),
            Value::List(items) => items
                .iter()
                .find_map(Value::value_type)
                .map(ValueType::sequence_of),
        }
    }

    /// Convert to `target` when the conversion is lossless.
    pub fn convert_to(&self, target: &ValueType) -> Option<Value> {
        match (self, target) {
            (Value::Null, _) => Some(Value::Null),
            (Value::Byte(b), ValueType::Byte) => Some(Value::Byte(*b)),
            (Value::Byte(b), ValueType::Int32) => Some(Value::Int(i32::from(*b))),
            (Value::Byte(b), ValueType::Int64) => Some(Value::Long(i64::from(*b))),
            (Value::Byte(b), ValueType::Double) => Some(Value::Double(f64::from(*b))),
            (Value::Byte(b), ValueType::Bytes) => Some(Value::Bytes(vec![*b])),
            (Value::Int(i), ValueType::Int32) => Some(Value::Int(*i)),
            (Value::Int(i), ValueType::Int64) => Some(Value::Long(i64::from(*i))),
            (Value::Int(i), ValueType::Double) => Some(Value::Double(f64::from(*i))),
            (Value::Long(l), ValueType::Int64) => Some(Value::Long(*l)),
            (Value::Long(l), ValueType::Double) => Some(Value::Double(*l as f64)),
            (Value::Double(d), ValueType::Double) => Some(Value::Double(*d)),
            (Value::Bool(b), ValueType::Bool) => Some(Value::Bool(*b)),
            (Value::Text(s), ValueType::String) => Some(Value::Text(s.clone())),
            (Value::Bytes(b), ValueType::Bytes) => Some(Value::Bytes(b.clone())),
            _ => None,
        }
    }

    /// Whether this value can be bound to a parameter of `target` type.
    pub fn fits(&self, target: &ValueType) -> bool {
        match self.value_type() {
            None => !matches!(self, Value::List(_)) || target.element_type().is_some(),
            Some(ty) => match (&ty, target) {
                (ValueType::Byte, ValueType::Bytes) => false,
                _ => ty.widens_to(target),
            },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Byte(b) => Some(f64::from(*b)),
            Value::Int(i) => Some(f64::from(*i)),
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Byte(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Long(l) => l.hash(state),
            Value::Double(d) => d.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::List(items) => items.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Byte(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_type_skips_nulls() {
        let list = Value::List(vec![Value::Null, Value::Int(3)]);
        assert_eq!(
            list.value_type(),
            Some(ValueType::sequence_of(ValueType::Int32))
        );
        assert_eq!(Value::List(vec![]).value_type(), None);
    }

    #[test]
    fn test_byte_converts_to_single_byte_sequence() {
        assert_eq!(
            Value::Byte(0x42).convert_to(&ValueType::Bytes),
            Some(Value::Bytes(vec![0x42]))
        );
        assert_eq!(Value::Text("a".into()).convert_to(&ValueType::Int32), None);
    }

    #[test]
    fn test_fits() {
        assert!(Value::Int(1).fits(&ValueType::Int64));
        assert!(Value::Null.fits(&ValueType::String));
        assert!(!Value::Long(1).fits(&ValueType::Int32));
        assert!(!Value::Byte(1).fits(&ValueType::Bytes));
        assert!(!Value::List(vec![]).fits(&ValueType::Int32));
        assert!(Value::List(vec![]).fits(&ValueType::sequence_of(ValueType::Int32)));
    }

    #[test]
    fn test_double_equality_by_bits() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    }
}
