//! Logical value types and provider type mappings.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Logical type of a value or expression, independent of any provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Byte,
    Int32,
    Int64,
    Double,
    String,
    /// Byte sequence (binary data)
    Bytes,
    /// Homogeneous sequence; only meaningful for membership parameters
    Sequence(Box<ValueType>),
}

impl ValueType {
    /// Sequence of the given element type
    pub fn sequence_of(element: ValueType) -> Self {
        ValueType::Sequence(Box::new(element))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Byte | ValueType::Int32 | ValueType::Int64 | ValueType::Double
        )
    }

    /// Element type when this is a sequence
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::Sequence(element) => Some(element),
            _ => None,
        }
    }

    /// Default comparison rule: numerics compare with each other, everything
    /// else only with itself. Sequences never compare.
    pub fn is_comparable_with(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Sequence(_), _) | (_, ValueType::Sequence(_)) => false,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) => a == b,
        }
    }

    /// Whether a value of `self` converts to `target` without loss.
    pub fn widens_to(&self, target: &ValueType) -> bool {
        if self == target {
            return true;
        }
        matches!(
            (self, target),
            (ValueType::Byte, ValueType::Int32)
                | (ValueType::Byte, ValueType::Int64)
                | (ValueType::Byte, ValueType::Double)
                | (ValueType::Byte, ValueType::Bytes)
                | (ValueType::Int32, ValueType::Int64)
                | (ValueType::Int32, ValueType::Double)
                | (ValueType::Int64, ValueType::Double)
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Byte => write!(f, "byte"),
            ValueType::Int32 => write!(f, "int32"),
            ValueType::Int64 => write!(f, "int64"),
            ValueType::Double => write!(f, "double"),
            ValueType::String => write!(f, "string"),
            ValueType::Bytes => write!(f, "bytes"),
            ValueType::Sequence(element) => write!(f, "sequence<{}>", element),
        }
    }
}

/// How values of one logical type are stored by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeMapping {
    /// Provider store type name, e.g. `varbinary(max)` or `BLOB`
    pub store_type: Cow<'static, str>,
    /// Logical type this mapping was resolved for
    pub value_type: ValueType,
}

impl TypeMapping {
    pub fn new(store_type: impl Into<Cow<'static, str>>, value_type: ValueType) -> Self {
        Self {
            store_type: store_type.into(),
            value_type,
        }
    }
}

/// Provider lookup from logical types to storage mappings.
///
/// Implementations are resolved once per provider configuration and shared
/// across every translation, so they must be stateless.
pub trait TypeMappingSource: Send + Sync {
    /// Provider name used in diagnostics
    fn provider_name(&self) -> &'static str;

    /// Mapping for a scalar logical type, `None` when the provider has no
    /// storage representation for it.
    fn find_mapping(&self, value_type: &ValueType) -> Option<TypeMapping>;

    /// Comparison rule for the provider. Defaults to the logical rule.
    fn is_comparable(&self, left: &ValueType, right: &ValueType) -> bool {
        left.is_comparable_with(right)
    }
}
