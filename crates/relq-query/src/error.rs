//! Error types for query translation and parameter processing.

use crate::types::ValueType;
use thiserror::Error;

/// Result type alias for translation operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors raised while lowering or specializing a query.
///
/// All variants are fatal to the current translation or execution attempt.
/// A translator declining a method call is not an error and never shows up
/// here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// A logical type has no storage representation in the active provider
    #[error("No type mapping for {value_type} in provider '{provider}'")]
    UnmappableType {
        value_type: ValueType,
        provider: &'static str,
    },

    /// A value carries no logical type to resolve a mapping from (untyped null)
    #[error("Cannot infer a logical type for {what}")]
    UnknownType { what: String },

    /// A constant value has no literal form in SQL (NaN, infinities)
    #[error("Constant {value} cannot be written as a SQL literal")]
    UnrepresentableConstant { value: String },

    /// Two operands were combined in a way the provider cannot compare or convert
    #[error("Type mismatch in {operation}: {left} vs {right}")]
    TypeMismatch {
        operation: String,
        left: ValueType,
        right: ValueType,
    },

    /// A bound value cannot be expanded or bound under the provider rules
    #[error("Unsupported value shape for parameter '{parameter}': {message}")]
    UnsupportedParameterShape { parameter: String, message: String },

    /// A method call reached a translator with arguments its identity rules out
    #[error("Invalid call to {method}: {message}")]
    InvalidMethodCall { method: String, message: String },

    /// No translator handled part of the query shape
    #[error("Expression could not be translated: {expression}")]
    Untranslatable { expression: String },

    /// A parameter referenced by the query has no value in the binding
    #[error("No value bound for parameter '{name}'")]
    MissingParameter { name: String },

    /// Compiler settings failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl QueryError {
    pub(crate) fn unsupported_shape(parameter: &str, message: impl Into<String>) -> Self {
        Self::UnsupportedParameterShape {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_call(method: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidMethodCall {
            method: method.to_string(),
            message: message.into(),
        }
    }
}
