//! Method-call translators.
//!
//! This module defines the `MethodCallTranslator` trait and
//! `MethodCallTranslatorRegistry` for provider-extensible lowering of method
//! calls into SQL expressions:
//! - `can_translate()` for a cheap check on the method identity
//! - `translate()` for the actual rewrite, returning `None` to decline
//! - `priority()` for ordering
//!
//! Declining is the normal negative result. Errors are reserved for calls
//! whose arguments contradict their own method identity.

mod bytes;
mod enumerable;
mod equals;
mod lowering;
mod math;
mod string;

pub use bytes::ByteArrayMethodTranslator;
pub use enumerable::EnumerableContainsTranslator;
pub use equals::EqualsTranslator;
pub use lowering::SqlTranslator;
pub use math::MathMethodTranslator;
pub use string::StringMethodTranslator;

use crate::error::{QueryError, Result};
use crate::expression::SqlExpr;
use crate::factory::SqlExpressionFactory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Capability that declares a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaringType {
    /// Sequence operators (`Contains`, `First`, ...)
    Enumerable,
    String,
    Math,
    Object,
    Array,
}

/// Identity of a method: declaring capability, name and generic arity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodIdentity {
    pub declaring_type: DeclaringType,
    pub name: String,
    #[serde(default)]
    pub generic_arity: u8,
}

impl MethodIdentity {
    pub fn new(declaring_type: DeclaringType, name: impl Into<String>, generic_arity: u8) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            generic_arity,
        }
    }

    /// Non-generic method
    pub fn simple(declaring_type: DeclaringType, name: impl Into<String>) -> Self {
        Self::new(declaring_type, name, 0)
    }

    pub fn is(&self, declaring_type: DeclaringType, name: &str) -> bool {
        self.declaring_type == declaring_type && self.name == name
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.declaring_type, self.name)?;
        if self.generic_arity > 0 {
            write!(f, "`{}", self.generic_arity)?;
        }
        Ok(())
    }
}

/// Trait for method-call translators.
pub trait MethodCallTranslator: Send + Sync {
    /// Unique name for this translator
    fn name(&self) -> &'static str;

    /// Fast check on the method identity. If false, `translate()` is skipped.
    fn can_translate(&self, method: &MethodIdentity) -> bool;

    /// Rewrite the call, or return `None` when not applicable.
    ///
    /// `instance` is `None` for static methods. Arguments are already
    /// lowered to SQL expressions.
    fn translate(
        &self,
        instance: Option<&SqlExpr>,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>>;

    /// Priority (higher = tried first). Default: 50
    fn priority(&self) -> u8 {
        50
    }
}

/// Registry of translators (sorted by priority descending, registration
/// order among equal priorities).
///
/// The first translator that returns an expression wins.
pub struct MethodCallTranslatorRegistry {
    translators: Vec<Arc<dyn MethodCallTranslator>>,
}

impl Default for MethodCallTranslatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MethodCallTranslatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.translator_names()).finish()
    }
}

impl MethodCallTranslatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            translators: Vec::new(),
        }
    }

    /// Register a translator (re-sorts by priority, stable)
    pub fn register(&mut self, translator: Arc<dyn MethodCallTranslator>) {
        self.translators.push(translator);
        self.translators
            .sort_by_key(|t| std::cmp::Reverse(t.priority()));
    }

    /// Translate using the first translator that accepts the call.
    ///
    /// `Ok(None)` means no translator handled it.
    pub fn translate(
        &self,
        instance: Option<&SqlExpr>,
        method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> Result<Option<SqlExpr>> {
        for translator in &self.translators {
            if !translator.can_translate(method) {
                continue;
            }
            if let Some(expr) = translator.translate(instance, method, arguments, factory)? {
                trace!(translator = translator.name(), %method, "Translated method call");
                return Ok(Some(expr));
            }
        }
        trace!(%method, "No translator handled method call");
        Ok(None)
    }

    /// Get list of registered translator names in trial order
    pub fn translator_names(&self) -> Vec<&'static str> {
        self.translators.iter().map(|t| t.name()).collect()
    }
}

/// Builder for ergonomic registry construction
pub struct MethodCallTranslatorRegistryBuilder {
    translators: Vec<Arc<dyn MethodCallTranslator>>,
}

impl Default for MethodCallTranslatorRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodCallTranslatorRegistryBuilder {
    pub fn new() -> Self {
        Self {
            translators: Vec::new(),
        }
    }

    /// Start from an existing registry's translators
    pub fn from_registry(registry: &MethodCallTranslatorRegistry) -> Self {
        Self {
            translators: registry.translators.clone(),
        }
    }

    /// Add a translator to the registry
    pub fn with_translator(mut self, translator: impl MethodCallTranslator + 'static) -> Self {
        self.translators.push(Arc::new(translator));
        self
    }

    /// Add a shared translator instance
    pub fn with_shared(mut self, translator: Arc<dyn MethodCallTranslator>) -> Self {
        self.translators.push(translator);
        self
    }

    /// Build the registry
    pub fn build(self) -> MethodCallTranslatorRegistry {
        let mut registry = MethodCallTranslatorRegistry::new();
        for translator in self.translators {
            registry.register(translator);
        }
        registry
    }
}

/// Fail with `InvalidMethodCall` unless exactly `expected` arguments were passed
pub(crate) fn expect_arguments(
    method: &MethodIdentity,
    arguments: &[SqlExpr],
    expected: usize,
) -> Result<()> {
    if arguments.len() == expected {
        Ok(())
    } else {
        Err(QueryError::invalid_call(
            method,
            format!("expected {} argument(s), got {}", expected, arguments.len()),
        ))
    }
}

/// Fail with `InvalidMethodCall` when an instance method has no receiver
pub(crate) fn expect_instance<'a>(
    method: &MethodIdentity,
    instance: Option<&'a SqlExpr>,
) -> Result<&'a SqlExpr> {
    instance.ok_or_else(|| QueryError::invalid_call(method, "instance method called without a receiver"))
}
