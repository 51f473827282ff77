//! Dependency bundle for the translation pipeline.
//!
//! Assembled once per provider configuration and shared by every
//! translation and processing pass. Replacing one collaborator (a custom
//! translator set, a different name prefix) goes through the `with_*`
//! methods, which return a new bundle and leave the original untouched.

use crate::error::Result;
use crate::factory::SqlExpressionFactory;
use crate::naming::{DefaultParameterNameGeneratorFactory, ParameterNameGeneratorFactory};
use crate::providers::SqlDialect;
use crate::translate::MethodCallTranslatorRegistry;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct TranslationDependencies {
    pub sql_expression_factory: Arc<SqlExpressionFactory>,
    pub parameter_name_generator_factory: Arc<dyn ParameterNameGeneratorFactory>,
    pub method_call_translators: Arc<MethodCallTranslatorRegistry>,
}

impl fmt::Debug for TranslationDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationDependencies")
            .field("sql_expression_factory", &self.sql_expression_factory)
            .field("method_call_translators", &self.method_call_translators)
            .finish_non_exhaustive()
    }
}

impl TranslationDependencies {
    pub fn new(
        sql_expression_factory: Arc<SqlExpressionFactory>,
        parameter_name_generator_factory: Arc<dyn ParameterNameGeneratorFactory>,
        method_call_translators: Arc<MethodCallTranslatorRegistry>,
    ) -> Self {
        Self {
            sql_expression_factory,
            parameter_name_generator_factory,
            method_call_translators,
        }
    }

    /// Built-in wiring for a dialect
    pub fn for_dialect(dialect: SqlDialect, parameter_prefix: &str) -> Result<Self> {
        let factory = SqlExpressionFactory::new(dialect.type_mappings())?;
        Ok(Self::new(
            Arc::new(factory),
            Arc::new(DefaultParameterNameGeneratorFactory::new(parameter_prefix)),
            Arc::new(dialect.method_call_translators()),
        ))
    }

    pub fn with_sql_expression_factory(&self, factory: Arc<SqlExpressionFactory>) -> Self {
        Self {
            sql_expression_factory: factory,
            ..self.clone()
        }
    }

    pub fn with_parameter_name_generator_factory(
        &self,
        factory: Arc<dyn ParameterNameGeneratorFactory>,
    ) -> Self {
        Self {
            parameter_name_generator_factory: factory,
            ..self.clone()
        }
    }

    pub fn with_method_call_translators(&self, registry: Arc<MethodCallTranslatorRegistry>) -> Self {
        Self {
            method_call_translators: registry,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::MethodCallTranslatorRegistryBuilder;

    #[test]
    fn test_dialect_wiring() {
        let deps = TranslationDependencies::for_dialect(SqlDialect::Sqlite, "p").unwrap();

        assert_eq!(deps.sql_expression_factory.provider_name(), "sqlite");
        assert_eq!(
            deps.method_call_translators.translator_names(),
            vec!["byte_array", "enumerable_contains", "string", "math", "equals"]
        );
        assert_eq!(
            deps.parameter_name_generator_factory.create().generate_next(),
            "p0"
        );
    }

    #[test]
    fn test_with_replaces_only_one_field() {
        let deps = TranslationDependencies::for_dialect(SqlDialect::SqlServer, "p").unwrap();
        let empty = Arc::new(MethodCallTranslatorRegistryBuilder::new().build());

        let replaced = deps.with_method_call_translators(Arc::clone(&empty));

        assert!(replaced.method_call_translators.translator_names().is_empty());
        assert!(Arc::ptr_eq(
            &replaced.sql_expression_factory,
            &deps.sql_expression_factory
        ));
        assert_eq!(deps.method_call_translators.translator_names().len(), 5);
    }
}
