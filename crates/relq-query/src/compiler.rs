//! End-to-end query compilation.
//!
//! `QueryCompiler` runs both phases for one execution: the structural
//! translation of the shape (cached per shape) and the parameter-based
//! finalization plus rendering (cached per shape and nullness signature
//! when the postprocessor allows it). Binding values to the finalized
//! plan's placeholders happens on every call.

use crate::cache::PlanCache;
use crate::config::{ConfigError, QueryConfig};
use crate::dependencies::TranslationDependencies;
use crate::error::{QueryError, Result};
use crate::expression::SelectExpression;
use crate::postprocess::{
    Cacheability, CommandParameter, ParameterBasedSqlProcessor, ParameterProcessingOptions,
};
use crate::query::ShapedQuery;
use crate::render::{QueryRenderer, QuerySqlGenerator};
use crate::translate::SqlTranslator;
use crate::value::{ParameterValues, Value};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A finalized, rendered query whose placeholders are not yet bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedPlan {
    pub select: SelectExpression,
    pub command_text: String,
    pub parameters: Vec<CommandParameter>,
    pub cacheability: Cacheability,
}

impl FinalizedPlan {
    /// Resolve every placeholder against `values`, in command order
    pub fn bind(&self, values: &ParameterValues) -> Result<Vec<BoundParameter>> {
        self.parameters
            .iter()
            .map(|parameter| {
                Ok(BoundParameter {
                    name: parameter.name.clone(),
                    store_type: parameter.type_mapping.store_type.to_string(),
                    value: parameter.source.resolve(values)?,
                })
            })
            .collect()
    }
}

/// A placeholder with the value to send for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundParameter {
    pub name: String,
    pub store_type: String,
    pub value: Value,
}

/// Ready-to-execute command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledCommand {
    pub command_text: String,
    pub parameters: Vec<BoundParameter>,
    pub cacheability: Cacheability,
}

pub struct QueryCompiler {
    dependencies: TranslationDependencies,
    processor: ParameterBasedSqlProcessor,
    renderer: Arc<dyn QueryRenderer>,
    cache: Option<PlanCache>,
}

impl std::fmt::Debug for QueryCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCompiler")
            .field("dependencies", &self.dependencies)
            .field("renderer", &self.renderer.name())
            .field("cache", &self.cache)
            .finish()
    }
}

impl QueryCompiler {
    /// Compiler without a plan cache
    pub fn new(
        dependencies: TranslationDependencies,
        options: ParameterProcessingOptions,
        renderer: Arc<dyn QueryRenderer>,
    ) -> Self {
        let processor = ParameterBasedSqlProcessor::new(&dependencies, options);
        Self {
            dependencies,
            processor,
            renderer,
            cache: None,
        }
    }

    pub fn with_plan_cache(mut self, cache: PlanCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Built-in wiring for a configuration. The configuration is validated
    /// here as well, since it need not come from `QueryConfig::load`.
    pub fn from_config(config: &QueryConfig) -> Result<Self> {
        config.validate().map_err(|err| match err {
            ConfigError::Invalid(message) => QueryError::InvalidConfiguration(message),
            other => QueryError::InvalidConfiguration(other.to_string()),
        })?;
        let dependencies =
            TranslationDependencies::for_dialect(config.provider, &config.parameter_prefix)?;
        let options = ParameterProcessingOptions::default()
            .with_use_relational_nulls(config.use_relational_nulls);
        let compiler = Self::new(
            dependencies,
            options,
            Arc::new(QuerySqlGenerator::new(config.provider)),
        );

        info!(
            provider = %config.provider,
            relational_nulls = config.use_relational_nulls,
            plan_cache = config.plan_cache.enabled,
            "Query compiler configured"
        );

        Ok(if config.plan_cache.enabled {
            compiler.with_plan_cache(PlanCache::new(config.plan_cache.max_entries))
        } else {
            compiler
        })
    }

    pub fn dependencies(&self) -> &TranslationDependencies {
        &self.dependencies
    }

    pub fn plan_cache(&self) -> Option<&PlanCache> {
        self.cache.as_ref()
    }

    /// Structural translation of `shape`, shared across executions when
    /// the plan cache is enabled
    pub fn translate(&self, shape: &ShapedQuery) -> Result<Arc<SelectExpression>> {
        match &self.cache {
            Some(cache) => cache
                .shape_entry(shape)
                .translation(|| self.translate_uncached(shape)),
            None => self.translate_uncached(shape).map(Arc::new),
        }
    }

    /// Finalized plan for `shape` under `values`
    pub fn finalize(&self, shape: &ShapedQuery, values: &ParameterValues) -> Result<Arc<FinalizedPlan>> {
        if let Some(name) = shape
            .parameters()
            .into_keys()
            .find(|name| !values.contains_key(name))
        {
            return Err(QueryError::MissingParameter { name });
        }

        let Some(cache) = &self.cache else {
            let select = self.translate_uncached(shape)?;
            return self.finalize_select(&select, values).map(Arc::new);
        };

        let entry = cache.shape_entry(shape);
        if let Some(plan) = cache.lookup(&entry, values) {
            return Ok(plan);
        }
        let select = entry.translation(|| self.translate_uncached(shape))?;
        let plan = Arc::new(self.finalize_select(&select, values)?);
        cache.store(&entry, &plan, values);
        Ok(plan)
    }

    pub fn compile(&self, shape: &ShapedQuery, values: &ParameterValues) -> Result<CompiledCommand> {
        let plan = self.finalize(shape, values)?;
        Ok(CompiledCommand {
            command_text: plan.command_text.clone(),
            parameters: plan.bind(values)?,
            cacheability: plan.cacheability.clone(),
        })
    }

    fn translate_uncached(&self, shape: &ShapedQuery) -> Result<SelectExpression> {
        SqlTranslator::new(&self.dependencies).translate_query(shape)
    }

    fn finalize_select(&self, select: &SelectExpression, values: &ParameterValues) -> Result<FinalizedPlan> {
        let processed = self.processor.process(select, values)?;
        let command_text = self.renderer.render(&processed.select)?;
        debug!(
            renderer = self.renderer.name(),
            parameters = processed.parameters.len(),
            "Rendered command"
        );
        Ok(FinalizedPlan {
            select: processed.select,
            command_text,
            parameters: processed.parameters,
            cacheability: processed.cacheability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::SqlBinaryOperator;
    use crate::providers::SqlDialect;
    use crate::query::QueryExpression;
    use crate::types::ValueType;
    use test_case::test_case;

    fn compiler(provider: SqlDialect) -> QueryCompiler {
        QueryCompiler::from_config(&QueryConfig {
            provider,
            ..QueryConfig::default()
        })
        .unwrap()
    }

    fn by_name() -> ShapedQuery {
        ShapedQuery::from_table("Blogs", "b")
            .project("Id", QueryExpression::column("b", "Id", ValueType::Int32))
            .filter(QueryExpression::binary(
                SqlBinaryOperator::Equal,
                QueryExpression::nullable_column("b", "Name", ValueType::String),
                QueryExpression::parameter("name", ValueType::String),
            ))
    }

    fn name(value: Value) -> ParameterValues {
        ParameterValues::from([("name".to_string(), value)])
    }

    #[test]
    fn test_compile_binds_values() {
        let command = compiler(SqlDialect::SqlServer)
            .compile(&by_name(), &name(Value::from("rust")))
            .unwrap();

        assert_eq!(
            command.command_text,
            "SELECT [b].[Id] AS [Id] FROM [Blogs] AS [b] WHERE [b].[Name] = @p0"
        );
        assert_eq!(
            command.parameters,
            vec![BoundParameter {
                name: "p0".into(),
                store_type: "nvarchar(max)".into(),
                value: Value::from("rust"),
            }]
        );
    }

    #[test]
    fn test_cached_plan_is_rebound() {
        let compiler = compiler(SqlDialect::Sqlite);

        let first = compiler.compile(&by_name(), &name(Value::from("a"))).unwrap();
        let second = compiler.compile(&by_name(), &name(Value::from("b"))).unwrap();
        let null = compiler.compile(&by_name(), &name(Value::Null)).unwrap();

        assert_eq!(first.command_text, second.command_text);
        assert_eq!(second.parameters[0].value, Value::from("b"));
        assert!(null.command_text.ends_with("WHERE \"b\".\"Name\" IS NULL"));
        assert!(null.parameters.is_empty());

        let stats = compiler.plan_cache().unwrap().stats();
        assert_eq!(stats.shapes, 1);
        assert_eq!(stats.plans, 2);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_missing_parameter() {
        let err = compiler(SqlDialect::SqlServer)
            .compile(&by_name(), &ParameterValues::new())
            .unwrap_err();

        assert_eq!(err, QueryError::MissingParameter { name: "name".into() });
    }

    #[test]
    fn test_uncached_compiler_matches_cached() {
        let config = QueryConfig {
            plan_cache: crate::config::PlanCacheConfig {
                enabled: false,
                max_entries: 0,
            },
            ..QueryConfig::default()
        };
        let uncached = QueryCompiler::from_config(&config).unwrap();
        let values = name(Value::from("x"));

        assert!(uncached.plan_cache().is_none());
        assert_eq!(
            uncached.compile(&by_name(), &values).unwrap(),
            compiler(SqlDialect::SqlServer).compile(&by_name(), &values).unwrap()
        );
    }

    #[test_case("x; DROP", true, 16 ; "prefix is not an identifier")]
    #[test_case("", true, 16 ; "empty prefix")]
    #[test_case("p", true, 0 ; "enabled cache without room")]
    fn test_from_config_rejects_invalid_settings(prefix: &str, enabled: bool, max_entries: usize) {
        let config = QueryConfig {
            parameter_prefix: prefix.to_string(),
            plan_cache: crate::config::PlanCacheConfig {
                enabled,
                max_entries,
            },
            ..QueryConfig::default()
        };

        let err = QueryCompiler::from_config(&config).unwrap_err();

        assert!(matches!(err, QueryError::InvalidConfiguration(_)), "{:?}", err);
    }

    #[test]
    fn test_shapes_beyond_limit_still_compile() {
        let compiler = QueryCompiler::from_config(&QueryConfig {
            plan_cache: crate::config::PlanCacheConfig {
                enabled: true,
                max_entries: 2,
            },
            ..QueryConfig::default()
        })
        .unwrap();

        for rating in 0..50 {
            let shape = ShapedQuery::from_table("Blogs", "b")
                .project("Id", QueryExpression::column("b", "Id", ValueType::Int32))
                .filter(QueryExpression::binary(
                    SqlBinaryOperator::GreaterThan,
                    QueryExpression::column("b", "Rating", ValueType::Int32),
                    QueryExpression::constant(Value::Int(rating)),
                ));
            let command = compiler.compile(&shape, &ParameterValues::new()).unwrap();
            assert!(command.command_text.ends_with(&format!("[b].[Rating] > {}", rating)));
        }

        let stats = compiler.plan_cache().unwrap().stats();
        assert_eq!(stats.shapes, 2);
        assert_eq!(stats.plans, 2);
    }

    #[test]
    fn test_translation_is_shared() {
        let compiler = compiler(SqlDialect::SqlServer);

        let a = compiler.translate(&by_name()).unwrap();
        let b = compiler.translate(&by_name()).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
    }
}
