//! # relq-query
//!
//! Two-phase relational query translation.
//!
//! 1. **Structural translation** lowers a provider-neutral [`ShapedQuery`]
//!    into a [`SelectExpression`] of immutable SQL nodes. Method calls go
//!    through a prioritized [`MethodCallTranslatorRegistry`]; byte-array
//!    containment becomes `CHARINDEX(pattern, haystack) > 0`. The result
//!    depends only on the query shape and can be cached.
//! 2. **Parameter-based postprocessing** specializes that tree for concrete
//!    parameter values: sequence parameters expand into one placeholder per
//!    element, comparisons against null become `IS NULL`, and the processor
//!    reports how far the outcome can be reused ([`Cacheability`]).
//!
//! [`QueryCompiler`] runs both phases, renders command text for SQL Server
//! or SQLite and binds placeholder values.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relq_query::{QueryCompiler, QueryConfig, QueryExpression, ShapedQuery, ValueType, Value};
//! use relq_query::expression::SqlBinaryOperator;
//! use std::collections::HashMap;
//!
//! let compiler = QueryCompiler::from_config(&QueryConfig::default())?;
//! let shape = ShapedQuery::from_table("Blogs", "b")
//!     .project("Id", QueryExpression::column("b", "Id", ValueType::Int32))
//!     .filter(QueryExpression::binary(
//!         SqlBinaryOperator::Equal,
//!         QueryExpression::nullable_column("b", "Name", ValueType::String),
//!         QueryExpression::parameter("name", ValueType::String),
//!     ));
//! let values = HashMap::from([("name".to_string(), Value::from("rust"))]);
//!
//! let command = compiler.compile(&shape, &values)?;
//! println!("{}", command.command_text);
//! # Ok::<(), relq_query::QueryError>(())
//! ```

pub mod cache;
pub mod compiler;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod expression;
pub mod factory;
pub mod naming;
pub mod postprocess;
pub mod providers;
pub mod query;
pub mod render;
pub mod translate;
pub mod types;
pub mod value;

pub use cache::{PlanCache, PlanCacheStats};
pub use compiler::{BoundParameter, CompiledCommand, FinalizedPlan, QueryCompiler};
pub use config::{ConfigError, PlanCacheConfig, QueryConfig};
pub use dependencies::TranslationDependencies;
pub use error::{QueryError, Result};
pub use expression::{SelectExpression, SqlExpr, SqlExpression};
pub use factory::SqlExpressionFactory;
pub use naming::{
    DefaultParameterNameGeneratorFactory, ParameterNameGenerator, ParameterNameGeneratorFactory,
};
pub use postprocess::{
    Cacheability, CommandParameter, ParameterBasedSqlProcessor, ParameterProcessingOptions,
    ProcessedQuery,
};
pub use providers::SqlDialect;
pub use query::{QueryExpression, ShapedQuery};
pub use render::{QueryRenderer, QuerySqlGenerator};
pub use translate::{
    DeclaringType, MethodCallTranslator, MethodCallTranslatorRegistry,
    MethodCallTranslatorRegistryBuilder, MethodIdentity, SqlTranslator,
};
pub use types::{TypeMapping, TypeMappingSource, ValueType};
pub use value::{ParameterValues, Value};
