//! Plan cache behavior under concurrent first access.

use relq_query::expression::SqlBinaryOperator;
use relq_query::{
    DeclaringType, MethodCallTranslator, MethodCallTranslatorRegistryBuilder, MethodIdentity,
    ParameterProcessingOptions, ParameterValues, PlanCache, QueryCompiler, QueryExpression,
    QuerySqlGenerator, ShapedQuery, SqlDialect, SqlExpr, SqlExpressionFactory,
    TranslationDependencies, Value, ValueType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Translates `Object.IsPositive(x)` as `x > 0`, counting invocations
#[derive(Default)]
struct CountingTranslator {
    calls: AtomicUsize,
}

impl MethodCallTranslator for CountingTranslator {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn can_translate(&self, method: &MethodIdentity) -> bool {
        method.is(DeclaringType::Object, "IsPositive")
    }

    fn translate(
        &self,
        _instance: Option<&SqlExpr>,
        _method: &MethodIdentity,
        arguments: &[SqlExpr],
        factory: &SqlExpressionFactory,
    ) -> relq_query::Result<Option<SqlExpr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Widen the race window between concurrent first executions.
        thread::sleep(Duration::from_millis(20));
        let zero = factory.constant(Value::Int(0))?;
        factory.greater_than(SqlExpr::clone(&arguments[0]), zero).map(Some)
    }

    fn priority(&self) -> u8 {
        90
    }
}

fn compiler(counter: &Arc<CountingTranslator>, max_entries: usize) -> QueryCompiler {
    let dependencies = TranslationDependencies::for_dialect(SqlDialect::SqlServer, "p").unwrap();
    let registry = MethodCallTranslatorRegistryBuilder::from_registry(&dependencies.method_call_translators)
        .with_shared(Arc::clone(counter) as Arc<dyn MethodCallTranslator>)
        .build();
    QueryCompiler::new(
        dependencies.with_method_call_translators(Arc::new(registry)),
        ParameterProcessingOptions::default(),
        Arc::new(QuerySqlGenerator::new(SqlDialect::SqlServer)),
    )
    .with_plan_cache(PlanCache::new(max_entries))
}

fn shape() -> ShapedQuery {
    ShapedQuery::from_table("Blogs", "b")
        .project("Id", QueryExpression::column("b", "Id", ValueType::Int32))
        .filter(QueryExpression::call(
            MethodIdentity::simple(DeclaringType::Object, "IsPositive"),
            vec![QueryExpression::column("b", "Rating", ValueType::Int32)],
        ))
        .filter(QueryExpression::binary(
            SqlBinaryOperator::Equal,
            QueryExpression::nullable_column("b", "Name", ValueType::String),
            QueryExpression::parameter("name", ValueType::String),
        ))
}

fn name(i: usize) -> ParameterValues {
    let value = if i % 2 == 0 {
        Value::Null
    } else {
        Value::Text(format!("blog-{}", i))
    };
    ParameterValues::from([("name".to_string(), value)])
}

#[test]
fn test_concurrent_first_access_translates_once() {
    let counter = Arc::new(CountingTranslator::default());
    let compiler = compiler(&counter, 16);
    let shape = shape();

    let texts: Vec<Vec<String>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let compiler = &compiler;
                let shape = &shape;
                scope.spawn(move || {
                    (0..20)
                        .map(|i| {
                            compiler
                                .compile(shape, &name(t * 20 + i))
                                .unwrap()
                                .command_text
                        })
                        .collect()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

    let stats = compiler.plan_cache().unwrap().stats();
    assert_eq!(stats.shapes, 1);
    assert_eq!(stats.plans, 2);
    assert_eq!(stats.hits + stats.misses, 160);

    let distinct: std::collections::BTreeSet<_> = texts.into_iter().flatten().collect();
    assert_eq!(
        distinct.into_iter().collect::<Vec<_>>(),
        vec![
            "SELECT [b].[Id] AS [Id] FROM [Blogs] AS [b] WHERE [b].[Rating] > 0 AND [b].[Name] = @p0"
                .to_string(),
            "SELECT [b].[Id] AS [Id] FROM [Blogs] AS [b] WHERE [b].[Rating] > 0 AND [b].[Name] IS NULL"
                .to_string(),
        ]
    );
}

#[test]
fn test_bound_values_follow_each_call() {
    let counter = Arc::new(CountingTranslator::default());
    let compiler = compiler(&counter, 16);
    let shape = shape();

    thread::scope(|scope| {
        for t in 0..4 {
            let compiler = &compiler;
            let shape = &shape;
            scope.spawn(move || {
                for i in (1..40).step_by(2) {
                    let values = name(t * 40 + i);
                    let command = compiler.compile(shape, &values).unwrap();
                    assert_eq!(command.parameters.len(), 1);
                    assert_eq!(command.parameters[0].value, values["name"]);
                }
            });
        }
    });

    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_full_cache_still_compiles() {
    let counter = Arc::new(CountingTranslator::default());
    let compiler = compiler(&counter, 1);

    let null = compiler.compile(&shape(), &name(0)).unwrap();
    let bound = compiler.compile(&shape(), &name(1)).unwrap();
    let again = compiler.compile(&shape(), &name(3)).unwrap();

    assert!(null.command_text.ends_with("IS NULL"));
    assert!(bound.command_text.ends_with("= @p0"));
    assert_eq!(again.command_text, bound.command_text);
    assert_eq!(compiler.plan_cache().unwrap().stats().plans, 1);
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
}
