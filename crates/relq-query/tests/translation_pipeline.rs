//! End-to-end compilation: shape → SQL expression tree → finalized plan →
//! command text, for both built-in dialects.

use relq_query::expression::SqlBinaryOperator;
use relq_query::{
    Cacheability, DeclaringType, MethodIdentity, ParameterValues, QueryCompiler, QueryConfig,
    QueryError, QueryExpression, ShapedQuery, SqlDialect, Value, ValueType,
};
use test_case::test_case;

fn compiler(provider: SqlDialect) -> QueryCompiler {
    QueryCompiler::from_config(&QueryConfig {
        provider,
        ..QueryConfig::default()
    })
    .unwrap()
}

fn contains() -> MethodIdentity {
    MethodIdentity::new(DeclaringType::Enumerable, "Contains", 1)
}

fn blogs() -> ShapedQuery {
    ShapedQuery::from_table("Blogs", "b")
        .project("Id", QueryExpression::column("b", "Id", ValueType::Int32))
}

fn bind(pairs: &[(&str, Value)]) -> ParameterValues {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

// ============================================================================
// Byte-array containment
// ============================================================================

#[test_case(SqlDialect::SqlServer, "SELECT [b].[Id] AS [Id] FROM [Blogs] AS [b] WHERE CHARINDEX(0x42, [b].[Data]) > 0" ; "sqlserver")]
#[test_case(SqlDialect::Sqlite, "SELECT \"b\".\"Id\" AS \"Id\" FROM \"Blogs\" AS \"b\" WHERE instr(\"b\".\"Data\", X'42') > 0" ; "sqlite")]
fn test_byte_contains_constant(provider: SqlDialect, expected: &str) {
    let shape = blogs().filter(QueryExpression::call(
        contains(),
        vec![
            QueryExpression::column("b", "Data", ValueType::Bytes),
            QueryExpression::constant(Value::Byte(0x42)),
        ],
    ));

    let command = compiler(provider).compile(&shape, &ParameterValues::new()).unwrap();

    assert_eq!(command.command_text, expected);
    assert!(command.parameters.is_empty());
    assert_eq!(command.cacheability, Cacheability::ByShape);
}

#[test]
fn test_byte_contains_parameter() {
    let shape = blogs().filter(QueryExpression::call(
        contains(),
        vec![
            QueryExpression::column("b", "Data", ValueType::Bytes),
            QueryExpression::parameter("needle", ValueType::Byte),
        ],
    ));

    let command = compiler(SqlDialect::SqlServer)
        .compile(&shape, &bind(&[("needle", Value::Byte(0x42))]))
        .unwrap();

    assert!(command
        .command_text
        .ends_with("WHERE CHARINDEX(@p0, [b].[Data]) > 0"));
    assert_eq!(command.parameters.len(), 1);
    assert_eq!(command.parameters[0].store_type, "varbinary(max)");
    assert_eq!(command.parameters[0].value, Value::Bytes(vec![0x42]));
}

#[test]
fn test_byte_contains_wrong_element_type() {
    let shape = blogs().filter(QueryExpression::call(
        contains(),
        vec![
            QueryExpression::column("b", "Data", ValueType::Bytes),
            QueryExpression::constant("B"),
        ],
    ));

    let err = compiler(SqlDialect::SqlServer)
        .compile(&shape, &ParameterValues::new())
        .unwrap_err();

    assert!(matches!(err, QueryError::InvalidMethodCall { .. }));
}

// ============================================================================
// Sequence membership
// ============================================================================

fn id_in(negated: bool) -> ShapedQuery {
    let membership = QueryExpression::call(
        contains(),
        vec![
            QueryExpression::parameter("ids", ValueType::sequence_of(ValueType::Int32)),
            QueryExpression::column("b", "Id", ValueType::Int32),
        ],
    );
    blogs().filter(if negated {
        QueryExpression::not(membership)
    } else {
        membership
    })
}

#[test]
fn test_sequence_length_changes_command_text() {
    let compiler = compiler(SqlDialect::SqlServer);
    let three = Value::List((1..=3).map(Value::Int).collect());
    let five = Value::List((1..=5).map(Value::Int).collect());

    let a = compiler.compile(&id_in(false), &bind(&[("ids", three)])).unwrap();
    let b = compiler.compile(&id_in(false), &bind(&[("ids", five)])).unwrap();

    assert!(a.command_text.ends_with("WHERE [b].[Id] IN (@p0, @p1, @p2)"));
    assert!(b.command_text.ends_with("WHERE [b].[Id] IN (@p0, @p1, @p2, @p3, @p4)"));
    assert_eq!(a.cacheability, Cacheability::PerValues);
    assert_eq!(
        b.parameters.iter().map(|p| p.value.clone()).collect::<Vec<_>>(),
        (1..=5).map(Value::Int).collect::<Vec<_>>()
    );
    assert_eq!(compiler.plan_cache().unwrap().stats().plans, 0);
}

#[test]
fn test_negated_empty_sequence_drops_filter() {
    let command = compiler(SqlDialect::Sqlite)
        .compile(&id_in(true), &bind(&[("ids", Value::List(vec![]))]))
        .unwrap();

    assert_eq!(
        command.command_text,
        "SELECT \"b\".\"Id\" AS \"Id\" FROM \"Blogs\" AS \"b\""
    );
}

fn parent_in(negated: bool) -> ShapedQuery {
    let membership = QueryExpression::call(
        contains(),
        vec![
            QueryExpression::parameter("ids", ValueType::sequence_of(ValueType::Int32)),
            QueryExpression::nullable_column("b", "ParentId", ValueType::Int32),
        ],
    );
    blogs().filter(if negated {
        QueryExpression::not(membership)
    } else {
        membership
    })
}

#[test]
fn test_sequence_with_null_element() {
    let compiler = compiler(SqlDialect::SqlServer);
    let ids = bind(&[("ids", Value::List(vec![Value::Int(4), Value::Null]))]);

    let non_nullable = compiler.compile(&id_in(false), &ids).unwrap();
    let nullable = compiler.compile(&parent_in(false), &ids).unwrap();

    assert!(non_nullable.command_text.ends_with("WHERE [b].[Id] IN (@p0)"));
    assert!(nullable
        .command_text
        .ends_with("WHERE [b].[ParentId] IN (@p0) OR [b].[ParentId] IS NULL"));
}

#[test_case(vec![Value::Int(1), Value::Int(2)], "WHERE [b].[ParentId] NOT IN (@p0, @p1) OR [b].[ParentId] IS NULL" ; "no null element")]
#[test_case(vec![Value::Int(1), Value::Null], "WHERE [b].[ParentId] NOT IN (@p0) AND [b].[ParentId] IS NOT NULL" ; "null element")]
fn test_negated_membership_on_nullable_column(ids: Vec<Value>, expected: &str) {
    let command = compiler(SqlDialect::SqlServer)
        .compile(&parent_in(true), &bind(&[("ids", Value::List(ids))]))
        .unwrap();

    assert!(command.command_text.ends_with(expected), "{}", command.command_text);
    assert_eq!(command.cacheability, Cacheability::PerValues);
}

#[test]
fn test_negated_empty_sequence_on_nullable_column() {
    let command = compiler(SqlDialect::Sqlite)
        .compile(&parent_in(true), &bind(&[("ids", Value::List(vec![]))]))
        .unwrap();

    assert!(!command.command_text.contains("WHERE"));
}

// ============================================================================
// Null semantics
// ============================================================================

fn by_name() -> ShapedQuery {
    blogs().filter(QueryExpression::binary(
        SqlBinaryOperator::Equal,
        QueryExpression::nullable_column("b", "Name", ValueType::String),
        QueryExpression::parameter("name", ValueType::String),
    ))
}

#[test]
fn test_null_binding_same_shape() {
    let compiler = compiler(SqlDialect::SqlServer);

    let null = compiler.compile(&by_name(), &bind(&[("name", Value::Null)])).unwrap();
    let bound = compiler
        .compile(&by_name(), &bind(&[("name", Value::from("rust"))]))
        .unwrap();

    assert!(null.command_text.ends_with("WHERE [b].[Name] IS NULL"));
    assert!(bound.command_text.ends_with("WHERE [b].[Name] = @p0"));
    assert_eq!(null.cacheability, bound.cacheability);
}

#[test]
fn test_nullable_columns_compared() {
    let shape = blogs().filter(QueryExpression::binary(
        SqlBinaryOperator::NotEqual,
        QueryExpression::nullable_column("b", "Name", ValueType::String),
        QueryExpression::nullable_column("b", "Title", ValueType::String),
    ));
    let relational = QueryCompiler::from_config(&QueryConfig {
        use_relational_nulls: true,
        ..QueryConfig::default()
    })
    .unwrap();

    let expanded = compiler(SqlDialect::SqlServer)
        .compile(&shape, &ParameterValues::new())
        .unwrap();
    let plain = relational.compile(&shape, &ParameterValues::new()).unwrap();

    assert!(expanded.command_text.ends_with(
        "WHERE ([b].[Name] <> [b].[Title] OR [b].[Name] IS NULL OR [b].[Title] IS NULL) \
         AND ([b].[Name] IS NOT NULL OR [b].[Title] IS NOT NULL)"
    ));
    assert!(plain.command_text.ends_with("WHERE [b].[Name] <> [b].[Title]"));
}

#[test]
fn test_negated_equality_of_nullable_columns() {
    let shape = blogs().filter(QueryExpression::not(QueryExpression::binary(
        SqlBinaryOperator::Equal,
        QueryExpression::nullable_column("b", "Name", ValueType::String),
        QueryExpression::nullable_column("b", "Title", ValueType::String),
    )));

    let command = compiler(SqlDialect::SqlServer)
        .compile(&shape, &ParameterValues::new())
        .unwrap();

    assert!(command.command_text.ends_with(
        "WHERE ([b].[Name] <> [b].[Title] OR [b].[Name] IS NULL OR [b].[Title] IS NULL) \
         AND ([b].[Name] IS NOT NULL OR [b].[Title] IS NOT NULL)"
    ));
}

#[test]
fn test_negated_equality_with_parameter() {
    let shape = blogs().filter(QueryExpression::not(QueryExpression::binary(
        SqlBinaryOperator::Equal,
        QueryExpression::nullable_column("b", "Name", ValueType::String),
        QueryExpression::parameter("name", ValueType::String),
    )));
    let compiler = compiler(SqlDialect::SqlServer);

    let bound = compiler.compile(&shape, &bind(&[("name", Value::from("x"))])).unwrap();
    let null = compiler.compile(&shape, &bind(&[("name", Value::Null)])).unwrap();

    assert!(bound
        .command_text
        .ends_with("WHERE [b].[Name] <> @p0 OR [b].[Name] IS NULL"));
    assert!(null.command_text.ends_with("WHERE [b].[Name] IS NOT NULL"));
}

#[test]
fn test_negated_conjunction_with_nullable_operand() {
    let shape = blogs().filter(QueryExpression::not(QueryExpression::binary(
        SqlBinaryOperator::AndAlso,
        QueryExpression::binary(
            SqlBinaryOperator::Equal,
            QueryExpression::nullable_column("b", "Name", ValueType::String),
            QueryExpression::nullable_column("b", "Title", ValueType::String),
        ),
        QueryExpression::binary(
            SqlBinaryOperator::GreaterThan,
            QueryExpression::column("b", "Rating", ValueType::Int32),
            QueryExpression::constant(Value::Int(3)),
        ),
    )));

    let command = compiler(SqlDialect::Sqlite)
        .compile(&shape, &ParameterValues::new())
        .unwrap();

    assert!(command.command_text.ends_with(
        "WHERE ((\"b\".\"Name\" <> \"b\".\"Title\" OR \"b\".\"Name\" IS NULL OR \"b\".\"Title\" IS NULL) \
         AND (\"b\".\"Name\" IS NOT NULL OR \"b\".\"Title\" IS NOT NULL)) OR \"b\".\"Rating\" <= 3"
    ), "{}", command.command_text);
}

// ============================================================================
// Other translators and rendering
// ============================================================================

#[test]
fn test_starts_with_constant_and_limit() {
    let shape = blogs()
        .filter(QueryExpression::call_on(
            QueryExpression::column("b", "Name", ValueType::String),
            MethodIdentity::simple(DeclaringType::String, "StartsWith"),
            vec![QueryExpression::constant("ab%")],
        ))
        .order_by(QueryExpression::column("b", "Id", ValueType::Int32), false)
        .take(QueryExpression::parameter("n", ValueType::Int32));

    let command = compiler(SqlDialect::SqlServer)
        .compile(&shape, &bind(&[("n", Value::Int(10))]))
        .unwrap();

    assert_eq!(
        command.command_text,
        "SELECT TOP(@p0) [b].[Id] AS [Id] FROM [Blogs] AS [b] \
         WHERE [b].[Name] LIKE N'ab\\%%' ESCAPE N'\\' ORDER BY [b].[Id] DESC"
    );
    assert_eq!(command.parameters[0].value, Value::Int(10));
}

#[test]
fn test_unknown_method_is_untranslatable() {
    let shape = blogs().filter(QueryExpression::call(
        MethodIdentity::simple(DeclaringType::Object, "Frobnicate"),
        vec![QueryExpression::column("b", "Id", ValueType::Int32)],
    ));

    let err = compiler(SqlDialect::Sqlite)
        .compile(&shape, &ParameterValues::new())
        .unwrap_err();

    assert!(matches!(err, QueryError::Untranslatable { .. }));
}

#[test]
fn test_wrong_binding_type() {
    let err = compiler(SqlDialect::SqlServer)
        .compile(&by_name(), &bind(&[("name", Value::Int(3))]))
        .unwrap_err();

    assert!(matches!(err, QueryError::TypeMismatch { .. }));
}
