// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the complete query expression to SQL IR to SQL pipeline

use anyhow::Result;
use lambda_sql::builder::{constant, object, var};
use lambda_sql::*;

fn sql(query: Query) -> Result<String> {
    get_query_text(query.expr())
}

fn translation_error(query: Query) -> TranslationError {
    let err = get_query_text(query.expr()).unwrap_err();
    match err.downcast_ref::<TranslationError>() {
        Some(cause) => cause.clone(),
        None => panic!("expected a translation error, got {:#}", err),
    }
}

#[test]
fn test_filter_and_project() -> Result<()> {
    let query = Query::table("Users")
        .filter(lambda("u", |u| u.get("age").gt(30)))
        .select(lambda("u", |u| u.get("name")));

    assert_eq!(
        sql(query)?,
        "SELECT [u].[name] FROM [Users] AS [u] WHERE [u].[age] > 30"
    );
    Ok(())
}

#[test]
fn test_join_with_result_selector() -> Result<()> {
    let query = Query::table("Users").join(
        Query::table("Posts"),
        lambda("u", |u| u.get("id")),
        lambda("p", |p| p.get("authorId")),
        lambda2("u", "p", |u, p| {
            object(vec![
                ("UserName", u.get("name")),
                ("PostTitle", p.get("title")),
            ])
        }),
    );

    assert_eq!(
        sql(query)?,
        "SELECT [u].[name] AS [UserName], [p].[title] AS [PostTitle] FROM [Users] AS [u] INNER JOIN [Posts] AS [p] ON [u].[id] = [p].[authorId]"
    );
    Ok(())
}

#[test]
fn test_any_without_predicate() -> Result<()> {
    assert_eq!(
        sql(Query::table("Users").any())?,
        "EXISTS (SELECT 1 FROM [Users] AS [u])"
    );
    Ok(())
}

#[test]
fn test_group_by_with_count() -> Result<()> {
    let query = Query::table("Employees").group_by_with(
        lambda("e", |e| e.get("department")),
        lambda2("key", "g", |key, g| {
            object(vec![
                ("Department", key),
                ("EmployeeCount", g.aggregate("count", None)),
            ])
        }),
    );

    assert_eq!(
        sql(query)?,
        "SELECT [e].[department] AS [Department], COUNT(1) AS [EmployeeCount] FROM [Employees] AS [e] GROUP BY [e].[department]"
    );
    Ok(())
}

#[test]
fn test_paging_without_ordering_warns() -> Result<()> {
    tracing_utils::init_tracing();
    let query = Query::table("Users").skip(5).take(10);
    let compiled = QueryCompiler::default().compile(query.expr())?;

    assert_eq!(
        compiled.sql,
        "SELECT [u].* FROM [Users] AS [u] ORDER BY (SELECT NULL) OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
    );
    assert!(compiled
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::MissingOrderBy { .. })));
    Ok(())
}

#[test]
fn test_nested_collection_becomes_json() -> Result<()> {
    let query = Query::table("Users").select(lambda("u", |u| {
        object(vec![
            ("Name", u.clone().get("name")),
            (
                "Posts",
                Query::table("Posts")
                    .filter(lambda("p", |p| p.get("authorId").equals(u.get("id"))))
                    .select(lambda("p", |p| p.get("title")))
                    .into(),
            ),
        ])
    }));

    assert_eq!(
        sql(query)?,
        "SELECT [u].[name] AS [Name], JSON_QUERY(COALESCE((SELECT [p].[title] FROM [Posts] AS [p] WHERE [p].[authorId] = [u].[id] FOR JSON PATH, INCLUDE_NULL_VALUES), '[]')) AS [Posts] FROM [Users] AS [u]"
    );
    Ok(())
}

#[test]
fn test_nested_count_stays_scalar() -> Result<()> {
    let query = Query::table("Users").select(lambda("u", |u| {
        object(vec![
            ("Name", u.clone().get("name")),
            (
                "PostCount",
                Query::table("Posts")
                    .filter(lambda("p", |p| p.get("authorId").equals(u.get("id"))))
                    .count()
                    .into(),
            ),
        ])
    }));

    assert_eq!(
        sql(query)?,
        "SELECT [u].[name] AS [Name], (SELECT COUNT(1) FROM [Posts] AS [p] WHERE [p].[authorId] = [u].[id]) AS [PostCount] FROM [Users] AS [u]"
    );
    Ok(())
}

#[test]
fn test_ordering_and_take() -> Result<()> {
    let query = Query::table("Users")
        .order_by_descending(lambda("u", |u| u.get("age")))
        .then_by(lambda("u", |u| u.get("name")))
        .take(3);

    assert_eq!(
        sql(query)?,
        "SELECT [u].* FROM [Users] AS [u] ORDER BY [u].[age] DESC, [u].[name] OFFSET 0 ROWS FETCH NEXT 3 ROWS ONLY"
    );
    Ok(())
}

#[test]
fn test_filter_after_take_wraps() -> Result<()> {
    let query = Query::table("Users")
        .take(10)
        .filter(lambda("u", |u| u.get("age").gt(30)));

    assert_eq!(
        sql(query)?,
        "SELECT [s].* FROM (SELECT [u].* FROM [Users] AS [u] ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY) AS [s] WHERE [s].[age] > 30"
    );
    Ok(())
}

#[test]
fn test_first_marks_projection() -> Result<()> {
    let query = Query::table("Users")
        .filter(lambda("u", |u| u.get("age").gt(30)))
        .select(lambda("u", |u| u.get("name")))
        .first();

    assert_eq!(
        sql(query)?,
        "SELECT [u].[name] AS [__first] FROM [Users] AS [u] WHERE [u].[age] > 30 ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 1 ROWS ONLY"
    );
    Ok(())
}

#[test]
fn test_membership_in_captured_array() -> Result<()> {
    let query = Query::table("Users").filter(lambda("u", |u| {
        constant(vec!["admin", "owner"]).includes(u.get("role"))
    }));

    assert_eq!(
        sql(query)?,
        "SELECT [u].* FROM [Users] AS [u] WHERE [u].[role] IN ('admin', 'owner')"
    );
    Ok(())
}

#[test]
fn test_scope_provides_free_variables() -> Result<()> {
    let query = Query::table("Users")
        .filter(lambda("u", |u| u.get("age").ge(var("minAge"))))
        .provide_scope(vec![("minAge", 21.into())]);

    assert_eq!(
        sql(query)?,
        "SELECT [u].* FROM [Users] AS [u] WHERE [u].[age] >= 21"
    );
    Ok(())
}

#[test]
fn test_all_is_not_exists_of_violation() -> Result<()> {
    let query = Query::table("Users").all(lambda("u", |u| u.get("age").ge(18)));

    assert_eq!(
        sql(query)?,
        "NOT EXISTS (SELECT 1 FROM [Users] AS [u] WHERE NOT ([u].[age] >= 18))"
    );
    Ok(())
}

#[test]
fn test_concat_of_projections() -> Result<()> {
    let query = Query::table("Users")
        .select(lambda("u", |u| u.get("name")))
        .concat(Query::table("Admins").select(lambda("a", |a| a.get("name"))));

    assert_eq!(
        sql(query)?,
        "SELECT [u1].* FROM (SELECT [u].[name] FROM [Users] AS [u] UNION ALL SELECT [a].[name] FROM [Admins] AS [a]) AS [u1]"
    );
    Ok(())
}

#[test]
fn test_string_helpers() -> Result<()> {
    let query = Query::table("Users").filter(lambda("u", |u| {
        u.clone()
            .get("name")
            .starts_with("Jo")
            .and(u.get("email").to_lower_case().ends_with("@example.com"))
    }));

    assert_eq!(
        sql(query)?,
        "SELECT [u].* FROM [Users] AS [u] WHERE [u].[name] LIKE 'Jo%' AND LOWER([u].[email]) LIKE '%@example.com'"
    );
    Ok(())
}

#[test]
fn test_pretty_configuration() -> Result<()> {
    let config = TranslatorConfig::default()
        .with_pretty_print(true)
        .with_indent_width(2);
    let query = Query::table("Users")
        .take(10)
        .filter(lambda("u", |u| u.get("age").gt(30)));
    let compiled = QueryCompiler::new(config).compile(query.expr())?;

    assert_eq!(
        compiled.sql,
        [
            "SELECT [s].*",
            "FROM (",
            "  SELECT [u].*",
            "  FROM [Users] AS [u]",
            "  ORDER BY (SELECT NULL)",
            "  OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY",
            ") AS [s]",
            "WHERE [s].[age] > 30",
        ]
        .join("\n")
    );
    Ok(())
}

#[test]
fn test_double_negation_stays_arithmetic() -> Result<()> {
    let query = Query::table("Users")
        .filter(lambda("u", |u| u.get("balance").gt(-Expr::from(-5))))
        .select(lambda("u", |u| u.get("name")));

    assert_eq!(
        sql(query)?,
        "SELECT [u].[name] FROM [Users] AS [u] WHERE [u].[balance] > -(-5)"
    );
    Ok(())
}

#[test]
fn test_float_literals_keep_fraction() -> Result<()> {
    let query = Query::table("Orders")
        .select(lambda("o", |o| object(vec![("Half", o.get("qty") / 2.0)])));

    assert_eq!(
        sql(query)?,
        "SELECT [o].[qty] / 2.0 AS [Half] FROM [Orders] AS [o]"
    );
    Ok(())
}

#[test]
fn test_empty_pages_select_nothing() -> Result<()> {
    assert_eq!(
        sql(Query::table("Users").take(0))?,
        "SELECT [u].* FROM [Users] AS [u] WHERE 1 = 0"
    );
    assert_eq!(
        sql(Query::table("Users").take(10).skip(20))?,
        "SELECT [u].* FROM [Users] AS [u] WHERE 1 = 0"
    );
    Ok(())
}

#[test]
fn test_column_pattern_matches_literally() -> Result<()> {
    let query = Query::table("Users").filter(lambda("u", |u| {
        u.clone().get("name").starts_with(u.get("prefix"))
    }));

    assert_eq!(
        sql(query)?,
        "SELECT [u].* FROM [Users] AS [u] WHERE [u].[name] LIKE REPLACE(REPLACE(REPLACE([u].[prefix], '[', '[[]'), '%', '[%]'), '_', '[_]') + '%'"
    );
    Ok(())
}

#[test]
fn test_join_keeps_earlier_projection() -> Result<()> {
    let query = Query::table("Users")
        .select(lambda("u", |u| {
            object(vec![("Name", u.clone().get("name")), ("Id", u.get("id"))])
        }))
        .call(
            "join",
            vec![
                Query::table("Posts").into_expr(),
                lambda("x", |x| x.get("Id")),
                lambda("p", |p| p.get("authorId")),
            ],
        );

    assert_eq!(
        sql(query)?,
        "SELECT [s1].*, [p].* FROM (SELECT [u].[name] AS [Name], [u].[id] AS [Id] FROM [Users] AS [u]) AS [s1] INNER JOIN [Posts] AS [p] ON [s1].[Id] = [p].[authorId]"
    );
    Ok(())
}

#[test]
fn test_unsupported_method() {
    let query = Query::table("Users").call("distinct", vec![]);
    assert!(matches!(
        translation_error(query),
        TranslationError::Unsupported(_)
    ));
}

#[test]
fn test_then_by_requires_ordering() {
    let query = Query::table("Users").then_by(lambda("u", |u| u.get("name")));
    assert!(matches!(
        translation_error(query),
        TranslationError::StructuralPrecondition(_)
    ));
}

#[test]
fn test_negative_take() {
    let query = Query::table("Users").take(-1);
    assert!(matches!(
        translation_error(query),
        TranslationError::InvalidLiteral(_)
    ));
}

#[test]
fn test_unresolved_free_variable() {
    let query = Query::table("Users").filter(lambda("u", |u| u.get("age").gt(var("limit"))));
    assert_eq!(
        translation_error(query),
        TranslationError::UnresolvedParameter("limit".to_string())
    );
}
