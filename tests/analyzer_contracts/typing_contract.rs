//! Type inference and scope resolution contracts.

use detsql::ast::{
    CompoundOperator, ConflictTarget, Cte, DeleteStmt, Expression, FromClause, InsertStmt,
    JoinKind, ResultColumn, SelectStmt, SimpleSelect, Statement, TableRef, UpdateSetClause,
    UpdateStmt, Upsert, UpsertAction,
};
use detsql::types::DataType;
use detsql::{AnalyzerConfig, BindParameters, Error, ErrorKind};

use super::common::{analyze, analyze_with, col, select, users_join_posts};

#[test]
fn test_star_expansion_follows_join_order() {
    let stmt = select(
        SimpleSelect::new(vec![ResultColumn::Star])
            .from(users_join_posts())
            .into_core(),
    );
    let analysis = analyze(stmt).unwrap();
    assert_eq!(
        analysis.relation.names(),
        vec!["id", "name", "id", "title", "author_id"]
    );
    assert_eq!(
        analysis.relation.shape(),
        vec![
            DataType::Int,
            DataType::Text,
            DataType::Int,
            DataType::Text,
            DataType::Int
        ]
    );
}

#[test]
fn test_result_order_matches_declaration() {
    let stmt = select(
        SimpleSelect::new(vec![
            ResultColumn::TableStar("posts".to_string()),
            col("name"),
            ResultColumn::aliased(Expression::column("users", "id"), "uid"),
        ])
        .from(users_join_posts())
        .into_core(),
    );
    let analysis = analyze(stmt).unwrap();
    assert_eq!(
        analysis.relation.names(),
        vec!["id", "title", "author_id", "name", "uid"]
    );
}

#[test]
fn test_ambiguous_unqualified_column() {
    let stmt = select(
        SimpleSelect::new(vec![col("id")])
            .from(users_join_posts())
            .into_core(),
    );
    let err = analyze(stmt).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousReference);
}

#[test]
fn test_outer_columns_resolve_only_when_qualified() {
    let correlated = |outer_ref: Expression| {
        let inner = SimpleSelect::new(vec![ResultColumn::expr(Expression::int(1))])
            .from_table("posts")
            .filter(Expression::eq(Expression::unqualified("title"), outer_ref))
            .into_core();
        select(
            SimpleSelect::new(vec![col("id")])
                .from_table("users")
                .filter(Expression::exists(inner))
                .into_core(),
        )
    };

    assert!(analyze(correlated(Expression::column("users", "name"))).is_ok());

    let err = analyze(correlated(Expression::unqualified("name"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
}

#[test]
fn test_compound_shapes() {
    let mismatched = SimpleSelect::new(vec![col("id"), col("name")])
        .from_table("users")
        .into_core()
        .compound(
            CompoundOperator::Union,
            SimpleSelect::new(vec![col("id"), col("author_id")]).from_table("posts"),
        );
    assert_eq!(
        analyze(select(mismatched)).unwrap_err(),
        Error::CompoundShape {
            position: 2,
            expected: DataType::Text,
            actual: DataType::Int,
        }
    );

    let matching = SimpleSelect::new(vec![col("id"), col("name")])
        .from_table("users")
        .into_core()
        .compound(
            CompoundOperator::Union,
            SimpleSelect::new(vec![col("id"), col("title")]).from_table("posts"),
        );
    let analysis = analyze(select(matching)).unwrap();
    assert_eq!(analysis.relation.shape(), vec![DataType::Int, DataType::Text]);
}

#[test]
fn test_compound_arity() {
    let core = SimpleSelect::new(vec![col("id")])
        .from_table("users")
        .into_core()
        .compound(
            CompoundOperator::Except,
            SimpleSelect::new(vec![col("id"), col("title")]).from_table("posts"),
        );
    assert_eq!(
        analyze(select(core)).unwrap_err().kind(),
        ErrorKind::TypeMismatch
    );
}

#[test]
fn test_where_must_be_boolean() {
    let stmt = select(
        SimpleSelect::new(vec![col("name")])
            .from_table("users")
            .filter(Expression::unqualified("id"))
            .into_core(),
    );
    assert!(matches!(
        analyze(stmt).unwrap_err(),
        Error::TypeMismatch { .. }
    ));
}

#[test]
fn test_bind_parameters() {
    let stmt = || {
        select(
            SimpleSelect::new(vec![col("name")])
                .from_table("users")
                .filter(Expression::eq(
                    Expression::unqualified("id"),
                    Expression::bind("$id"),
                ))
                .into_core(),
        )
    };

    let err = analyze(stmt()).unwrap_err();
    assert_eq!(err, Error::UnknownBindParameter("$id".to_string()));

    let mut binds = BindParameters::new();
    binds.insert("$id".to_string(), DataType::Int);
    assert!(analyze_with(stmt(), AnalyzerConfig::new(), &binds).is_ok());

    binds.insert("$id".to_string(), DataType::Text);
    assert!(analyze_with(stmt(), AnalyzerConfig::new(), &binds).is_err());

    let config = AnalyzerConfig::new().with_arbitrary_binds(true);
    assert!(analyze_with(stmt(), config, &BindParameters::new()).is_ok());
}

#[test]
fn test_procedures() {
    let call = Expression::function("user_name", vec![Expression::unqualified("author_id")]);
    let stmt = select(
        SimpleSelect::new(vec![ResultColumn::aliased(call, "author")])
            .from_table("posts")
            .into_core(),
    );
    let analysis = analyze(stmt).unwrap();
    assert_eq!(analysis.relation.shape(), vec![DataType::Text]);

    let bad_arg = Expression::function("user_name", vec![Expression::unqualified("title")]);
    let stmt = select(
        SimpleSelect::new(vec![ResultColumn::expr(bad_arg)])
            .from_table("posts")
            .into_core(),
    );
    assert_eq!(analyze(stmt).unwrap_err().kind(), ErrorKind::TypeMismatch);

    let stmt = select(
        SimpleSelect::new(vec![ResultColumn::Star])
            .from(FromClause::new(TableRef::Function {
                name: "posts_by".to_string(),
                args: vec![Expression::int(1)],
                alias: Some("p".to_string()),
            }))
            .into_core(),
    );
    let analysis = analyze(stmt).unwrap();
    assert_eq!(analysis.relation.names(), vec!["id", "title"]);
}

#[test]
fn test_unknown_function() {
    let stmt = select(
        SimpleSelect::new(vec![ResultColumn::expr(Expression::function(
            "nope",
            vec![],
        ))])
        .into_core(),
    );
    assert_eq!(
        analyze(stmt).unwrap_err(),
        Error::UnknownFunction("nope".to_string())
    );
}

#[test]
fn test_cte_relations_are_reported() {
    let body = SimpleSelect::new(vec![
        col("id"),
        ResultColumn::aliased(Expression::unqualified("name"), "username"),
    ])
    .from_table("users")
    .into_core();
    let main = SimpleSelect::new(vec![col("username")])
        .from_table("named")
        .into_core();
    let stmt = Statement::Select(SelectStmt::new(main).with_cte(Cte::new("named", body)));

    let analysis = analyze(stmt).unwrap();
    assert_eq!(analysis.ctes["named"].names(), vec!["id", "username"]);
    assert_eq!(analysis.relation.shape(), vec![DataType::Text]);
}

#[test]
fn test_insert_returning() {
    let mut insert = InsertStmt::new(
        "users",
        &["id", "name"],
        vec![vec![Expression::int(1), Expression::text("ada")]],
    );
    insert.alias = Some("u".to_string());
    insert.returning = vec![ResultColumn::expr(Expression::column("u", "id"))];
    let analysis = analyze(Statement::Insert(insert)).unwrap();
    assert_eq!(analysis.relation.shape(), vec![DataType::Int]);

    let wrong = InsertStmt::new(
        "users",
        &["id", "name"],
        vec![vec![Expression::int(1), Expression::int(2)]],
    );
    assert_eq!(
        analyze(Statement::Insert(wrong)).unwrap_err().kind(),
        ErrorKind::TypeMismatch
    );
}

#[test]
fn test_insert_upsert_sees_excluded() {
    let mut insert = InsertStmt::new(
        "users",
        &[],
        vec![vec![Expression::int(1), Expression::text("ada")]],
    );
    insert.upsert = Some(Upsert {
        target: Some(ConflictTarget {
            columns: vec!["id".to_string()],
            where_clause: None,
        }),
        action: UpsertAction::DoUpdate {
            set: vec![UpdateSetClause::new(
                "name",
                Expression::column("excluded", "name"),
            )],
            where_clause: None,
        },
    });
    let analysis = analyze(Statement::Insert(insert)).unwrap();
    assert!(analysis.relation.is_empty());
}

#[test]
fn test_update_and_delete() {
    let mut update = UpdateStmt::new(
        "posts",
        vec![UpdateSetClause::new("title", Expression::unqualified("name"))],
    );
    update.from = Some(FromClause::new(TableRef::table("users")));
    update.where_clause = Some(Expression::eq(
        Expression::column("posts", "author_id"),
        Expression::column("users", "id"),
    ));
    update.returning = vec![ResultColumn::Star];
    let analysis = analyze(Statement::Update(update)).unwrap();
    assert_eq!(
        analysis.relation.names(),
        vec!["id", "title", "author_id", "id", "name"]
    );

    let bad_set = UpdateStmt::new(
        "posts",
        vec![UpdateSetClause::new("title", Expression::int(3))],
    );
    assert_eq!(
        analyze(Statement::Update(bad_set)).unwrap_err().kind(),
        ErrorKind::TypeMismatch
    );

    let mut delete = DeleteStmt::new("users");
    delete.where_clause = Some(Expression::eq(
        Expression::unqualified("name"),
        Expression::text("ada"),
    ));
    delete.returning = vec![col("id")];
    let analysis = analyze(Statement::Delete(delete)).unwrap();
    assert_eq!(analysis.relation.names(), vec!["id"]);
}

#[test]
fn test_returning_table_star_is_structural() {
    let mut delete = DeleteStmt::new("users");
    delete.returning = vec![ResultColumn::TableStar("users".to_string())];
    assert_eq!(
        analyze(Statement::Delete(delete)).unwrap_err().kind(),
        ErrorKind::Structural
    );
}

#[test]
fn test_left_join_subquery_scope() {
    let derived = SimpleSelect::new(vec![
        ResultColumn::aliased(Expression::unqualified("author_id"), "uid"),
        col("title"),
    ])
    .from_table("posts")
    .into_core();
    let stmt = select(
        SimpleSelect::new(vec![col("name"), col("title")])
            .from(FromClause::new(TableRef::table("users")).join(
                JoinKind::Left,
                TableRef::subquery(derived, Some("p")),
                Expression::eq(Expression::column("users", "id"), Expression::column("p", "uid")),
            ))
            .into_core(),
    );
    let analysis = analyze(stmt).unwrap();
    assert_eq!(analysis.relation.shape(), vec![DataType::Text, DataType::Text]);
}
