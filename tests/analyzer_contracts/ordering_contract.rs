//! Default ordering contracts.

use detsql::ast::{
    CompoundOperator, Cte, Expression, FromClause, OrderingTerm, ResultColumn, SelectStmt,
    SimpleSelect, Statement, TableRef,
};
use detsql::{AnalyzerConfig, BindParameters, ErrorKind};

use super::common::{analyze, analyze_with, col, ordering, select, users_join_posts};

#[test]
fn test_primary_key_injected() {
    let analysis = analyze(select(
        SimpleSelect::new(vec![col("name")]).from_table("users").into_core(),
    ))
    .unwrap();
    assert_eq!(ordering(&analysis), vec!["users.id ASC NULLS LAST"]);
}

#[test]
fn test_user_terms_take_precedence() {
    let core = SimpleSelect::new(vec![col("name")])
        .from_table("users")
        .into_core()
        .order_by(vec![OrderingTerm::desc(Expression::unqualified("name"))]);
    let analysis = analyze(select(core)).unwrap();
    assert_eq!(
        ordering(&analysis),
        vec!["name DESC", "users.id ASC NULLS LAST"]
    );
}

#[test]
fn test_user_primary_key_term_is_repeated() {
    let core = SimpleSelect::new(vec![col("name")])
        .from_table("users")
        .into_core()
        .order_by(vec![OrderingTerm::asc_nulls_last(Expression::column(
            "users", "id",
        ))]);
    let analysis = analyze(select(core)).unwrap();
    assert_eq!(ordering(&analysis).len(), 2);
}

#[test]
fn test_join_orders_every_table_alphabetically() {
    let analysis = analyze(select(
        SimpleSelect::new(vec![col("name"), col("title")])
            .from(users_join_posts())
            .into_core(),
    ))
    .unwrap();
    assert_eq!(
        ordering(&analysis),
        vec!["posts.id ASC NULLS LAST", "users.id ASC NULLS LAST"]
    );
}

#[test]
fn test_compound_select_orders_by_outputs() {
    let core = SimpleSelect::new(vec![
        col("id"),
        ResultColumn::aliased(Expression::unqualified("name"), "label"),
    ])
    .from_table("users")
    .into_core()
    .compound(
        CompoundOperator::Intersect,
        SimpleSelect::new(vec![col("id"), col("title")]).from_table("posts"),
    );
    let analysis = analyze(select(core)).unwrap();
    assert_eq!(
        ordering(&analysis),
        vec!["id ASC NULLS LAST", "label ASC NULLS LAST"]
    );
}

#[test]
fn test_ordering_can_be_disabled() {
    let config = AnalyzerConfig::new().with_inject_ordering(false);
    let analysis = analyze_with(
        select(SimpleSelect::new(vec![col("name")]).from_table("users").into_core()),
        config,
        &BindParameters::new(),
    )
    .unwrap();
    assert!(ordering(&analysis).is_empty());
}

#[test]
fn test_cte_and_subquery_get_full_row_keys() {
    let body = SimpleSelect::new(vec![col("id"), col("name")])
        .from_table("users")
        .into_core();
    let derived = SimpleSelect::new(vec![col("title")])
        .from_table("posts")
        .into_core();
    let main = SimpleSelect::new(vec![ResultColumn::Star])
        .from(FromClause::new(TableRef::table("people")).join(
            detsql::ast::JoinKind::Inner,
            TableRef::subquery(derived, Some("d")),
            Expression::eq(
                Expression::column("people", "name"),
                Expression::column("d", "title"),
            ),
        ))
        .into_core();
    let stmt = Statement::Select(SelectStmt::new(main).with_cte(Cte::new("people", body)));

    let analysis = analyze(stmt).unwrap();
    assert_eq!(
        ordering(&analysis),
        vec![
            "d.title ASC NULLS LAST",
            "people.id ASC NULLS LAST",
            "people.name ASC NULLS LAST",
        ]
    );
}

#[test]
fn test_table_function_ordered_by_all_columns() {
    let core = SimpleSelect::new(vec![ResultColumn::Star])
        .from(FromClause::new(TableRef::Function {
            name: "posts_by".to_string(),
            args: vec![Expression::int(7)],
            alias: None,
        }))
        .into_core();
    let analysis = analyze(select(core)).unwrap();
    assert_eq!(
        ordering(&analysis),
        vec!["posts_by.id ASC NULLS LAST", "posts_by.title ASC NULLS LAST"]
    );
}

#[test]
fn test_distinct_group_by_is_structural() {
    let core = SimpleSelect::new(vec![col("a")])
        .distinct()
        .from_table("t")
        .group_by(vec![Expression::unqualified("a")], None)
        .into_core();
    assert_eq!(analyze(select(core)).unwrap_err().kind(), ErrorKind::Structural);
}

#[test]
fn test_applied_rule_is_reported() {
    let analysis = analyze(select(
        SimpleSelect::new(vec![col("name")]).from_table("users").into_core(),
    ))
    .unwrap();
    assert_eq!(analysis.applied_rules, vec!["DefaultOrdering".to_string()]);

    let analysis = analyze(select(
        SimpleSelect::new(vec![ResultColumn::expr(Expression::int(1))]).into_core(),
    ))
    .unwrap();
    assert!(analysis.applied_rules.is_empty());
}
