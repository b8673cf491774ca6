//! GROUP BY / aggregate shape contracts.

use detsql::ast::{ComparisonOp, Expression, ResultColumn, SimpleSelect};
use detsql::rules::AggregateError;
use detsql::{AnalyzerConfig, BindParameters, Error, ErrorKind};

use super::common::{analyze, analyze_with, col, ordering, select};

fn count(column: &str) -> Expression {
    Expression::function("count", vec![Expression::unqualified(column)])
}

fn aggregate_error(select_stmt: SimpleSelect) -> AggregateError {
    match analyze(select(select_stmt.into_core())) {
        Err(Error::Aggregate(err)) => err,
        other => panic!("expected an aggregate error, got {other:?}"),
    }
}

#[test]
fn test_grouped_select_passes() {
    let stmt = SimpleSelect::new(vec![col("a"), ResultColumn::expr(count("b"))])
        .from_table("t")
        .group_by(vec![Expression::unqualified("a")], None);
    let analysis = analyze(select(stmt.into_core())).unwrap();
    assert_eq!(analysis.relation.len(), 2);
}

#[test]
fn test_bare_column_without_group_by() {
    let stmt = SimpleSelect::new(vec![col("a"), ResultColumn::expr(count("b"))]).from_table("t");
    assert_eq!(
        aggregate_error(stmt),
        AggregateError::UngroupedColumn("a".to_string())
    );
}

#[test]
fn test_select_all_in_aggregate() {
    let stmt = SimpleSelect::new(vec![ResultColumn::Star])
        .from_table("t")
        .group_by(vec![Expression::unqualified("a")], None);
    assert_eq!(aggregate_error(stmt), AggregateError::SelectAllInAggregate);
}

#[test]
fn test_positional_arguments() {
    let stmt = SimpleSelect::new(vec![ResultColumn::expr(Expression::function(
        "count",
        vec![Expression::unqualified("a"), Expression::unqualified("b")],
    ))])
    .from_table("t");
    assert!(matches!(
        aggregate_error(stmt),
        AggregateError::InvalidPositionalArgument { position: 2, .. }
    ));

    let single = SimpleSelect::new(vec![ResultColumn::expr(count("a"))]).from_table("t");
    assert!(analyze(select(single.into_core())).is_ok());

    let star = SimpleSelect::new(vec![ResultColumn::expr(Expression::function_star("count"))])
        .from_table("t");
    assert!(analyze(select(star.into_core())).is_ok());
}

#[test]
fn test_having_uses_grouped_columns() {
    let having = Expression::binary(count("b"), ComparisonOp::Gt, Expression::int(2));
    let ok = SimpleSelect::new(vec![col("a")])
        .from_table("t")
        .group_by(vec![Expression::unqualified("a")], Some(having));
    assert!(analyze(select(ok.into_core())).is_ok());

    let having = Expression::binary(
        Expression::unqualified("b"),
        ComparisonOp::Gt,
        Expression::int(2),
    );
    let bad = SimpleSelect::new(vec![col("a")])
        .from_table("t")
        .group_by(vec![Expression::unqualified("a")], Some(having));
    assert_eq!(
        aggregate_error(bad),
        AggregateError::UngroupedHavingColumn("b".to_string())
    );
}

#[test]
fn test_subquery_inside_aggregate() {
    let inner = SimpleSelect::new(vec![col("id")]).from_table("users").into_core();
    let stmt = SimpleSelect::new(vec![ResultColumn::expr(Expression::function(
        "max",
        vec![Expression::subquery(inner)],
    ))])
    .from_table("t");
    assert!(matches!(
        aggregate_error(stmt),
        AggregateError::SubqueryInAggregate(_)
    ));
}

#[test]
fn test_group_by_expression_rejected() {
    let stmt = SimpleSelect::new(vec![col("b")])
        .from_table("t")
        .group_by(
            vec![Expression::arithmetic(
                Expression::unqualified("b"),
                detsql::ast::ArithmeticOp::Add,
                Expression::int(1),
            )],
            None,
        );
    let err = analyze(select(stmt.into_core())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AggregateShape);
}

#[test]
fn test_disabled_validation_falls_through_to_typing() {
    // count(a, b) is an arity error once aggregate validation is off
    let stmt = SimpleSelect::new(vec![ResultColumn::expr(Expression::function(
        "count",
        vec![Expression::unqualified("a"), Expression::unqualified("b")],
    ))])
    .from_table("t");
    let config = AnalyzerConfig::new().with_validate_aggregates(false);
    let err = analyze_with(select(stmt.into_core()), config, &BindParameters::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_alias_naming_input_column_groups_that_column() {
    let stmt = SimpleSelect::new(vec![
        ResultColumn::aliased(Expression::unqualified("a"), "b"),
        ResultColumn::expr(count("id")),
    ])
    .from_table("t")
    .group_by(vec![Expression::unqualified("b")], None);
    assert_eq!(
        aggregate_error(stmt),
        AggregateError::UngroupedColumn("a".to_string())
    );
}

#[test]
fn test_having_without_group_by_is_one_group() {
    let having = Expression::binary(count("b"), ComparisonOp::Gt, Expression::int(2));
    let ok = SimpleSelect::new(vec![ResultColumn::expr(count("id"))])
        .from_table("t")
        .group_by(Vec::new(), Some(having.clone()));
    let analysis = analyze(select(ok.into_core())).unwrap();
    assert!(ordering(&analysis).is_empty());

    let bad = SimpleSelect::new(vec![col("a")])
        .from_table("t")
        .group_by(Vec::new(), Some(having));
    assert_eq!(
        aggregate_error(bad),
        AggregateError::UngroupedColumn("a".to_string())
    );
}
