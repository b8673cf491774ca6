//! Join constraint contracts.

use detsql::ast::{
    ComparisonOp, Expression, FromClause, JoinKind, JoinPredicate, ResultColumn, SimpleSelect,
    TableRef,
};
use detsql::rules::{classify, JoinError, Joinability};
use detsql::{Error, ErrorKind};

use super::common::{analyze, select};

fn join_on(constraint: Expression) -> detsql::Result<detsql::Analysis> {
    let from = FromClause::new(TableRef::aliased("users", "a")).join(
        JoinKind::Inner,
        TableRef::aliased("posts", "b"),
        constraint,
    );
    analyze(select(
        SimpleSelect::new(vec![ResultColumn::Star]).from(from).into_core(),
    ))
}

fn a(column: &str) -> Expression {
    Expression::column("a", column)
}

fn b(column: &str) -> Expression {
    Expression::column("b", column)
}

#[test]
fn test_single_equality_validates() {
    assert!(join_on(Expression::eq(a("id"), b("author_id"))).is_ok());
}

#[test]
fn test_rejected_constraints() {
    let composite = Expression::and(
        Expression::eq(a("id"), b("author_id")),
        Expression::eq(a("name"), b("title")),
    );
    let inequality = Expression::binary(a("id"), ComparisonOp::Gt, b("author_id"));
    let literal = Expression::eq(a("id"), Expression::int(5));

    for constraint in [composite, inequality, literal] {
        let err = join_on(constraint).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JoinShape);
        assert!(matches!(err, Error::Join(JoinError::InvalidConstraint(_))));
    }
}

#[test]
fn test_collate_propagates() {
    let constraint = Expression::eq(
        Expression::Collate {
            expr: Box::new(a("name")),
            collation: "nocase".to_string(),
        },
        b("title"),
    );
    assert_eq!(classify(&constraint), Joinability::Valid);
    assert!(join_on(constraint).is_ok());
}

#[test]
fn test_function_sides_are_invalid() {
    let constraint = Expression::eq(
        Expression::function("lower", vec![a("name")]),
        b("title"),
    );
    assert_eq!(classify(&constraint), Joinability::ContainsColumn);
    assert!(join_on(constraint).is_err());
}

#[test]
fn test_join_without_constraint() {
    let from = FromClause {
        relation: TableRef::table("users"),
        joins: vec![JoinPredicate {
            kind: JoinKind::Full,
            table: TableRef::table("posts"),
            constraint: None,
        }],
    };
    let err = analyze(select(
        SimpleSelect::new(vec![ResultColumn::Star]).from(from).into_core(),
    ))
    .unwrap_err();
    assert_eq!(
        err,
        Error::Join(JoinError::MissingConstraint("posts".to_string()))
    );
}
