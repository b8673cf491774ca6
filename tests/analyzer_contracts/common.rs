//! Shared fixtures for the analyzer contracts.

use detsql::ast::{Expression, ResultColumn, SelectCore, SelectStmt, Statement};
use detsql::catalog::{Catalog, ColumnDef, ProcedureDef, TableSchema};
use detsql::types::DataType;
use detsql::{Analysis, Analyzer, AnalyzerConfig, BindParameters, Result};

fn table(name: &str, columns: &[(&str, DataType)], primary_key: &[&str]) -> TableSchema {
    TableSchema::new(
        name.to_string(),
        columns
            .iter()
            .map(|(column, data_type)| ColumnDef::new(*column, *data_type).unwrap())
            .collect(),
        primary_key.iter().map(ToString::to_string).collect(),
    )
    .unwrap()
}

/// users(id PK, name), posts(id PK, title, author_id), t(id PK, a, b), plus
/// a scalar procedure `user_name(INT) -> TEXT` and a table procedure
/// `posts_by(INT) -> (id, title)`.
pub fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .create_table(table(
            "users",
            &[("id", DataType::Int), ("name", DataType::Text)],
            &["id"],
        ))
        .unwrap();
    catalog
        .create_table(table(
            "posts",
            &[
                ("id", DataType::Int),
                ("title", DataType::Text),
                ("author_id", DataType::Int),
            ],
            &["id"],
        ))
        .unwrap();
    catalog
        .create_table(table(
            "t",
            &[("id", DataType::Int), ("a", DataType::Text), ("b", DataType::Int)],
            &["id"],
        ))
        .unwrap();
    catalog
        .create_procedure(
            ProcedureDef::new("user_name", vec![DataType::Int])
                .returning(vec![ColumnDef::new("name", DataType::Text).unwrap()]),
        )
        .unwrap();
    catalog
        .create_procedure(ProcedureDef::new("posts_by", vec![DataType::Int]).returning_table(
            vec![
                ColumnDef::new("id", DataType::Int).unwrap(),
                ColumnDef::new("title", DataType::Text).unwrap(),
            ],
        ))
        .unwrap();
    catalog
}

pub fn select(core: SelectCore) -> Statement {
    Statement::Select(SelectStmt::new(core))
}

pub fn col(name: &str) -> ResultColumn {
    ResultColumn::expr(Expression::unqualified(name))
}

pub fn users_join_posts() -> detsql::ast::FromClause {
    detsql::ast::FromClause::new(detsql::ast::TableRef::table("users")).join(
        detsql::ast::JoinKind::Inner,
        detsql::ast::TableRef::table("posts"),
        Expression::eq(
            Expression::column("users", "id"),
            Expression::column("posts", "author_id"),
        ),
    )
}

pub fn analyze(stmt: Statement) -> Result<Analysis> {
    let catalog = catalog();
    Analyzer::new(&catalog).analyze(stmt, &BindParameters::new())
}

pub fn analyze_with(stmt: Statement, config: AnalyzerConfig, binds: &BindParameters) -> Result<Analysis> {
    let catalog = catalog();
    Analyzer::with_config(&catalog, config).analyze(stmt, binds)
}

/// Rendered ORDER BY terms of the top-level select core.
pub fn ordering(analysis: &Analysis) -> Vec<String> {
    match &analysis.statement {
        Statement::Select(select) => select
            .core
            .ordering_terms()
            .iter()
            .map(ToString::to_string)
            .collect(),
        other => panic!("expected a select, got {other:?}"),
    }
}
