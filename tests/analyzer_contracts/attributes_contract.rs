//! Schema derivation contracts.
//!
//! Derived output columns must agree with what the type checker reports for
//! the same select, and must survive being turned into a table and selected
//! from again.

use detsql::ast::{ArithmeticOp, Expression, ResultColumn, SimpleSelect, TableRef};
use detsql::attributes::{derive_attributes, table_from_attributes, RelationAttribute};
use detsql::types::DataType;
use detsql::{BindParameters, ErrorKind, TypeChecker};

use super::common::{catalog, col, select, users_join_posts};

fn names(attributes: &[RelationAttribute]) -> Vec<&str> {
    attributes.iter().filter_map(RelationAttribute::name).collect()
}

fn types(attributes: &[RelationAttribute]) -> Vec<DataType> {
    attributes.iter().map(|a| a.data_type).collect()
}

#[test]
fn test_derivation_agrees_with_type_checker() {
    let catalog = catalog();
    let cores = vec![
        SimpleSelect::new(vec![ResultColumn::Star])
            .from(users_join_posts())
            .into_core(),
        SimpleSelect::new(vec![
            ResultColumn::TableStar("posts".to_string()),
            ResultColumn::aliased(Expression::column("users", "name"), "author"),
        ])
        .from(users_join_posts())
        .into_core(),
        SimpleSelect::new(vec![
            col("id"),
            ResultColumn::aliased(
                Expression::arithmetic(
                    Expression::unqualified("id"),
                    ArithmeticOp::Mul,
                    Expression::int(2),
                ),
                "double",
            ),
        ])
        .from_table("users")
        .into_core(),
    ];

    for core in cores {
        let relation = TypeChecker::new(&catalog, &BindParameters::new())
            .check(&select(core.clone()))
            .unwrap();
        let mut core = core;
        let attributes = derive_attributes(&mut core, &catalog).unwrap();
        assert_eq!(names(&attributes), relation.names());
        assert_eq!(types(&attributes), relation.shape());
    }
}

#[test]
fn test_derived_table_selects_back() {
    let catalog = catalog();
    let mut core = SimpleSelect::new(vec![
        col("title"),
        ResultColumn::aliased(Expression::unqualified("author_id"), "uid"),
    ])
    .from_table("posts")
    .into_core();
    let attributes = derive_attributes(&mut core, &catalog).unwrap();
    let table = table_from_attributes("recent", &attributes, true).unwrap();
    assert_eq!(table.sorted_primary_key(), vec!["title", "uid"]);

    let mut tables = indexmap::IndexMap::new();
    tables.insert("recent".to_string(), table);
    let mut again = SimpleSelect::new(vec![ResultColumn::Star])
        .from_table("recent")
        .into_core();
    let reselected = derive_attributes(&mut again, &tables).unwrap();
    assert_eq!(names(&reselected), names(&attributes));
    assert_eq!(types(&reselected), types(&attributes));
}

#[test]
fn test_single_table_qualifiers_are_filled_in() {
    let mut core = SimpleSelect::new(vec![col("name")])
        .from(detsql::ast::FromClause::new(TableRef::aliased("users", "u")))
        .into_core();
    derive_attributes(&mut core, &catalog()).unwrap();
    assert_eq!(
        core.selects[0].columns[0],
        ResultColumn::expr(Expression::column("u", "name"))
    );

    let mut joined = SimpleSelect::new(vec![col("name")])
        .from(users_join_posts())
        .into_core();
    derive_attributes(&mut joined, &catalog()).unwrap();
    assert_eq!(joined.selects[0].columns[0], col("name"));
}

#[test]
fn test_unaliased_expression_cannot_become_a_table() {
    let mut core = SimpleSelect::new(vec![ResultColumn::expr(Expression::function(
        "count",
        vec![Expression::unqualified("id")],
    ))])
    .from_table("users")
    .into_core();
    let attributes = derive_attributes(&mut core, &catalog()).unwrap();
    assert_eq!(types(&attributes), vec![DataType::Int]);

    let err = table_from_attributes("counts", &attributes, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn test_repeated_names_are_suffixed() {
    let mut core = SimpleSelect::new(vec![ResultColumn::Star])
        .from(users_join_posts())
        .into_core();
    let attributes = derive_attributes(&mut core, &catalog()).unwrap();
    let table = table_from_attributes("joined", &attributes, false).unwrap();
    assert_eq!(
        table.sorted_column_names(),
        vec!["author_id", "id", "id_3", "name", "title"]
    );
}
