//! GROUP BY and aggregate call validation.

use thiserror::Error;
use tracing::trace;

use indexmap::IndexMap;

use crate::ast::{Cte, Expression, ResultColumn, SimpleSelect, Statement};
use crate::attributes::{derive_attributes, table_from_attributes, used_tables, TableLookup};
use crate::catalog::{functions, Catalog, ProcedureDef, TableSchema};
use crate::error::Result;

use super::visit::{walk_statement, Visitor};
use super::ValidationRule;

/// Aggregate query shape violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("SELECT * is not allowed in an aggregate query")]
    SelectAllInAggregate,

    #[error("column {0} must appear in GROUP BY or be used in an aggregate function")]
    UngroupedColumn(String),

    #[error("HAVING column {0} must appear in GROUP BY or be used in an aggregate function")]
    UngroupedHavingColumn(String),

    /// Only the first argument of an aggregate may reference a column.
    #[error("argument {position} of {function} must not reference a column")]
    InvalidPositionalArgument { function: String, position: usize },

    #[error("aggregate {0} must not contain a subquery")]
    SubqueryInAggregate(String),

    #[error("GROUP BY term {0} must be a column reference")]
    NonColumnGroupBy(String),

    #[error("aggregate {0} is not allowed in WHERE")]
    AggregateInWhere(String),
}

/// Rejects aggregate queries whose output is not determined by their groups.
///
/// Each simple select is checked on its own; aggregates and columns inside a
/// nested subquery belong to that subquery.
#[derive(Debug, Default)]
pub struct AggregateRule;

impl ValidationRule for AggregateRule {
    fn name(&self) -> &'static str {
        "AggregateValidation"
    }

    fn validate(&self, stmt: &Statement, catalog: &Catalog) -> Result<()> {
        let mut visitor = AggregateVisitor {
            tables: InputTables::new(catalog, stmt.ctes()),
        };
        walk_statement(stmt, &mut visitor)
    }
}

struct AggregateVisitor<'a> {
    tables: InputTables<'a>,
}

impl Visitor for AggregateVisitor<'_> {
    fn visit_select(&mut self, select: &SimpleSelect) -> Result<()> {
        check_select(select, &self.tables.input_columns(select))
    }
}

/// Catalog tables plus the statement's CTEs.
struct InputTables<'a> {
    catalog: &'a Catalog,
    ctes: IndexMap<String, TableSchema>,
}

impl<'a> InputTables<'a> {
    fn new(catalog: &'a Catalog, ctes: &[Cte]) -> Self {
        let mut tables = InputTables {
            catalog,
            ctes: IndexMap::new(),
        };
        for cte in ctes {
            // a CTE that does not derive is reported by type checking
            let mut select = cte.select.clone();
            let Ok(mut attributes) = derive_attributes(&mut select, &tables) else {
                continue;
            };
            if cte.columns.len() == attributes.len() {
                for (attr, column) in attributes.iter_mut().zip(&cte.columns) {
                    attr.alias = Some(column.clone());
                }
            }
            if let Ok(table) = table_from_attributes(&cte.name, &attributes, false) {
                tables.ctes.insert(cte.name.clone(), table);
            }
        }
        tables
    }

    /// Column names provided by a select's FROM clause. Empty when the clause
    /// does not resolve.
    fn input_columns(&self, select: &SimpleSelect) -> Vec<String> {
        used_tables(select.from.as_ref(), self)
            .map(|used| {
                used.iter()
                    .flat_map(|table| table.schema.columns.iter().map(|c| c.name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TableLookup for InputTables<'_> {
    fn lookup_table(&self, name: &str) -> Option<&TableSchema> {
        self.ctes.get(name).or_else(|| self.catalog.get_table(name))
    }

    fn lookup_procedure(&self, name: &str) -> Option<&ProcedureDef> {
        self.catalog.get_procedure(name)
    }
}

fn check_select(select: &SimpleSelect, inputs: &[String]) -> Result<()> {
    let outputs: Vec<&Expression> = select
        .columns
        .iter()
        .filter_map(ResultColumn::expression)
        .collect();
    let group_by = select
        .group_by
        .as_ref()
        .filter(|g| !g.expressions.is_empty());
    let having = select.group_by.as_ref().and_then(|g| g.having.as_ref());

    let mut calls = Vec::new();
    for expr in &outputs {
        aggregate_calls(expr, &mut calls);
    }
    let aggregates_output = !calls.is_empty();
    if let Some(having) = having {
        aggregate_calls(having, &mut calls);
    }
    for call in calls {
        check_call(call)?;
    }

    if let Some(filter) = &select.where_clause {
        let mut in_where = Vec::new();
        aggregate_calls(filter, &mut in_where);
        if let Some(call) = in_where.first() {
            return Err(AggregateError::AggregateInWhere(call.to_string()).into());
        }
    }

    // HAVING without GROUP BY folds the whole input into one group
    let Some(group_by) = group_by else {
        if !aggregates_output && having.is_none() {
            return Ok(());
        }
        if select.has_star() {
            return Err(AggregateError::SelectAllInAggregate.into());
        }
        check_outputs(select, &[], inputs)?;
        return check_having(having, &[]);
    };

    let mut grouped = Vec::with_capacity(group_by.expressions.len());
    for expr in &group_by.expressions {
        let column = expr
            .as_column()
            .ok_or_else(|| AggregateError::NonColumnGroupBy(expr.to_string()))?;
        grouped.push(column);
    }

    if select.has_star() {
        return Err(AggregateError::SelectAllInAggregate.into());
    }
    check_outputs(select, &grouped, inputs)?;
    check_having(having, &grouped)
}

fn check_outputs(
    select: &SimpleSelect,
    grouped: &[(Option<&str>, &str)],
    inputs: &[String],
) -> Result<()> {
    for column in &select.columns {
        let Some(expr) = column.expression() else {
            continue;
        };
        // a result alias named in GROUP BY groups the whole expression,
        // unless GROUP BY resolves that name to an input column
        if let Some(alias) = column.alias() {
            let names_input = inputs.iter().any(|c| c.eq_ignore_ascii_case(alias));
            if !names_input
                && grouped
                    .iter()
                    .any(|(table, name)| table.is_none() && name.eq_ignore_ascii_case(alias))
            {
                continue;
            }
        }

        let mut bare = Vec::new();
        bare_columns(expr, &mut bare);
        if let Some(column) = bare.into_iter().find(|c| !is_grouped(grouped, c)) {
            trace!(column = %column, "ungrouped result column");
            return Err(AggregateError::UngroupedColumn(column.to_string()).into());
        }
    }
    Ok(())
}

fn check_having(having: Option<&Expression>, grouped: &[(Option<&str>, &str)]) -> Result<()> {
    let Some(having) = having else {
        return Ok(());
    };
    let mut bare = Vec::new();
    bare_columns(having, &mut bare);
    match bare.into_iter().find(|c| !is_grouped(grouped, c)) {
        Some(column) => Err(AggregateError::UngroupedHavingColumn(column.to_string()).into()),
        None => Ok(()),
    }
}

fn check_call(call: &Expression) -> Result<()> {
    let Expression::Function { name, args, .. } = call else {
        return Ok(());
    };
    for (i, arg) in args.iter().enumerate() {
        if contains_subquery(arg) {
            return Err(AggregateError::SubqueryInAggregate(name.to_lowercase()).into());
        }
        if i > 0 && contains_column(arg) {
            return Err(AggregateError::InvalidPositionalArgument {
                function: name.to_lowercase(),
                position: i + 1,
            }
            .into());
        }
    }
    Ok(())
}

/// Matches on column name; qualifiers must agree unless either side omits one.
fn is_grouped(grouped: &[(Option<&str>, &str)], column: &Expression) -> bool {
    let Some((table, name)) = column.as_column() else {
        return false;
    };
    grouped.iter().any(|(g_table, g_name)| {
        g_name.eq_ignore_ascii_case(name)
            && match (g_table, table) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => true,
            }
    })
}

/// Collects aggregate calls outside of subqueries. Calls nested inside
/// another aggregate's arguments are not collected separately.
fn aggregate_calls<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
    match expr {
        Expression::Function { name, .. } if functions::is_aggregate(name) => out.push(expr),
        Expression::Subquery { .. } => {}
        _ => expr.for_each_child(|child| aggregate_calls(child, out)),
    }
}

/// Collects column references that are not inside an aggregate call or subquery.
fn bare_columns<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
    match expr {
        Expression::Column { .. } => out.push(expr),
        Expression::Function { name, .. } if functions::is_aggregate(name) => {}
        Expression::Subquery { .. } => {}
        _ => expr.for_each_child(|child| bare_columns(child, out)),
    }
}

fn contains_subquery(expr: &Expression) -> bool {
    if matches!(expr, Expression::Subquery { .. }) {
        return true;
    }
    let mut found = false;
    expr.for_each_child(|child| found = found || contains_subquery(child));
    found
}

fn contains_column(expr: &Expression) -> bool {
    if matches!(expr, Expression::Column { .. }) {
        return true;
    }
    let mut found = false;
    expr.for_each_child(|child| found = found || contains_column(child));
    found
}
