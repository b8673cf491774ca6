//! Read-only traversal of every select and FROM clause in a statement.

use crate::ast::{
    Expression, FromClause, InsertStmt, ResultColumn, SelectCore, SimpleSelect, Statement,
    TableRef, UpdateSetClause, UpsertAction,
};
use crate::error::Result;

/// Callbacks for [`walk_statement`]. Both default to doing nothing.
pub(crate) trait Visitor {
    fn visit_select(&mut self, _select: &SimpleSelect) -> Result<()> {
        Ok(())
    }

    fn visit_from(&mut self, _from: &FromClause) -> Result<()> {
        Ok(())
    }
}

/// Visits CTE bodies, then the statement body, descending into FROM
/// subqueries and expression subqueries.
pub(crate) fn walk_statement(stmt: &Statement, v: &mut impl Visitor) -> Result<()> {
    for cte in stmt.ctes() {
        walk_core(&cte.select, v)?;
    }

    match stmt {
        Statement::Select(select) => walk_core(&select.core, v),
        Statement::Insert(insert) => walk_insert(insert, v),
        Statement::Update(update) => {
            walk_set(&update.set, v)?;
            if let Some(from) = &update.from {
                walk_from(from, v)?;
            }
            walk_opt(update.where_clause.as_ref(), v)?;
            walk_result_columns(&update.returning, v)
        }
        Statement::Delete(delete) => {
            walk_opt(delete.where_clause.as_ref(), v)?;
            walk_result_columns(&delete.returning, v)
        }
    }
}

fn walk_insert(insert: &InsertStmt, v: &mut impl Visitor) -> Result<()> {
    for row in &insert.values {
        for expr in row {
            walk_expr(expr, v)?;
        }
    }
    if let Some(upsert) = &insert.upsert {
        if let Some(target) = &upsert.target {
            walk_opt(target.where_clause.as_ref(), v)?;
        }
        if let UpsertAction::DoUpdate { set, where_clause } = &upsert.action {
            walk_set(set, v)?;
            walk_opt(where_clause.as_ref(), v)?;
        }
    }
    walk_result_columns(&insert.returning, v)
}

pub(crate) fn walk_core(core: &SelectCore, v: &mut impl Visitor) -> Result<()> {
    for select in &core.selects {
        walk_select(select, v)?;
    }
    for term in core.ordering_terms() {
        walk_expr(&term.expr, v)?;
    }
    if let Some(limit) = &core.limit {
        walk_expr(&limit.expr, v)?;
        walk_opt(limit.offset.as_ref(), v)?;
    }
    Ok(())
}

fn walk_select(select: &SimpleSelect, v: &mut impl Visitor) -> Result<()> {
    v.visit_select(select)?;
    walk_result_columns(&select.columns, v)?;
    if let Some(from) = &select.from {
        walk_from(from, v)?;
    }
    walk_opt(select.where_clause.as_ref(), v)?;
    if let Some(group_by) = &select.group_by {
        for expr in &group_by.expressions {
            walk_expr(expr, v)?;
        }
        walk_opt(group_by.having.as_ref(), v)?;
    }
    Ok(())
}

fn walk_from(from: &FromClause, v: &mut impl Visitor) -> Result<()> {
    v.visit_from(from)?;
    for relation in from.relations() {
        match relation {
            TableRef::Table { .. } => {}
            TableRef::Subquery { select, .. } => walk_core(select, v)?,
            TableRef::Function { args, .. } => {
                for arg in args {
                    walk_expr(arg, v)?;
                }
            }
        }
    }
    for join in &from.joins {
        walk_opt(join.constraint.as_ref(), v)?;
    }
    Ok(())
}

fn walk_set(set: &[UpdateSetClause], v: &mut impl Visitor) -> Result<()> {
    set.iter().try_for_each(|clause| walk_expr(&clause.expr, v))
}

fn walk_result_columns(columns: &[ResultColumn], v: &mut impl Visitor) -> Result<()> {
    columns
        .iter()
        .filter_map(ResultColumn::expression)
        .try_for_each(|expr| walk_expr(expr, v))
}

fn walk_opt(expr: Option<&Expression>, v: &mut impl Visitor) -> Result<()> {
    expr.map_or(Ok(()), |expr| walk_expr(expr, v))
}

fn walk_expr(expr: &Expression, v: &mut impl Visitor) -> Result<()> {
    if let Expression::Subquery { select, .. } = expr {
        return walk_core(select, v);
    }
    let mut result = Ok(());
    expr.for_each_child(|child| {
        if result.is_ok() {
            result = walk_expr(child, &mut *v);
        }
    });
    result
}
