//! Default ordering injection.
//!
//! The row store returns rows in no particular order unless told to. Every
//! select core is given trailing ORDER BY terms that fix the order of its
//! result, appended after any terms the user wrote. Nested selects are
//! ordered before the select that contains them.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::{
    Cte, Expression, FromClause, OrderBy, OrderingTerm, ResultColumn, SelectCore, SimpleSelect,
    Statement, TableRef, UpdateSetClause, UpsertAction,
};
use crate::attributes::{derive_attributes, procedure_table, table_from_attributes, TableLookup};
use crate::catalog::{functions, Catalog, ProcedureDef, TableSchema};
use crate::error::{Error, Result};

use super::{RewriteRule, Transformed};

/// Appends deterministic ORDER BY terms to every select core.
///
/// - A simple select is ordered by the primary key of every table in its
///   FROM clause, tables sorted by name and key columns sorted by name.
/// - A grouped select is ordered by its GROUP BY columns.
/// - A DISTINCT select and a compound select are ordered by their returned
///   columns.
/// - An aggregate select without GROUP BY returns one row and is left as is.
///
/// CTEs, FROM subqueries and table functions are treated as tables whose
/// primary key spans every column.
#[derive(Debug, Default)]
pub struct DefaultOrderingRule;

impl RewriteRule for DefaultOrderingRule {
    fn name(&self) -> &'static str {
        "DefaultOrdering"
    }

    fn rewrite(&self, mut stmt: Statement, catalog: &Catalog) -> Result<Transformed<Statement>> {
        let mut orderer = Orderer {
            catalog,
            synthetic: IndexMap::new(),
            changed: false,
        };
        orderer.statement(&mut stmt)?;

        if orderer.changed {
            Ok(Transformed::Yes(stmt))
        } else {
            Ok(Transformed::No(stmt))
        }
    }
}

struct Orderer<'a> {
    catalog: &'a Catalog,
    /// Tables registered for CTEs, FROM subqueries, and table functions.
    /// Keyed by exact name, matching catalog lookups.
    synthetic: IndexMap<String, TableSchema>,
    changed: bool,
}

impl TableLookup for Orderer<'_> {
    fn lookup_table(&self, name: &str) -> Option<&TableSchema> {
        self.synthetic
            .get(name)
            .or_else(|| self.catalog.get_table(name))
    }

    fn lookup_procedure(&self, name: &str) -> Option<&ProcedureDef> {
        self.catalog.get_procedure(name)
    }
}

impl Orderer<'_> {
    fn statement(&mut self, stmt: &mut Statement) -> Result<()> {
        match stmt {
            Statement::Select(select) => {
                self.ctes(&mut select.ctes)?;
                self.core(&mut select.core)
            }
            Statement::Insert(insert) => {
                self.ctes(&mut insert.ctes)?;
                for row in &mut insert.values {
                    row.iter_mut().try_for_each(|expr| self.expr(expr))?;
                }
                if let Some(upsert) = &mut insert.upsert {
                    if let Some(target) = &mut upsert.target {
                        self.opt_expr(target.where_clause.as_mut())?;
                    }
                    if let UpsertAction::DoUpdate { set, where_clause } = &mut upsert.action {
                        self.set(set)?;
                        self.opt_expr(where_clause.as_mut())?;
                    }
                }
                self.result_columns(&mut insert.returning)
            }
            Statement::Update(update) => {
                self.ctes(&mut update.ctes)?;
                self.set(&mut update.set)?;
                if let Some(from) = &mut update.from {
                    self.from(from)?;
                }
                self.opt_expr(update.where_clause.as_mut())?;
                self.result_columns(&mut update.returning)
            }
            Statement::Delete(delete) => {
                self.ctes(&mut delete.ctes)?;
                self.opt_expr(delete.where_clause.as_mut())?;
                self.result_columns(&mut delete.returning)
            }
        }
    }

    fn ctes(&mut self, ctes: &mut [Cte]) -> Result<()> {
        for cte in ctes {
            let mut attributes = derive_attributes(&mut cte.select, &*self)?;
            if !cte.columns.is_empty() {
                if cte.columns.len() != attributes.len() {
                    return Err(Error::ArityMismatch {
                        context: format!("column list of '{}'", cte.name),
                        expected: attributes.len(),
                        actual: cte.columns.len(),
                    });
                }
                for (attr, column) in attributes.iter_mut().zip(&cte.columns) {
                    attr.alias = Some(column.clone());
                }
            }
            let table = table_from_attributes(&cte.name, &attributes, true)?;
            self.register(&cte.name, table)?;
            self.core(&mut cte.select)?;
        }
        Ok(())
    }

    fn register(&mut self, name: &str, table: TableSchema) -> Result<()> {
        if self.lookup_table(name).is_some() {
            return Err(Error::Redeclaration(format!(
                "table or subquery '{name}' already exists"
            )));
        }
        trace!(table = name, "registered synthetic table");
        self.synthetic.insert(name.to_string(), table);
        Ok(())
    }

    fn core(&mut self, core: &mut SelectCore) -> Result<()> {
        for select in &mut core.selects {
            self.simple_select(select)?;
        }
        if let Some(order_by) = &mut core.order_by {
            for term in &mut order_by.terms {
                self.expr(&mut term.expr)?;
            }
        }
        if let Some(limit) = &mut core.limit {
            self.expr(&mut limit.expr)?;
            self.opt_expr(limit.offset.as_mut())?;
        }

        let terms = match core.selects.as_slice() {
            [] => return Err(Error::Internal("select core has no simple selects".into())),
            [select] => self.order_simple(select)?,
            selects => self.order_compound(selects)?,
        };
        if terms.is_empty() {
            return Ok(());
        }

        debug!(
            terms = %terms.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            "injected default ordering"
        );
        core.order_by
            .get_or_insert_with(|| OrderBy { terms: Vec::new() })
            .terms
            .extend(terms);
        self.changed = true;
        Ok(())
    }

    fn simple_select(&mut self, select: &mut SimpleSelect) -> Result<()> {
        self.result_columns(&mut select.columns)?;
        if let Some(from) = &mut select.from {
            self.from(from)?;
        }
        self.opt_expr(select.where_clause.as_mut())?;
        if let Some(group_by) = &mut select.group_by {
            for expr in &mut group_by.expressions {
                self.expr(expr)?;
            }
            self.opt_expr(group_by.having.as_mut())?;
        }
        Ok(())
    }

    fn from(&mut self, from: &mut FromClause) -> Result<()> {
        self.table_ref(&mut from.relation)?;
        for join in &mut from.joins {
            self.table_ref(&mut join.table)?;
            self.opt_expr(join.constraint.as_mut())?;
        }
        Ok(())
    }

    fn table_ref(&mut self, table: &mut TableRef) -> Result<()> {
        match table {
            TableRef::Table { .. } => Ok(()),
            TableRef::Subquery { select, alias } => {
                if let Some(alias) = alias {
                    let attributes = derive_attributes(select, &*self)?;
                    let table = table_from_attributes(alias, &attributes, true)?;
                    self.register(alias, table)?;
                }
                self.core(select)
            }
            TableRef::Function { name, args, alias } => {
                args.iter_mut().try_for_each(|arg| self.expr(arg))?;
                let reference = alias.as_deref().unwrap_or(name.as_str());
                let table = keyed(procedure_table(reference, name, &*self)?)?;
                self.register(reference, table)
            }
        }
    }

    fn set(&mut self, set: &mut [UpdateSetClause]) -> Result<()> {
        set.iter_mut().try_for_each(|clause| self.expr(&mut clause.expr))
    }

    fn result_columns(&mut self, columns: &mut [ResultColumn]) -> Result<()> {
        for column in columns {
            if let ResultColumn::Expression { expr, .. } = column {
                self.expr(expr)?;
            }
        }
        Ok(())
    }

    fn opt_expr(&mut self, expr: Option<&mut Expression>) -> Result<()> {
        expr.map_or(Ok(()), |expr| self.expr(expr))
    }

    fn expr(&mut self, expr: &mut Expression) -> Result<()> {
        if let Expression::Subquery { select, .. } = expr {
            return self.core(select);
        }
        let mut result = Ok(());
        expr.for_each_child_mut(|child| {
            if result.is_ok() {
                result = self.expr(child);
            }
        });
        result
    }

    fn order_simple(&self, select: &SimpleSelect) -> Result<Vec<OrderingTerm>> {
        let Some(from) = &select.from else {
            return Ok(Vec::new());
        };

        if let Some(group_by) = select.group_by.as_ref().filter(|g| !g.expressions.is_empty()) {
            if select.distinct {
                return Err(Error::Structural(
                    "SELECT DISTINCT with GROUP BY is not supported".into(),
                ));
            }
            let mut terms = Vec::with_capacity(group_by.expressions.len());
            for expr in &group_by.expressions {
                let mut columns = Vec::new();
                collect_columns(expr, &mut columns);
                match columns.as_slice() {
                    [] => return Ok(Vec::new()),
                    [column] => terms.push(OrderingTerm::asc_nulls_last((*column).clone())),
                    _ => {
                        return Err(Error::Structural(format!(
                            "GROUP BY term {expr} references more than one column"
                        )))
                    }
                }
            }
            return Ok(terms);
        }

        let mut used = self.used_tables(from)?;
        if select.distinct {
            return returned_column_terms(&select.columns, &mut used, true);
        }

        // a HAVING clause alone makes the select a single-group aggregate
        let having = select.group_by.as_ref().is_some_and(|g| g.having.is_some());
        if having
            || select
                .columns
                .iter()
                .filter_map(ResultColumn::expression)
                .any(contains_aggregate)
        {
            return Ok(Vec::new());
        }

        used.sort_by(|a, b| a.0.cmp(&b.0));
        let mut terms = Vec::new();
        for (reference, table) in &used {
            for column in table.sorted_primary_key() {
                terms.push(OrderingTerm::asc_nulls_last(column_ref(reference, column)));
            }
        }
        Ok(terms)
    }

    fn order_compound(&self, selects: &[SimpleSelect]) -> Result<Vec<OrderingTerm>> {
        if selects
            .iter()
            .any(|s| s.group_by.as_ref().is_some_and(|g| !g.expressions.is_empty()))
        {
            return Err(Error::Structural(
                "GROUP BY is not supported in a compound SELECT".into(),
            ));
        }
        let first = &selects[0];
        let mut used = match &first.from {
            Some(from) => self.used_tables(from)?,
            None => Vec::new(),
        };
        returned_column_terms(&first.columns, &mut used, false)
    }

    /// Resolves every relation of a FROM clause under its reference name,
    /// with a primary key. An unaliased subquery has an empty reference.
    fn used_tables(&self, from: &FromClause) -> Result<Vec<(String, TableSchema)>> {
        let mut used = Vec::new();
        for relation in from.relations() {
            let reference = relation.reference_name().unwrap_or_default().to_string();
            let entry = match relation {
                TableRef::Table { name, .. } => {
                    let table = self
                        .lookup_table(name)
                        .ok_or_else(|| Error::UnknownTable(name.clone()))?;
                    (reference, table.clone())
                }
                TableRef::Subquery {
                    select,
                    alias: None,
                } => {
                    let mut select = select.as_ref().clone();
                    let attributes = derive_attributes(&mut select, self)?;
                    (reference, table_from_attributes("subquery", &attributes, true)?)
                }
                TableRef::Subquery { .. } | TableRef::Function { .. } => {
                    let table = self.registered(&reference)?;
                    (reference, table)
                }
            };
            used.push(entry);
        }
        Ok(used)
    }

    fn registered(&self, name: &str) -> Result<TableSchema> {
        self.synthetic
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }
}

/// Gives a table a primary key over every column.
fn keyed(table: TableSchema) -> Result<TableSchema> {
    let primary_key = table.columns.iter().map(|c| c.name.clone()).collect();
    TableSchema::new(table.name, table.columns, primary_key)
}

/// Orders by each returned column in return order. Star entries expand to
/// the used tables' columns, tables and columns sorted by name.
///
/// Without `qualify`, column references are emitted unqualified so they can
/// only resolve against the output columns.
fn returned_column_terms(
    columns: &[ResultColumn],
    used: &mut [(String, TableSchema)],
    qualify: bool,
) -> Result<Vec<OrderingTerm>> {
    let qualifier = |reference: &str| if qualify { reference.to_string() } else { String::new() };

    let mut terms = Vec::new();
    for column in columns {
        match column {
            ResultColumn::Star => {
                used.sort_by(|a, b| a.0.cmp(&b.0));
                for (reference, table) in used.iter() {
                    for name in table.sorted_column_names() {
                        terms.push(OrderingTerm::asc_nulls_last(column_ref(
                            &qualifier(reference),
                            name,
                        )));
                    }
                }
            }
            ResultColumn::TableStar(name) => {
                let (reference, table) = used
                    .iter()
                    .find(|(reference, _)| reference == name)
                    .ok_or_else(|| Error::UnknownTable(name.clone()))?;
                for column in table.sorted_column_names() {
                    terms.push(OrderingTerm::asc_nulls_last(column_ref(
                        &qualifier(reference),
                        column,
                    )));
                }
            }
            ResultColumn::Expression {
                alias: Some(alias), ..
            } => terms.push(OrderingTerm::asc_nulls_last(Expression::unqualified(alias))),
            ResultColumn::Expression { expr, alias: None } => {
                let expr = match expr.as_column() {
                    Some((_, name)) if !qualify => Expression::unqualified(name),
                    _ => expr.clone(),
                };
                terms.push(OrderingTerm::asc_nulls_last(expr));
            }
        }
    }
    Ok(terms)
}

fn column_ref(reference: &str, column: &str) -> Expression {
    if reference.is_empty() {
        Expression::unqualified(column)
    } else {
        Expression::column(reference, column)
    }
}

/// Collects column references outside of subqueries.
fn collect_columns<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
    match expr {
        Expression::Column { .. } => out.push(expr),
        Expression::Subquery { .. } => {}
        _ => expr.for_each_child(|child| collect_columns(child, out)),
    }
}

fn contains_aggregate(expr: &Expression) -> bool {
    match expr {
        Expression::Function { name, .. } if functions::is_aggregate(name) => true,
        Expression::Subquery { .. } => false,
        _ => {
            let mut found = false;
            expr.for_each_child(|child| found = found || contains_aggregate(child));
            found
        }
    }
}
