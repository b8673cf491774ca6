//! Type inference over statements.
//!
//! The checker is a set of mutually recursive functions grouped by what a
//! node produces:
//! - scope effects (`join_*`, `check_*`, `register_ctes`), which validate a
//!   clause and possibly extend an [`EvaluationContext`];
//! - [`TypeChecker::attribute`], which types any expression;
//! - `result_column`, which appends SELECT / RETURNING entries to an output
//!   [`Relation`];
//! - `select_core`, `simple_select`, `insert`, `update`, `delete`, which
//!   produce a whole relation.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::{
    ArithmeticOp, ConflictTarget, Cte, DeleteStmt, Expression, FromClause, InsertStmt,
    ResultColumn, SelectCore, SimpleSelect, Statement, TableRef, UnaryOp, UpdateSetClause,
    UpdateStmt, Upsert, UpsertAction,
};
use crate::catalog::{functions, Catalog, ProcedureDef, TableSchema};
use crate::error::{Error, Result};
use crate::types::DataType;

use super::relation::{Attribute, Relation};
use super::scope::EvaluationContext;

/// Declared bind parameter types, keyed by parameter name (e.g. `$id`).
pub type BindParameters = HashMap<String, DataType>;

/// Pseudo-table holding the proposed row inside `ON CONFLICT DO UPDATE`.
const EXCLUDED: &str = "excluded";

/// Infers the output relation of statements against a catalog.
///
/// One checker serves one analysis run: CTEs registered while checking a
/// statement stay visible until the checker is dropped.
#[derive(Debug)]
pub struct TypeChecker<'a> {
    catalog: &'a Catalog,
    binds: &'a BindParameters,
    arbitrary_binds: bool,
    ctes: IndexMap<String, Relation>,
}

impl<'a> TypeChecker<'a> {
    /// Creates a checker over `catalog` with the given bind parameter types.
    #[must_use]
    pub fn new(catalog: &'a Catalog, binds: &'a BindParameters) -> Self {
        TypeChecker {
            catalog,
            binds,
            arbitrary_binds: false,
            ctes: IndexMap::new(),
        }
    }

    /// Types undeclared bind parameters as `UNKNOWN` instead of failing.
    #[must_use]
    pub fn with_arbitrary_binds(mut self, arbitrary_binds: bool) -> Self {
        self.arbitrary_binds = arbitrary_binds;
        self
    }

    /// Relations of the CTEs registered so far, in declaration order.
    #[must_use]
    pub fn ctes(&self) -> &IndexMap<String, Relation> {
        &self.ctes
    }

    /// Consumes the checker, returning the registered CTE relations.
    #[must_use]
    pub fn into_ctes(self) -> IndexMap<String, Relation> {
        self.ctes
    }

    /// Infers the relation a statement returns.
    ///
    /// INSERT, UPDATE, and DELETE without RETURNING return an empty relation.
    ///
    /// # Errors
    ///
    /// Returns the first resolution, typing, or declaration error found.
    pub fn check(&mut self, stmt: &Statement) -> Result<Relation> {
        self.register_ctes(stmt.ctes())?;
        let ctx = EvaluationContext::new();
        let relation = match stmt {
            Statement::Select(select) => self.select_core(&select.core, &ctx),
            Statement::Insert(insert) => self.insert(insert, &ctx),
            Statement::Update(update) => self.update(update, &ctx),
            Statement::Delete(delete) => self.delete(delete, &ctx),
        }?;
        debug!(columns = relation.len(), ctes = self.ctes.len(), "statement typed");
        Ok(relation)
    }

    // ==================== Scope effects ====================

    fn register_ctes(&mut self, ctes: &[Cte]) -> Result<()> {
        for cte in ctes {
            let mut relation = self.select_core(&cte.select, &EvaluationContext::new())?;

            if self.ctes.contains_key(&cte.name) || self.catalog.table_exists(&cte.name) {
                return Err(Error::Redeclaration(format!(
                    "common table expression '{}' conflicts with an existing table",
                    cte.name
                )));
            }

            if !cte.columns.is_empty() {
                if cte.columns.len() != relation.len() {
                    return Err(Error::ArityMismatch {
                        context: format!("column list of '{}'", cte.name),
                        expected: relation.len(),
                        actual: cte.columns.len(),
                    });
                }
                relation = relation
                    .attributes()
                    .iter()
                    .zip(&cte.columns)
                    .map(|(attr, name)| attr.clone().renamed(name.clone()))
                    .collect();
            }

            trace!(cte = %cte.name, columns = relation.len(), "registered common table expression");
            self.ctes.insert(cte.name.clone(), relation);
        }
        Ok(())
    }

    /// Resolves a table or CTE name to its relation.
    fn table(&self, name: &str) -> Result<Relation> {
        if let Some(relation) = self.ctes.get(name) {
            return Ok(relation.clone());
        }
        self.catalog
            .get_table(name)
            .map(Relation::from_table)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Resolves the target of INSERT / UPDATE / DELETE, which must be a base table.
    fn target_table(&self, name: &str, verb: &str) -> Result<&'a TableSchema> {
        if self.ctes.contains_key(name) {
            return Err(Error::Structural(format!(
                "cannot {verb} common table expression '{name}'"
            )));
        }
        self.catalog
            .get_table(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    fn join_from(&self, from: &FromClause, ctx: &mut EvaluationContext) -> Result<()> {
        self.join_table_ref(&from.relation, ctx)?;
        for join in &from.joins {
            self.join_table_ref(&join.table, ctx)?;
            if let Some(constraint) = &join.constraint {
                let attr = self.attribute(constraint, ctx)?;
                expect_type("join constraint", DataType::Bool, &attr)?;
            }
        }
        Ok(())
    }

    fn join_table_ref(&self, table: &TableRef, ctx: &mut EvaluationContext) -> Result<()> {
        match table {
            TableRef::Table { name, alias } => {
                let relation = self.table(name)?;
                ctx.join(alias.as_deref().unwrap_or(name), &relation)
            }
            TableRef::Subquery { select, alias } => {
                let relation = self.select_core(select, ctx)?;
                ctx.join(alias.as_deref().unwrap_or(""), &relation)
            }
            TableRef::Function { name, args, alias } => {
                let procedure = self
                    .catalog
                    .get_procedure(name)
                    .ok_or_else(|| Error::UnknownFunction(name.clone()))?;
                let fields = match &procedure.returns {
                    Some(ret) if ret.is_table => &ret.fields,
                    _ => {
                        return Err(Error::Structural(format!(
                            "procedure '{name}' does not return a table"
                        )))
                    }
                };
                self.check_procedure_args(procedure, args, ctx)?;
                let relation: Relation = fields
                    .iter()
                    .map(|f| Attribute::new(f.name.clone(), f.data_type))
                    .collect();
                ctx.join(alias.as_deref().unwrap_or(name), &relation)
            }
        }
    }

    fn check_order_and_limit(&self, core: &SelectCore, ctx: &EvaluationContext) -> Result<()> {
        for term in core.ordering_terms() {
            self.attribute(&term.expr, ctx)?;
        }
        if let Some(limit) = &core.limit {
            let attr = self.attribute(&limit.expr, ctx)?;
            expect_type("LIMIT", DataType::Int, &attr)?;
            if let Some(offset) = &limit.offset {
                let attr = self.attribute(offset, ctx)?;
                expect_type("OFFSET", DataType::Int, &attr)?;
            }
        }
        Ok(())
    }

    /// Checks SET clauses against the first joined table.
    fn check_set(&self, set: &[UpdateSetClause], ctx: &EvaluationContext) -> Result<()> {
        let target = ctx
            .join_order()
            .next()
            .ok_or_else(|| Error::Internal("no table to update".into()))?;
        for clause in set {
            let value = self.attribute(&clause.expr, ctx)?;
            for column in &clause.columns {
                let attr = ctx.find_column(Some(target), column)?;
                // a multi-column target takes a row value
                if clause.columns.len() == 1 && !attr.data_type.is_compatible(&value.data_type) {
                    return Err(Error::type_mismatch(
                        format!("SET {column}"),
                        attr.data_type,
                        value.data_type,
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_upsert(&self, upsert: &Upsert, ctx: &EvaluationContext) -> Result<()> {
        if let Some(ConflictTarget {
            columns,
            where_clause,
        }) = &upsert.target
        {
            let target = ctx
                .join_order()
                .next()
                .ok_or_else(|| Error::Internal("no conflict target table".into()))?;
            for column in columns {
                ctx.find_column(Some(target), column)?;
            }
            if let Some(filter) = where_clause {
                let attr = self.attribute(filter, ctx)?;
                expect_type("conflict target WHERE", DataType::Bool, &attr)?;
            }
        }

        if let UpsertAction::DoUpdate { set, where_clause } = &upsert.action {
            self.check_set(set, ctx)?;
            if let Some(filter) = where_clause {
                let attr = self.attribute(filter, ctx)?;
                expect_type("DO UPDATE WHERE", DataType::Bool, &attr)?;
            }
        }
        Ok(())
    }

    fn check_procedure_args(
        &self,
        procedure: &ProcedureDef,
        args: &[Expression],
        ctx: &EvaluationContext,
    ) -> Result<()> {
        if args.len() != procedure.parameters.len() {
            return Err(Error::ArityMismatch {
                context: format!("call to {}", procedure.name),
                expected: procedure.parameters.len(),
                actual: args.len(),
            });
        }
        for (arg, param) in args.iter().zip(&procedure.parameters) {
            let attr = self.attribute(arg, ctx)?;
            expect_type(&format!("argument to {}", procedure.name), *param, &attr)?;
        }
        Ok(())
    }

    // ==================== Expressions ====================

    /// Infers the type of an expression in `ctx`.
    ///
    /// Column references keep their name; every other expression yields an
    /// anonymous attribute.
    ///
    /// # Errors
    ///
    /// Returns a resolution or typing error for the first invalid sub-expression.
    pub fn attribute(&self, expr: &Expression, ctx: &EvaluationContext) -> Result<Attribute> {
        let data_type = match expr {
            Expression::Literal(lit) => lit.data_type(),
            Expression::BindParameter(name) => match self.binds.get(name) {
                Some(data_type) => *data_type,
                None if self.arbitrary_binds => DataType::Unknown,
                None => return Err(Error::UnknownBindParameter(name.clone())),
            },
            Expression::Column { table, column } => {
                return ctx.find_column(table.as_deref(), column);
            }
            Expression::Unary { op, operand } => {
                let attr = self.attribute(operand, ctx)?;
                let expected = if *op == UnaryOp::Not {
                    DataType::Bool
                } else {
                    DataType::Int
                };
                expect_type("unary expression", expected, &attr)?;
                expected
            }
            Expression::BinaryComparison { left, op, right } => {
                let l = self.attribute(left, ctx)?;
                let r = self.attribute(right, ctx)?;
                if op.is_logical() {
                    expect_type(&format!("{op} operand"), DataType::Bool, &l)?;
                    expect_type(&format!("{op} operand"), DataType::Bool, &r)?;
                } else if !l.data_type.is_compatible(&r.data_type) {
                    let context = if op.is_membership() {
                        format!("{op} list")
                    } else {
                        "comparison".to_string()
                    };
                    return Err(Error::type_mismatch(context, l.data_type, r.data_type));
                }
                DataType::Bool
            }
            Expression::Arithmetic { left, op, right } => {
                let expected = if *op == ArithmeticOp::Concat {
                    DataType::Text
                } else {
                    DataType::Int
                };
                let l = self.attribute(left, ctx)?;
                expect_type("arithmetic expression", expected, &l)?;
                let r = self.attribute(right, ctx)?;
                expect_type("arithmetic expression", expected, &r)?;
                expected
            }
            Expression::StringCompare {
                left,
                right,
                escape,
                ..
            } => {
                let l = self.attribute(left, ctx)?;
                let r = self.attribute(right, ctx)?;
                if !l.data_type.is_compatible(&r.data_type) {
                    return Err(Error::type_mismatch(
                        "string comparison",
                        l.data_type,
                        r.data_type,
                    ));
                }
                if let Some(escape) = escape {
                    let e = self.attribute(escape, ctx)?;
                    expect_type("ESCAPE", DataType::Text, &e)?;
                }
                DataType::Bool
            }
            Expression::Is { left, right, .. } => {
                let l = self.attribute(left, ctx)?;
                let r = self.attribute(right, ctx)?;
                if !l.data_type.is_compatible(&r.data_type) {
                    return Err(Error::type_mismatch("IS", l.data_type, r.data_type));
                }
                DataType::Bool
            }
            Expression::Between {
                expr, low, high, ..
            } => {
                let e = self.attribute(expr, ctx)?;
                let l = self.attribute(low, ctx)?;
                expect_type("BETWEEN", e.data_type, &l)?;
                let h = self.attribute(high, ctx)?;
                expect_type("BETWEEN", e.data_type, &h)?;
                DataType::Bool
            }
            Expression::Function {
                name,
                args,
                distinct,
                star,
            } => self.function(name, args, *distinct, *star, ctx)?,
            Expression::List(items) => {
                let mut types = Vec::with_capacity(items.len());
                for item in items {
                    types.push(self.attribute(item, ctx)?.data_type);
                }
                unify("expression list", &types)?
            }
            Expression::Case {
                operand,
                when_then,
                else_expr,
            } => {
                let operand = match operand {
                    Some(operand) => Some(self.attribute(operand, ctx)?),
                    None => None,
                };
                let mut results = Vec::with_capacity(when_then.len() + 1);
                for (when, then) in when_then {
                    let w = self.attribute(when, ctx)?;
                    match &operand {
                        Some(operand) => expect_type("CASE WHEN", operand.data_type, &w)?,
                        None => expect_type("CASE WHEN", DataType::Bool, &w)?,
                    }
                    results.push(self.attribute(then, ctx)?.data_type);
                }
                if let Some(else_expr) = else_expr {
                    results.push(self.attribute(else_expr, ctx)?.data_type);
                }
                unify("CASE result", &results)?
            }
            Expression::Collate { expr, .. } | Expression::Paren(expr) => {
                return self.attribute(expr, ctx);
            }
            Expression::Cast { expr, data_type } => {
                let inner = self.attribute(expr, ctx)?;
                return Ok(Attribute::new(inner.name, *data_type));
            }
            Expression::Subquery { select, exists, .. } => {
                let relation = self.select_core(select, ctx)?;
                if *exists {
                    DataType::Bool
                } else {
                    if relation.len() != 1 {
                        return Err(Error::ArityMismatch {
                            context: "scalar subquery".into(),
                            expected: 1,
                            actual: relation.len(),
                        });
                    }
                    relation.shape()[0]
                }
            }
        };
        Ok(Attribute::anonymous(data_type))
    }

    fn function(
        &self,
        name: &str,
        args: &[Expression],
        distinct: bool,
        star: bool,
        ctx: &EvaluationContext,
    ) -> Result<DataType> {
        if let Some(def) = functions::lookup(name) {
            if distinct && !def.aggregate {
                return Err(Error::Structural(format!(
                    "DISTINCT is only allowed in aggregate functions, not {name}"
                )));
            }
            let mut types = Vec::with_capacity(args.len());
            for arg in args {
                types.push(self.attribute(arg, ctx)?.data_type);
            }
            return def.check(&types, star);
        }

        let procedure = self
            .catalog
            .get_procedure(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
        if star || distinct {
            return Err(Error::Structural(format!(
                "procedure '{name}' cannot be called with * or DISTINCT"
            )));
        }
        self.check_procedure_args(procedure, args, ctx)?;
        Ok(procedure.scalar_type())
    }

    // ==================== Result columns ====================

    fn result_column(
        &self,
        column: &ResultColumn,
        ctx: &EvaluationContext,
        out: &mut Relation,
    ) -> Result<()> {
        match column {
            ResultColumn::Star => {
                let mut any = false;
                for relation in ctx.joined_relations() {
                    expand_star(relation, out)?;
                    any = true;
                }
                if !any {
                    return Err(Error::Structural("* requires a FROM clause".into()));
                }
                Ok(())
            }
            ResultColumn::TableStar(table) => {
                let relation = ctx
                    .joined(table)
                    .ok_or_else(|| Error::UnknownTable(table.clone()))?;
                expand_star(relation, out)
            }
            ResultColumn::Expression { expr, alias } => {
                let mut attr = self.attribute(expr, ctx)?;
                if let Some(alias) = alias {
                    attr = attr.renamed(alias.clone());
                }
                out.add(attr);
                Ok(())
            }
        }
    }

    fn returning(&self, columns: &[ResultColumn], ctx: &EvaluationContext) -> Result<Relation> {
        let mut out = Relation::new();
        for column in columns {
            if let ResultColumn::TableStar(table) = column {
                return Err(Error::Structural(format!(
                    "{table}.* is not permitted in RETURNING"
                )));
            }
            self.result_column(column, ctx, &mut out)?;
        }
        Ok(out)
    }

    // ==================== Relations ====================

    /// Infers the relation a select core returns, checking compound shapes.
    ///
    /// `ctx` is the enclosing scope; its tables become outer tables of every
    /// branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CompoundShape`] or [`Error::CompoundArity`] if branches
    /// disagree, or any error from the branches themselves.
    pub fn select_core(&self, core: &SelectCore, ctx: &EvaluationContext) -> Result<Relation> {
        let Some((first, rest)) = core.selects.split_first() else {
            return Err(Error::Internal("select core has no simple selects".into()));
        };
        if first.compound.is_some() || rest.iter().any(|s| s.compound.is_none()) {
            return Err(Error::Internal(
                "compound operators must join every select after the first".into(),
            ));
        }

        // every branch and the compound ORDER BY start from the same scope
        let base = ctx.scope();
        let mut first_ctx = base.copy();
        let result = self.simple_select(first, &mut first_ctx)?;
        let expected = result.shape();

        for select in rest {
            let mut branch_ctx = base.copy();
            let shape = self.simple_select(select, &mut branch_ctx)?.shape();
            if shape.len() != expected.len() {
                return Err(Error::CompoundArity {
                    expected: expected.len(),
                    actual: shape.len(),
                });
            }
            for (i, (want, got)) in expected.iter().zip(&shape).enumerate() {
                if !want.is_compatible(got) {
                    return Err(Error::CompoundShape {
                        position: i + 1,
                        expected: *want,
                        actual: *got,
                    });
                }
            }
        }

        let order_ctx = if rest.is_empty() {
            // output aliases are reachable when they do not shadow a joined column
            let aliases: Relation = result
                .attributes()
                .iter()
                .filter(|a| !a.is_anonymous())
                .filter(|a| matches!(first_ctx.find_column(None, &a.name), Err(Error::UnknownColumn(_))))
                .cloned()
                .collect();
            if !aliases.is_empty() {
                first_ctx.join("", &aliases)?;
            }
            first_ctx
        } else {
            let mut compound_ctx = base.copy();
            compound_ctx.join("", &result)?;
            compound_ctx
        };
        self.check_order_and_limit(core, &order_ctx)?;

        Ok(result)
    }

    fn simple_select(&self, select: &SimpleSelect, ctx: &mut EvaluationContext) -> Result<Relation> {
        if let Some(from) = &select.from {
            self.join_from(from, ctx)?;
        }

        if let Some(filter) = &select.where_clause {
            let attr = self.attribute(filter, ctx)?;
            expect_type("WHERE", DataType::Bool, &attr)?;
        }

        if let Some(group_by) = &select.group_by {
            for expr in &group_by.expressions {
                self.attribute(expr, ctx)?;
            }
            if let Some(having) = &group_by.having {
                let attr = self.attribute(having, ctx)?;
                expect_type("HAVING", DataType::Bool, &attr)?;
            }
        }

        let mut result = Relation::new();
        for column in &select.columns {
            self.result_column(column, ctx, &mut result)?;
        }
        Ok(result)
    }

    fn insert(&self, insert: &InsertStmt, ctx: &EvaluationContext) -> Result<Relation> {
        let table = self.target_table(&insert.table, "insert into")?;

        let columns: Vec<&str> = if insert.columns.is_empty() {
            table.columns.iter().map(|c| c.name.as_str()).collect()
        } else {
            insert.columns.iter().map(String::as_str).collect()
        };
        let mut column_types = Vec::with_capacity(columns.len());
        for column in &columns {
            let def = table
                .get_column(column)
                .ok_or_else(|| Error::unknown_column(Some(&table.name), column))?;
            column_types.push(def.data_type);
        }

        // the alias is not visible to VALUES or the conflict clause
        let values_ctx = ctx.scope();
        for row in &insert.values {
            if row.len() != columns.len() {
                return Err(Error::ArityMismatch {
                    context: format!("VALUES row for {}", table.name),
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            for ((value, column), expected) in row.iter().zip(&columns).zip(&column_types) {
                let attr = self.attribute(value, &values_ctx)?;
                expect_type(&format!("value for column {column}"), *expected, &attr)?;
            }
        }

        let relation = Relation::from_table(table);
        if let Some(upsert) = &insert.upsert {
            let mut upsert_ctx = ctx.scope();
            upsert_ctx.join(&table.name, &relation)?;
            upsert_ctx.join(EXCLUDED, &relation)?;
            self.check_upsert(upsert, &upsert_ctx)?;
        }

        let mut returning_ctx = ctx.scope();
        returning_ctx.join(insert.alias.as_deref().unwrap_or(&table.name), &relation)?;
        self.returning(&insert.returning, &returning_ctx)
    }

    fn update(&self, update: &UpdateStmt, ctx: &EvaluationContext) -> Result<Relation> {
        let table = self.target_table(&update.table.name, "update")?;

        let mut update_ctx = ctx.scope();
        update_ctx.join(update.table.reference_name(), &Relation::from_table(table))?;
        if let Some(from) = &update.from {
            self.join_from(from, &mut update_ctx)?;
        }

        self.check_set(&update.set, &update_ctx)?;

        if let Some(filter) = &update.where_clause {
            let attr = self.attribute(filter, &update_ctx)?;
            expect_type("WHERE", DataType::Bool, &attr)?;
        }

        self.returning(&update.returning, &update_ctx)
    }

    fn delete(&self, delete: &DeleteStmt, ctx: &EvaluationContext) -> Result<Relation> {
        let table = self.target_table(&delete.table.name, "delete from")?;

        let mut delete_ctx = ctx.scope();
        delete_ctx.join(delete.table.reference_name(), &Relation::from_table(table))?;

        if let Some(filter) = &delete.where_clause {
            let attr = self.attribute(filter, &delete_ctx)?;
            expect_type("WHERE", DataType::Bool, &attr)?;
        }

        self.returning(&delete.returning, &delete_ctx)
    }
}

fn expect_type(context: &str, expected: DataType, actual: &Attribute) -> Result<()> {
    if expected.is_compatible(&actual.data_type) {
        Ok(())
    } else {
        Err(Error::type_mismatch(context, expected, actual.data_type))
    }
}

/// Every type must be compatible with the first concrete one, which is returned.
fn unify(context: &str, types: &[DataType]) -> Result<DataType> {
    let Some(first) = types.iter().copied().find(|t| !t.is_wildcard()) else {
        return Ok(types.first().copied().unwrap_or(DataType::Null));
    };
    for t in types {
        if !first.is_compatible(t) {
            return Err(Error::type_mismatch(context, first, *t));
        }
    }
    Ok(first)
}

fn expand_star(relation: &Relation, out: &mut Relation) -> Result<()> {
    if relation.first_anonymous().is_some() {
        return Err(Error::Structural(
            "cannot expand * over an unnamed column".into(),
        ));
    }
    out.merge(relation);
    Ok(())
}
