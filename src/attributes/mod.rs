//! Schema derivation for select cores.
//!
//! Computes the ordered output columns of a select core ahead of execution
//! and turns them into synthetic table definitions. The default-ordering
//! rule uses this to give CTEs and FROM subqueries a primary key.

mod predict;

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use crate::ast::{Expression, FromClause, ResultColumn, SelectCore, SimpleSelect, TableRef};
use crate::catalog::{Catalog, ColumnDef, ProcedureDef, TableSchema};
use crate::error::{Error, Result};
use crate::types::DataType;

use predict::predict;

/// Source of table (and table-function) definitions for schema derivation.
pub trait TableLookup {
    /// Returns the table registered under `name`.
    fn lookup_table(&self, name: &str) -> Option<&TableSchema>;

    /// Returns the procedure registered under `name`.
    fn lookup_procedure(&self, _name: &str) -> Option<&ProcedureDef> {
        None
    }
}

impl TableLookup for Catalog {
    fn lookup_table(&self, name: &str) -> Option<&TableSchema> {
        self.get_table(name)
    }

    fn lookup_procedure(&self, name: &str) -> Option<&ProcedureDef> {
        self.get_procedure(name)
    }
}

impl TableLookup for IndexMap<String, TableSchema> {
    fn lookup_table(&self, name: &str) -> Option<&TableSchema> {
        self.get(name)
    }
}

/// One derived output column.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationAttribute {
    /// Expression producing the column. Star expansion yields column references.
    pub expr: Expression,
    pub alias: Option<String>,
    /// Predicted type.
    pub data_type: DataType,
}

impl RelationAttribute {
    /// Name the column is exposed under: its alias, else its column name.
    /// Unaliased computed expressions have no name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.alias
            .as_deref()
            .or_else(|| self.expr.as_column().map(|(_, column)| column))
    }
}

/// A table used in a FROM clause, under the name it is referenced by.
#[derive(Debug, Clone)]
pub(crate) struct UsedTable {
    /// Alias or table name; empty for an unaliased subquery.
    pub reference: String,
    pub schema: TableSchema,
}

/// Derives the output columns of a select core from its first simple select.
///
/// When the select uses exactly one named table, unqualified column
/// references in the result list are rewritten in place to carry that
/// table's name.
///
/// # Errors
///
/// Returns an error if a referenced table or column is unknown, or if a FROM
/// subquery exposes an unaliased computed column.
pub fn derive_attributes(
    core: &mut SelectCore,
    tables: &impl TableLookup,
) -> Result<Vec<RelationAttribute>> {
    let select = core
        .selects
        .first_mut()
        .ok_or_else(|| Error::Internal("select core has no simple selects".into()))?;
    let used = used_tables(select.from.as_ref(), tables)?;

    if let [only] = used.as_slice() {
        if !only.reference.is_empty() {
            backfill_qualifiers(select, &only.reference);
        }
    }

    expand(&select.columns, &used, tables)
}

fn backfill_qualifiers(select: &mut SimpleSelect, reference: &str) {
    for result in &mut select.columns {
        if let ResultColumn::Expression {
            expr: Expression::Column { table: table @ None, column },
            ..
        } = result
        {
            trace!(table = reference, column = %column, "qualified result column");
            *table = Some(reference.to_string());
        }
    }
}

/// Derives output columns without modifying the select.
fn attributes_of(select: &SimpleSelect, tables: &impl TableLookup) -> Result<Vec<RelationAttribute>> {
    let used = used_tables(select.from.as_ref(), tables)?;
    expand(&select.columns, &used, tables)
}

fn expand(
    columns: &[ResultColumn],
    used: &[UsedTable],
    tables: &impl TableLookup,
) -> Result<Vec<RelationAttribute>> {
    let mut out = Vec::new();
    for column in columns {
        match column {
            ResultColumn::Star => {
                for table in used {
                    out.extend(table_columns(table));
                }
            }
            ResultColumn::TableStar(name) => {
                let table = used
                    .iter()
                    .find(|t| &t.reference == name)
                    .ok_or_else(|| Error::UnknownTable(name.clone()))?;
                out.extend(table_columns(table));
            }
            ResultColumn::Expression { expr, alias } => out.push(RelationAttribute {
                expr: expr.clone(),
                alias: alias.clone(),
                data_type: predict(expr, used, tables)?,
            }),
        }
    }
    Ok(out)
}

fn table_columns(table: &UsedTable) -> impl Iterator<Item = RelationAttribute> + '_ {
    let qualifier = (!table.reference.is_empty()).then(|| table.reference.clone());
    table.schema.columns.iter().map(move |c| RelationAttribute {
        expr: Expression::Column {
            table: qualifier.clone(),
            column: c.name.clone(),
        },
        alias: None,
        data_type: c.data_type,
    })
}

/// Resolves every relation of a FROM clause, in join order.
pub(crate) fn used_tables(
    from: Option<&FromClause>,
    tables: &impl TableLookup,
) -> Result<Vec<UsedTable>> {
    let Some(from) = from else {
        return Ok(Vec::new());
    };

    let mut used = Vec::new();
    for relation in from.relations() {
        let table = match relation {
            TableRef::Table { name, alias } => UsedTable {
                reference: alias.clone().unwrap_or_else(|| name.clone()),
                schema: tables
                    .lookup_table(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownTable(name.clone()))?,
            },
            TableRef::Subquery { select, alias } => {
                let first = select
                    .selects
                    .first()
                    .ok_or_else(|| Error::Internal("select core has no simple selects".into()))?;
                let attributes = attributes_of(first, tables)?;
                let name = alias.as_deref().unwrap_or("subquery");
                UsedTable {
                    reference: alias.clone().unwrap_or_default(),
                    schema: table_from_attributes(name, &attributes, false)?,
                }
            }
            TableRef::Function { name, alias, .. } => {
                let reference = alias.clone().unwrap_or_else(|| name.clone());
                UsedTable {
                    schema: procedure_table(&reference, name, tables)?,
                    reference,
                }
            }
        };
        used.push(table);
    }
    Ok(used)
}

/// Builds the synthetic table a table-returning procedure exposes.
pub(crate) fn procedure_table(
    reference: &str,
    name: &str,
    tables: &impl TableLookup,
) -> Result<TableSchema> {
    let procedure = tables
        .lookup_procedure(name)
        .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
    match &procedure.returns {
        Some(ret) if ret.is_table => {
            TableSchema::new(reference.to_string(), ret.fields.clone(), Vec::new())
        }
        _ => Err(Error::Structural(format!(
            "procedure '{name}' does not return a table"
        ))),
    }
}

/// Builds a synthetic table definition from derived columns.
///
/// Column references keep their column name unless aliased; any other
/// expression must be aliased. Repeated names get a positional suffix. With
/// `with_primary_key`, the primary key spans every column.
///
/// # Errors
///
/// Returns [`Error::Structural`] if a computed column has no alias.
pub fn table_from_attributes(
    name: &str,
    attributes: &[RelationAttribute],
    with_primary_key: bool,
) -> Result<TableSchema> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(attributes.len());

    for (i, attr) in attributes.iter().enumerate() {
        let base = attr.name().ok_or_else(|| {
            Error::Structural(format!(
                "expression '{}' in '{name}' must have an alias",
                attr.expr
            ))
        })?;

        let mut column = base.to_string();
        let mut position = i + 1;
        while !seen.insert(column.clone()) {
            column = format!("{base}_{position}");
            position += 1;
        }
        columns.push(ColumnDef::new(column, attr.data_type)?);
    }

    let primary_key = if with_primary_key {
        columns.iter().map(|c| c.name.clone()).collect()
    } else {
        Vec::new()
    };

    TableSchema::new(name.to_string(), columns, primary_key)
}
