//! Best-effort result type prediction.
//!
//! The walk is shallow and first-match: the first node that determines a
//! type wins. Operators that produce booleans are reported as `INT`, and
//! built-ins whose result depends on their arguments use the function
//! table's fixed prediction. Callers must not treat the result as a
//! guarantee.

use crate::ast::{Expression, ResultColumn, SimpleSelect};
use crate::catalog::functions;
use crate::error::{Error, Result};
use crate::types::DataType;

use super::{used_tables, TableLookup, UsedTable};

/// Predicts the type of `expr` given the tables a select core uses.
pub(crate) fn predict(
    expr: &Expression,
    used: &[UsedTable],
    tables: &impl TableLookup,
) -> Result<DataType> {
    let data_type = match expr {
        Expression::Literal(lit) => lit.data_type(),
        Expression::BindParameter(_) => DataType::Unknown,
        Expression::Column { table, column } => column_type(table.as_deref(), column, used)?,
        Expression::Unary { .. }
        | Expression::BinaryComparison { .. }
        | Expression::Arithmetic { .. }
        | Expression::StringCompare { .. }
        | Expression::Is { .. }
        | Expression::Between { .. } => DataType::Int,
        Expression::Function { name, .. } => {
            functions::lookup(name).map_or(DataType::Unknown, |f| f.predicted)
        }
        Expression::List(items) => match items.first() {
            Some(first) => predict(first, used, tables)?,
            None => DataType::Null,
        },
        Expression::Case { when_then, .. } => match when_then.first() {
            Some((_, then)) => predict(then, used, tables)?,
            None => DataType::Null,
        },
        Expression::Collate { expr, .. } | Expression::Paren(expr) => predict(expr, used, tables)?,
        Expression::Cast { data_type, .. } => *data_type,
        Expression::Subquery { select, exists, .. } => {
            if *exists {
                DataType::Int
            } else {
                match select.selects.first() {
                    Some(first) => predict_first_column(first, tables)?,
                    None => return Err(Error::Internal("select core has no simple selects".into())),
                }
            }
        }
    };
    Ok(data_type)
}

fn column_type(table: Option<&str>, column: &str, used: &[UsedTable]) -> Result<DataType> {
    let found = match table {
        Some(table) => used
            .iter()
            .filter(|t| t.reference == table)
            .find_map(|t| t.schema.get_column(column)),
        None => used.iter().find_map(|t| t.schema.get_column(column)),
    };
    found
        .map(|c| c.data_type)
        .ok_or_else(|| Error::unknown_column(table, column))
}

/// Predicts the type of a subquery's first output column.
fn predict_first_column(select: &SimpleSelect, tables: &impl TableLookup) -> Result<DataType> {
    let used = used_tables(select.from.as_ref(), tables)?;
    match select.columns.first() {
        Some(ResultColumn::Expression { expr, .. }) => predict(expr, &used, tables),
        Some(ResultColumn::Star) => Ok(used
            .first()
            .and_then(|t| t.schema.columns.first())
            .map_or(DataType::Null, |c| c.data_type)),
        Some(ResultColumn::TableStar(name)) => used
            .iter()
            .find(|t| &t.reference == name)
            .map(|t| t.schema.columns.first().map_or(DataType::Null, |c| c.data_type))
            .ok_or_else(|| Error::UnknownTable(name.clone())),
        None => Ok(DataType::Null),
    }
}
