//! Catalog of declared tables, procedures, and built-in functions.

pub mod functions;
mod schema;

pub use functions::FunctionDefinition;
pub use schema::{Catalog, ColumnDef, ProcedureDef, ProcedureReturn, TableSchema};
