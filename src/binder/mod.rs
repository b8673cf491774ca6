//! Binder module for semantic analysis.
//!
//! The binder resolves table and column names against the catalog, tracks
//! scopes through joins, subqueries, and compound selects, and infers the
//! typed [`Relation`] every statement returns.

mod relation;
mod scope;
mod semantic;

pub use relation::{Attribute, Relation};
pub use scope::EvaluationContext;
pub use semantic::{BindParameters, TypeChecker};
