//! Structural rules applied around type checking.
//!
//! Validation rules reject statements whose results could differ between
//! nodes. Rewrite rules transform a statement so its results cannot.

mod aggregate;
mod join;
mod ordering;
mod visit;

pub use aggregate::{AggregateError, AggregateRule};
pub use join::{classify, JoinError, JoinRule, Joinability};
pub use ordering::DefaultOrderingRule;

use crate::ast::Statement;
use crate::catalog::Catalog;
use crate::error::Result;

/// Result of a rewrite.
#[derive(Debug)]
pub enum Transformed<T> {
    /// Statement was modified.
    Yes(T),
    /// Statement unchanged.
    No(T),
}

impl<T> Transformed<T> {
    /// Returns the inner value.
    pub fn into_inner(self) -> T {
        match self {
            Transformed::Yes(v) | Transformed::No(v) => v,
        }
    }

    /// Returns true if the statement was modified.
    #[must_use]
    pub fn was_transformed(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }
}

/// A check that accepts or rejects a statement without modifying it.
pub trait ValidationRule: Send + Sync {
    /// Returns the name of this rule.
    fn name(&self) -> &'static str;

    /// Validates every select reachable from `stmt`, nested ones included.
    /// `catalog` resolves the tables the statement reads.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    fn validate(&self, stmt: &Statement, catalog: &Catalog) -> Result<()>;
}

/// A transformation over a type-checked statement.
pub trait RewriteRule: Send + Sync {
    /// Returns the name of this rule.
    fn name(&self) -> &'static str;

    /// Rewrites the statement if applicable.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be rewritten.
    fn rewrite(&self, stmt: Statement, catalog: &Catalog) -> Result<Transformed<Statement>>;
}
