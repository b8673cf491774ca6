//! Join constraint validation.

use thiserror::Error;
use tracing::trace;

use crate::ast::{ComparisonOp, Expression, FromClause, Statement};
use crate::catalog::Catalog;
use crate::error::Result;

use super::visit::{walk_statement, Visitor};
use super::ValidationRule;

/// Join constraint violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("join on {0} must have an ON constraint")]
    MissingConstraint(String),

    #[error("join constraint {0} must be an equality between two columns")]
    InvalidConstraint(String),
}

/// How a join constraint restricts a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Joinability {
    /// Places no column-level restriction on the join.
    Invalid,
    /// References a column without equating it to another.
    ContainsColumn,
    /// Equates two columns.
    Valid,
}

/// Classifies a join constraint.
///
/// Only a top-level `=` between two column-bearing sides is [`Joinability::Valid`].
/// Conjunctions are not accepted even when every conjunct is.
#[must_use]
pub fn classify(expr: &Expression) -> Joinability {
    match expr {
        Expression::Column { .. } => Joinability::ContainsColumn,
        Expression::BinaryComparison { left, op, right } => {
            let (left, right) = (classify(left), classify(right));
            if *op == ComparisonOp::Eq
                && left == Joinability::ContainsColumn
                && right == Joinability::ContainsColumn
            {
                Joinability::Valid
            } else if left > Joinability::Invalid || right > Joinability::Invalid {
                Joinability::ContainsColumn
            } else {
                Joinability::Invalid
            }
        }
        Expression::Collate { expr, .. }
        | Expression::Between { expr, .. }
        | Expression::Paren(expr)
        | Expression::Cast { expr, .. } => classify(expr),
        _ => Joinability::Invalid,
    }
}

/// Rejects joins that could produce an unrestricted cartesian product.
#[derive(Debug, Default)]
pub struct JoinRule;

impl ValidationRule for JoinRule {
    fn name(&self) -> &'static str {
        "JoinValidation"
    }

    fn validate(&self, stmt: &Statement, _catalog: &Catalog) -> Result<()> {
        walk_statement(stmt, &mut JoinVisitor)
    }
}

struct JoinVisitor;

impl Visitor for JoinVisitor {
    fn visit_from(&mut self, from: &FromClause) -> Result<()> {
        for join in &from.joins {
            let Some(constraint) = &join.constraint else {
                return Err(JoinError::MissingConstraint(join.table.to_string()).into());
            };
            if classify(constraint) != Joinability::Valid {
                return Err(JoinError::InvalidConstraint(constraint.to_string()).into());
            }
            trace!(table = %join.table, "join constraint accepted");
        }
        Ok(())
    }
}
