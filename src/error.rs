//! Error types for detsql analysis runs.

use thiserror::Error;

use crate::rules::{AggregateError, JoinError};
use crate::types::DataType;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown table, column, CTE, function, procedure, or bind parameter.
    UnresolvedReference,
    /// An unqualified column matched more than one table in scope.
    AmbiguousReference,
    /// Operand, return, shape, or arity disagreement.
    TypeMismatch,
    /// Duplicate declaration of a table name.
    Redeclaration,
    /// GROUP BY / HAVING / aggregate call shape violation.
    AggregateShape,
    /// Join constraint cannot rule out a cartesian product.
    JoinShape,
    /// Statement is well-formed but not permitted here.
    Structural,
    /// Invalid table or procedure metadata.
    Catalog,
    /// The analyzer received a tree it cannot have been given by the parser.
    Internal,
}

/// Error types for detsql analysis runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // ==================== Unresolved references ====================
    /// Referenced a table, CTE, or alias that is not in scope.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Referenced a column that no table in scope exposes.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Called a function that is neither a built-in nor a declared procedure.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Used a bind parameter with no declared type.
    #[error("Unknown bind parameter: {0}")]
    UnknownBindParameter(String),

    /// Unqualified column matched more than one table.
    #[error("Ambiguous column reference: {0}")]
    AmbiguousColumn(String),

    // ==================== Type errors ====================
    /// Operand or return type disagreement.
    #[error("Type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: DataType,
        actual: DataType,
    },

    /// A compound select branch returns a different type at a position (1-based).
    #[error("Compound select shape mismatch at position {position}: expected {expected}, got {actual}")]
    CompoundShape {
        position: usize,
        expected: DataType,
        actual: DataType,
    },

    /// A compound select branch returns a different number of columns.
    #[error("Compound select arity mismatch: expected {expected} columns, got {actual}")]
    CompoundArity { expected: usize, actual: usize },

    /// Wrong number of values, arguments, or columns.
    #[error("Arity mismatch in {context}: expected {expected}, got {actual}")]
    ArityMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    // ==================== Declarations ====================
    /// A name was declared twice.
    #[error("Duplicate declaration: {0}")]
    Redeclaration(String),

    // ==================== Shape rules ====================
    /// Aggregate query shape violation.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Join constraint violation.
    #[error(transparent)]
    Join(#[from] JoinError),

    /// Statement construct not permitted in this position.
    #[error("Invalid statement: {0}")]
    Structural(String),

    // ==================== Metadata ====================
    /// Table or procedure metadata is invalid, or a snapshot could not be read.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The tree does not conform to the statement grammar.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Builds an [`Error::UnknownColumn`] naming the column as it was written.
    #[must_use]
    pub fn unknown_column(table: Option<&str>, column: &str) -> Self {
        match table {
            Some(table) => Error::UnknownColumn(format!("{table}.{column}")),
            None => Error::UnknownColumn(column.to_string()),
        }
    }

    /// Builds an [`Error::TypeMismatch`].
    #[must_use]
    pub fn type_mismatch(context: impl Into<String>, expected: DataType, actual: DataType) -> Self {
        Error::TypeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownTable(_)
            | Error::UnknownColumn(_)
            | Error::UnknownFunction(_)
            | Error::UnknownBindParameter(_) => ErrorKind::UnresolvedReference,
            Error::AmbiguousColumn(_) => ErrorKind::AmbiguousReference,
            Error::TypeMismatch { .. }
            | Error::CompoundShape { .. }
            | Error::CompoundArity { .. }
            | Error::ArityMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Redeclaration(_) => ErrorKind::Redeclaration,
            Error::Aggregate(_) => ErrorKind::AggregateShape,
            Error::Join(_) => ErrorKind::JoinShape,
            Error::Structural(_) => ErrorKind::Structural,
            Error::Catalog(_) => ErrorKind::Catalog,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error signals a malformed tree rather than a rejected query.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}
