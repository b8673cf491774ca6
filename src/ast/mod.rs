//! Abstract syntax tree handed over by the SQL parser.
//!
//! Expressions and statements are closed sum types; every pass matches on
//! them exhaustively.

mod display;
mod expression;
mod statement;

pub use expression::{ArithmeticOp, ComparisonOp, Expression, Literal, StringOp, UnaryOp};
pub use statement::{
    CompoundOperator, ConflictTarget, Cte, DeleteStmt, FromClause, GroupBy, InsertStmt, JoinKind,
    JoinPredicate, Limit, NullOrder, OrderBy, OrderType, OrderingTerm, QualifiedTableName,
    ResultColumn, SelectCore, SelectStmt, SimpleSelect, Statement, TableRef, UpdateSetClause,
    UpdateStmt, Upsert, UpsertAction,
};
