//! Expression tree for SQL statements.

use crate::types::DataType;

use super::statement::SelectCore;

/// Literal values in SQL statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Text literal.
    Text(String),
    /// 64-bit integer literal.
    Numeric(i64),
    /// TRUE / FALSE.
    Boolean(bool),
    /// NULL.
    Null,
    /// Blob literal.
    Blob(Vec<u8>),
}

impl Literal {
    /// Returns the type of the literal.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Text(_) => DataType::Text,
            Literal::Numeric(_) => DataType::Int,
            Literal::Boolean(_) => DataType::Bool,
            Literal::Null => DataType::Null,
            Literal::Blob(_) => DataType::Blob,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
}

/// Binary comparison operators, including logical connectives and IN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    In,
    NotIn,
}

impl ComparisonOp {
    /// Returns true for AND / OR.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, ComparisonOp::And | ComparisonOp::Or)
    }

    /// Returns true for IN / NOT IN.
    #[must_use]
    pub fn is_membership(self) -> bool {
        matches!(self, ComparisonOp::In | ComparisonOp::NotIn)
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// `||` string concatenation.
    Concat,
}

/// Pattern-matching string operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Like,
    NotLike,
}

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value.
    Literal(Literal),
    /// `$name` bind parameter.
    BindParameter(String),
    /// Column reference with an optional table qualifier.
    Column {
        table: Option<String>,
        column: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    BinaryComparison {
        left: Box<Expression>,
        op: ComparisonOp,
        right: Box<Expression>,
    },
    Arithmetic {
        left: Box<Expression>,
        op: ArithmeticOp,
        right: Box<Expression>,
    },
    /// LIKE / NOT LIKE with optional ESCAPE.
    StringCompare {
        left: Box<Expression>,
        op: StringOp,
        right: Box<Expression>,
        escape: Option<Box<Expression>>,
    },
    /// `left IS [NOT] [DISTINCT FROM] right`.
    Is {
        left: Box<Expression>,
        not: bool,
        distinct: bool,
        right: Box<Expression>,
    },
    /// `expr [NOT] BETWEEN low AND high`.
    Between {
        expr: Box<Expression>,
        not: bool,
        low: Box<Expression>,
        high: Box<Expression>,
    },
    /// Function call. `star` is set for `f(*)`.
    Function {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
        star: bool,
    },
    /// Parenthesized list, e.g. the right side of IN.
    List(Vec<Expression>),
    Case {
        operand: Option<Box<Expression>>,
        when_then: Vec<(Expression, Expression)>,
        else_expr: Option<Box<Expression>>,
    },
    Collate {
        expr: Box<Expression>,
        collation: String,
    },
    Paren(Box<Expression>),
    /// `expr::TYPE`.
    Cast {
        expr: Box<Expression>,
        data_type: DataType,
    },
    /// Scalar subquery, or `[NOT] EXISTS (...)` when `exists` is set.
    Subquery {
        select: Box<SelectCore>,
        exists: bool,
        not: bool,
    },
}

impl Expression {
    /// `table.column`.
    #[must_use]
    pub fn column(table: &str, column: &str) -> Self {
        Expression::Column {
            table: Some(table.to_string()),
            column: column.to_string(),
        }
    }

    /// Unqualified column reference.
    #[must_use]
    pub fn unqualified(column: &str) -> Self {
        Expression::Column {
            table: None,
            column: column.to_string(),
        }
    }

    #[must_use]
    pub fn int(value: i64) -> Self {
        Expression::Literal(Literal::Numeric(value))
    }

    #[must_use]
    pub fn text(value: &str) -> Self {
        Expression::Literal(Literal::Text(value.to_string()))
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }

    #[must_use]
    pub fn null() -> Self {
        Expression::Literal(Literal::Null)
    }

    #[must_use]
    pub fn bind(name: &str) -> Self {
        Expression::BindParameter(name.to_string())
    }

    #[must_use]
    pub fn binary(left: Expression, op: ComparisonOp, right: Expression) -> Self {
        Expression::BinaryComparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn eq(left: Expression, right: Expression) -> Self {
        Expression::binary(left, ComparisonOp::Eq, right)
    }

    #[must_use]
    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::binary(left, ComparisonOp::And, right)
    }

    #[must_use]
    pub fn arithmetic(left: Expression, op: ArithmeticOp, right: Expression) -> Self {
        Expression::Arithmetic {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Plain function call.
    #[must_use]
    pub fn function(name: &str, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.to_string(),
            args,
            distinct: false,
            star: false,
        }
    }

    /// `name(*)`.
    #[must_use]
    pub fn function_star(name: &str) -> Self {
        Expression::Function {
            name: name.to_string(),
            args: Vec::new(),
            distinct: false,
            star: true,
        }
    }

    #[must_use]
    pub fn cast(expr: Expression, data_type: DataType) -> Self {
        Expression::Cast {
            expr: Box::new(expr),
            data_type,
        }
    }

    /// Scalar subquery.
    #[must_use]
    pub fn subquery(select: SelectCore) -> Self {
        Expression::Subquery {
            select: Box::new(select),
            exists: false,
            not: false,
        }
    }

    /// `EXISTS (select)`.
    #[must_use]
    pub fn exists(select: SelectCore) -> Self {
        Expression::Subquery {
            select: Box::new(select),
            exists: true,
            not: false,
        }
    }

    /// Returns the column name if this is a plain column reference.
    #[must_use]
    pub fn as_column(&self) -> Option<(Option<&str>, &str)> {
        match self {
            Expression::Column { table, column } => Some((table.as_deref(), column.as_str())),
            _ => None,
        }
    }

    /// Calls `f` on each direct child expression.
    ///
    /// Subquery bodies are not expressions and are not visited.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expression)) {
        match self {
            Expression::Literal(_)
            | Expression::BindParameter(_)
            | Expression::Column { .. }
            | Expression::Subquery { .. } => {}
            Expression::Unary { operand, .. } => f(operand.as_ref()),
            Expression::BinaryComparison { left, right, .. }
            | Expression::Arithmetic { left, right, .. }
            | Expression::Is { left, right, .. } => {
                f(left.as_ref());
                f(right.as_ref());
            }
            Expression::StringCompare {
                left,
                right,
                escape,
                ..
            } => {
                f(left.as_ref());
                f(right.as_ref());
                if let Some(escape) = escape {
                    f(escape.as_ref());
                }
            }
            Expression::Between {
                expr, low, high, ..
            } => {
                f(expr.as_ref());
                f(low.as_ref());
                f(high.as_ref());
            }
            Expression::Function { args, .. } | Expression::List(args) => {
                args.iter().for_each(f);
            }
            Expression::Case {
                operand,
                when_then,
                else_expr,
            } => {
                if let Some(operand) = operand {
                    f(operand.as_ref());
                }
                for (when, then) in when_then {
                    f(when);
                    f(then);
                }
                if let Some(else_expr) = else_expr {
                    f(else_expr.as_ref());
                }
            }
            Expression::Collate { expr, .. }
            | Expression::Paren(expr)
            | Expression::Cast { expr, .. } => f(expr.as_ref()),
        }
    }

    /// Mutable counterpart of [`Expression::for_each_child`].
    pub fn for_each_child_mut(&mut self, mut f: impl FnMut(&mut Expression)) {
        match self {
            Expression::Literal(_)
            | Expression::BindParameter(_)
            | Expression::Column { .. }
            | Expression::Subquery { .. } => {}
            Expression::Unary { operand, .. } => f(operand.as_mut()),
            Expression::BinaryComparison { left, right, .. }
            | Expression::Arithmetic { left, right, .. }
            | Expression::Is { left, right, .. } => {
                f(left.as_mut());
                f(right.as_mut());
            }
            Expression::StringCompare {
                left,
                right,
                escape,
                ..
            } => {
                f(left.as_mut());
                f(right.as_mut());
                if let Some(escape) = escape {
                    f(escape.as_mut());
                }
            }
            Expression::Between {
                expr, low, high, ..
            } => {
                f(expr.as_mut());
                f(low.as_mut());
                f(high.as_mut());
            }
            Expression::Function { args, .. } | Expression::List(args) => {
                args.iter_mut().for_each(f);
            }
            Expression::Case {
                operand,
                when_then,
                else_expr,
            } => {
                if let Some(operand) = operand {
                    f(operand.as_mut());
                }
                for (when, then) in when_then {
                    f(when);
                    f(then);
                }
                if let Some(else_expr) = else_expr {
                    f(else_expr.as_mut());
                }
            }
            Expression::Collate { expr, .. }
            | Expression::Paren(expr)
            | Expression::Cast { expr, .. } => f(expr.as_mut()),
        }
    }
}
