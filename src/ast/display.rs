//! SQL text rendering for expressions and select cores.
//!
//! Used for error messages and for inspecting injected ordering terms; this
//! is not a full pretty-printer.

use std::fmt::{self, Display, Formatter};

use super::expression::{ArithmeticOp, ComparisonOp, Expression, Literal, StringOp, UnaryOp};
use super::statement::{
    CompoundOperator, FromClause, JoinKind, NullOrder, OrderType, OrderingTerm, ResultColumn,
    SelectCore, SimpleSelect, TableRef,
};

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Numeric(n) => write!(f, "{n}"),
            Literal::Boolean(true) => f.write_str("TRUE"),
            Literal::Boolean(false) => f.write_str("FALSE"),
            Literal::Null => f.write_str("NULL"),
            Literal::Blob(bytes) => {
                f.write_str("x'")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "NOT ",
            UnaryOp::BitNot => "~",
        })
    }
}

impl Display for ComparisonOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::And => "AND",
            ComparisonOp::Or => "OR",
            ComparisonOp::In => "IN",
            ComparisonOp::NotIn => "NOT IN",
        })
    }
}

impl Display for ArithmeticOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Mod => "%",
            ArithmeticOp::Concat => "||",
        })
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(lit) => write!(f, "{lit}"),
            Expression::BindParameter(name) => write!(f, "{name}"),
            Expression::Column {
                table: Some(table),
                column,
            } => write!(f, "{table}.{column}"),
            Expression::Column {
                table: None,
                column,
            } => write!(f, "{column}"),
            Expression::Unary { op, operand } => write!(f, "{op}{operand}"),
            Expression::BinaryComparison { left, op, right } => {
                write!(f, "{left} {op} {right}")
            }
            Expression::Arithmetic { left, op, right } => write!(f, "{left} {op} {right}"),
            Expression::StringCompare {
                left,
                op,
                right,
                escape,
            } => {
                let op = match op {
                    StringOp::Like => "LIKE",
                    StringOp::NotLike => "NOT LIKE",
                };
                write!(f, "{left} {op} {right}")?;
                if let Some(escape) = escape {
                    write!(f, " ESCAPE {escape}")?;
                }
                Ok(())
            }
            Expression::Is {
                left,
                not,
                distinct,
                right,
            } => {
                write!(f, "{left} IS ")?;
                if *not {
                    f.write_str("NOT ")?;
                }
                if *distinct {
                    f.write_str("DISTINCT FROM ")?;
                }
                write!(f, "{right}")
            }
            Expression::Between {
                expr,
                not,
                low,
                high,
            } => {
                let not = if *not { "NOT " } else { "" };
                write!(f, "{expr} {not}BETWEEN {low} AND {high}")
            }
            Expression::Function {
                name,
                args,
                distinct,
                star,
            } => {
                write!(f, "{name}(")?;
                if *star {
                    f.write_str("*")?;
                } else {
                    if *distinct {
                        f.write_str("DISTINCT ")?;
                    }
                    write_list(f, args)?;
                }
                f.write_str(")")
            }
            Expression::List(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            Expression::Case {
                operand,
                when_then,
                else_expr,
            } => {
                f.write_str("CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for (when, then) in when_then {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(else_expr) = else_expr {
                    write!(f, " ELSE {else_expr}")?;
                }
                f.write_str(" END")
            }
            Expression::Collate { expr, collation } => write!(f, "{expr} COLLATE {collation}"),
            Expression::Paren(inner) => write!(f, "({inner})"),
            Expression::Cast { expr, data_type } => write!(f, "{expr}::{data_type}"),
            Expression::Subquery { select, exists, not } => {
                if *not {
                    f.write_str("NOT ")?;
                }
                if *exists {
                    f.write_str("EXISTS ")?;
                }
                write!(f, "({select})")
            }
        }
    }
}

impl Display for OrderingTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        match self.direction {
            Some(OrderType::Asc) => f.write_str(" ASC")?,
            Some(OrderType::Desc) => f.write_str(" DESC")?,
            None => {}
        }
        match self.nulls {
            Some(NullOrder::First) => f.write_str(" NULLS FIRST"),
            Some(NullOrder::Last) => f.write_str(" NULLS LAST"),
            None => Ok(()),
        }
    }
}

impl Display for ResultColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResultColumn::Star => f.write_str("*"),
            ResultColumn::TableStar(table) => write!(f, "{table}.*"),
            ResultColumn::Expression { expr, alias } => {
                write!(f, "{expr}")?;
                if let Some(alias) = alias {
                    write!(f, " AS {alias}")?;
                }
                Ok(())
            }
        }
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let alias = match self {
            TableRef::Table { name, alias } => {
                write!(f, "{name}")?;
                alias
            }
            TableRef::Subquery { select, alias } => {
                write!(f, "({select})")?;
                alias
            }
            TableRef::Function { name, args, alias } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")?;
                alias
            }
        };
        if let Some(alias) = alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

impl Display for FromClause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relation)?;
        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Right => "RIGHT JOIN",
                JoinKind::Full => "FULL JOIN",
            };
            write!(f, " {kind} {}", join.table)?;
            if let Some(constraint) = &join.constraint {
                write!(f, " ON {constraint}")?;
            }
        }
        Ok(())
    }
}

impl Display for SimpleSelect {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.columns)?;
        if let Some(from) = &self.from {
            write!(f, " FROM {from}")?;
        }
        if let Some(filter) = &self.where_clause {
            write!(f, " WHERE {filter}")?;
        }
        if let Some(group_by) = &self.group_by {
            f.write_str(" GROUP BY ")?;
            write_list(f, &group_by.expressions)?;
            if let Some(having) = &group_by.having {
                write!(f, " HAVING {having}")?;
            }
        }
        Ok(())
    }
}

impl Display for SelectCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for select in &self.selects {
            if let Some(op) = select.compound {
                f.write_str(match op {
                    CompoundOperator::Union => " UNION ",
                    CompoundOperator::UnionAll => " UNION ALL ",
                    CompoundOperator::Intersect => " INTERSECT ",
                    CompoundOperator::Except => " EXCEPT ",
                })?;
            }
            write!(f, "{select}")?;
        }
        if let Some(order_by) = &self.order_by {
            f.write_str(" ORDER BY ")?;
            write_list(f, &order_by.terms)?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit.expr)?;
            if let Some(offset) = &limit.offset {
                write!(f, " OFFSET {offset}")?;
            }
        }
        Ok(())
    }
}
