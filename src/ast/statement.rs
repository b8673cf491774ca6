//! Statement tree: SELECT, INSERT, UPDATE, DELETE.

use super::expression::Expression;

/// A parsed SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
}

impl Statement {
    /// Returns the statement's common table expressions.
    #[must_use]
    pub fn ctes(&self) -> &[Cte] {
        match self {
            Statement::Select(s) => &s.ctes,
            Statement::Insert(s) => &s.ctes,
            Statement::Update(s) => &s.ctes,
            Statement::Delete(s) => &s.ctes,
        }
    }
}

/// `name [(columns)] AS (select)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    /// Optional output column names; empty when not given.
    pub columns: Vec<String>,
    pub select: SelectCore,
}

impl Cte {
    #[must_use]
    pub fn new(name: &str, select: SelectCore) -> Self {
        Cte {
            name: name.to_string(),
            columns: Vec::new(),
            select,
        }
    }

    /// Renames the CTE's output columns.
    #[must_use]
    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(ToString::to_string).collect();
        self
    }
}

/// Top-level SELECT with optional CTEs.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub ctes: Vec<Cte>,
    pub core: SelectCore,
}

impl SelectStmt {
    #[must_use]
    pub fn new(core: SelectCore) -> Self {
        SelectStmt {
            ctes: Vec::new(),
            core,
        }
    }

    #[must_use]
    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.ctes.push(cte);
        self
    }
}

/// One or more simple selects joined by compound operators, followed by
/// ORDER BY and LIMIT that apply to the whole.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectCore {
    pub selects: Vec<SimpleSelect>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
}

impl SelectCore {
    /// A core with a single simple select.
    #[must_use]
    pub fn simple(select: SimpleSelect) -> Self {
        SelectCore {
            selects: vec![select],
            order_by: None,
            limit: None,
        }
    }

    /// Appends a compound branch.
    #[must_use]
    pub fn compound(mut self, op: CompoundOperator, mut select: SimpleSelect) -> Self {
        select.compound = Some(op);
        self.selects.push(select);
        self
    }

    #[must_use]
    pub fn order_by(mut self, terms: Vec<OrderingTerm>) -> Self {
        self.order_by = Some(OrderBy { terms });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Expression, offset: Option<Expression>) -> Self {
        self.limit = Some(Limit {
            expr: limit,
            offset,
        });
        self
    }

    /// Returns the ORDER BY terms, or an empty slice.
    #[must_use]
    pub fn ordering_terms(&self) -> &[OrderingTerm] {
        self.order_by.as_ref().map_or(&[], |o| o.terms.as_slice())
    }
}

/// UNION / UNION ALL / INTERSECT / EXCEPT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// A single SELECT ... FROM ... WHERE ... GROUP BY.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSelect {
    pub distinct: bool,
    pub columns: Vec<ResultColumn>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expression>,
    pub group_by: Option<GroupBy>,
    /// Operator joining this select to the previous one; `None` for the first.
    pub compound: Option<CompoundOperator>,
}

impl SimpleSelect {
    #[must_use]
    pub fn new(columns: Vec<ResultColumn>) -> Self {
        SimpleSelect {
            distinct: false,
            columns,
            from: None,
            where_clause: None,
            group_by: None,
            compound: None,
        }
    }

    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub fn from(mut self, from: FromClause) -> Self {
        self.from = Some(from);
        self
    }

    /// FROM a single base table.
    #[must_use]
    pub fn from_table(self, table: &str) -> Self {
        self.from(FromClause::new(TableRef::table(table)))
    }

    #[must_use]
    pub fn filter(mut self, expr: Expression) -> Self {
        self.where_clause = Some(expr);
        self
    }

    #[must_use]
    pub fn group_by(mut self, expressions: Vec<Expression>, having: Option<Expression>) -> Self {
        self.group_by = Some(GroupBy {
            expressions,
            having,
        });
        self
    }

    #[must_use]
    pub fn into_core(self) -> SelectCore {
        SelectCore::simple(self)
    }

    /// Returns true if any result column is `*` or `table.*`.
    #[must_use]
    pub fn has_star(&self) -> bool {
        self.columns
            .iter()
            .any(|c| matches!(c, ResultColumn::Star | ResultColumn::TableStar(_)))
    }
}

/// One entry of a SELECT or RETURNING list.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultColumn {
    /// `*`
    Star,
    /// `table.*`
    TableStar(String),
    /// `expr [AS alias]`
    Expression {
        expr: Expression,
        alias: Option<String>,
    },
}

impl ResultColumn {
    #[must_use]
    pub fn expr(expr: Expression) -> Self {
        ResultColumn::Expression { expr, alias: None }
    }

    #[must_use]
    pub fn aliased(expr: Expression, alias: &str) -> Self {
        ResultColumn::Expression {
            expr,
            alias: Some(alias.to_string()),
        }
    }

    /// Returns the expression of an `expr [AS alias]` entry.
    #[must_use]
    pub fn expression(&self) -> Option<&Expression> {
        match self {
            ResultColumn::Expression { expr, .. } => Some(expr),
            ResultColumn::Star | ResultColumn::TableStar(_) => None,
        }
    }

    /// Returns the alias of an `expr AS alias` entry.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        match self {
            ResultColumn::Expression { alias, .. } => alias.as_deref(),
            ResultColumn::Star | ResultColumn::TableStar(_) => None,
        }
    }
}

/// FROM clause: a leading relation followed by joins.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub relation: TableRef,
    pub joins: Vec<JoinPredicate>,
}

impl FromClause {
    #[must_use]
    pub fn new(relation: TableRef) -> Self {
        FromClause {
            relation,
            joins: Vec::new(),
        }
    }

    #[must_use]
    pub fn join(mut self, kind: JoinKind, table: TableRef, constraint: Expression) -> Self {
        self.joins.push(JoinPredicate {
            kind,
            table,
            constraint: Some(constraint),
        });
        self
    }

    /// Iterates the leading relation then each joined relation.
    pub fn relations(&self) -> impl Iterator<Item = &TableRef> {
        std::iter::once(&self.relation).chain(self.joins.iter().map(|j| &j.table))
    }
}

/// A relation in FROM.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table {
        name: String,
        alias: Option<String>,
    },
    Subquery {
        select: Box<SelectCore>,
        alias: Option<String>,
    },
    /// A table-returning procedure.
    Function {
        name: String,
        args: Vec<Expression>,
        alias: Option<String>,
    },
}

impl TableRef {
    #[must_use]
    pub fn table(name: &str) -> Self {
        TableRef::Table {
            name: name.to_string(),
            alias: None,
        }
    }

    #[must_use]
    pub fn aliased(name: &str, alias: &str) -> Self {
        TableRef::Table {
            name: name.to_string(),
            alias: Some(alias.to_string()),
        }
    }

    #[must_use]
    pub fn subquery(select: SelectCore, alias: Option<&str>) -> Self {
        TableRef::Subquery {
            select: Box::new(select),
            alias: alias.map(ToString::to_string),
        }
    }

    /// Name the relation is referenced by: alias if present, otherwise the
    /// table or function name. Unaliased subqueries have no name.
    #[must_use]
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            TableRef::Table { name, alias } | TableRef::Function { name, alias, .. } => {
                Some(alias.as_deref().unwrap_or(name))
            }
            TableRef::Subquery { alias, .. } => alias.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

/// `[kind] JOIN table ON constraint`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPredicate {
    pub kind: JoinKind,
    pub table: TableRef,
    pub constraint: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub expressions: Vec<Expression>,
    pub having: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub terms: Vec<OrderingTerm>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrder {
    First,
    Last,
}

/// `expr [ASC|DESC] [NULLS FIRST|LAST]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderingTerm {
    pub expr: Expression,
    pub direction: Option<OrderType>,
    pub nulls: Option<NullOrder>,
}

impl OrderingTerm {
    #[must_use]
    pub fn new(expr: Expression) -> Self {
        OrderingTerm {
            expr,
            direction: None,
            nulls: None,
        }
    }

    /// `expr ASC NULLS LAST`, the shape of every generated term.
    #[must_use]
    pub fn asc_nulls_last(expr: Expression) -> Self {
        OrderingTerm {
            expr,
            direction: Some(OrderType::Asc),
            nulls: Some(NullOrder::Last),
        }
    }

    #[must_use]
    pub fn desc(expr: Expression) -> Self {
        OrderingTerm {
            expr,
            direction: Some(OrderType::Desc),
            nulls: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub expr: Expression,
    pub offset: Option<Expression>,
}

/// `INSERT INTO table [AS alias] (columns) VALUES ... [ON CONFLICT ...] [RETURNING ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub ctes: Vec<Cte>,
    pub table: String,
    pub alias: Option<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expression>>,
    pub upsert: Option<Upsert>,
    /// Empty when there is no RETURNING clause.
    pub returning: Vec<ResultColumn>,
}

impl InsertStmt {
    #[must_use]
    pub fn new(table: &str, columns: &[&str], values: Vec<Vec<Expression>>) -> Self {
        InsertStmt {
            ctes: Vec::new(),
            table: table.to_string(),
            alias: None,
            columns: columns.iter().map(ToString::to_string).collect(),
            values,
            upsert: None,
            returning: Vec::new(),
        }
    }
}

/// `ON CONFLICT [target] DO ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    pub target: Option<ConflictTarget>,
    pub action: UpsertAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictTarget {
    pub columns: Vec<String>,
    pub where_clause: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertAction {
    DoNothing,
    DoUpdate {
        set: Vec<UpdateSetClause>,
        where_clause: Option<Expression>,
    },
}

/// `col = expr` or `(a, b) = expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSetClause {
    pub columns: Vec<String>,
    pub expr: Expression,
}

impl UpdateSetClause {
    #[must_use]
    pub fn new(column: &str, expr: Expression) -> Self {
        UpdateSetClause {
            columns: vec![column.to_string()],
            expr,
        }
    }
}

/// Target table of UPDATE / DELETE.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedTableName {
    pub name: String,
    pub alias: Option<String>,
}

impl QualifiedTableName {
    /// Name the table is referenced by inside the statement.
    #[must_use]
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub ctes: Vec<Cte>,
    pub table: QualifiedTableName,
    pub set: Vec<UpdateSetClause>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expression>,
    pub returning: Vec<ResultColumn>,
}

impl UpdateStmt {
    #[must_use]
    pub fn new(table: &str, set: Vec<UpdateSetClause>) -> Self {
        UpdateStmt {
            ctes: Vec::new(),
            table: QualifiedTableName {
                name: table.to_string(),
                alias: None,
            },
            set,
            from: None,
            where_clause: None,
            returning: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub ctes: Vec<Cte>,
    pub table: QualifiedTableName,
    pub where_clause: Option<Expression>,
    pub returning: Vec<ResultColumn>,
}

impl DeleteStmt {
    #[must_use]
    pub fn new(table: &str) -> Self {
        DeleteStmt {
            ctes: Vec::new(),
            table: QualifiedTableName {
                name: table.to_string(),
                alias: None,
            },
            where_clause: None,
            returning: Vec::new(),
        }
    }
}
