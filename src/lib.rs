//! detsql - semantic analysis for deterministic SQL
//!
//! Type-checks parsed SQL statements against a table catalog, rejects
//! aggregate and join shapes whose results could differ between replicas,
//! and injects ORDER BY terms so every node returns rows in the same order.
//!
//! ```
//! use detsql::ast::{Expression, ResultColumn, SelectStmt, SimpleSelect, Statement};
//! use detsql::catalog::{Catalog, ColumnDef, TableSchema};
//! use detsql::types::DataType;
//! use detsql::{Analyzer, BindParameters};
//!
//! let mut catalog = Catalog::new();
//! catalog
//!     .create_table(TableSchema::new(
//!         "users".to_string(),
//!         vec![
//!             ColumnDef::new("id", DataType::Int)?,
//!             ColumnDef::new("name", DataType::Text)?,
//!         ],
//!         vec!["id".to_string()],
//!     )?)?;
//!
//! let select = SimpleSelect::new(vec![ResultColumn::expr(Expression::unqualified("name"))])
//!     .from_table("users");
//! let stmt = Statement::Select(SelectStmt::new(select.into_core()));
//!
//! let analysis = Analyzer::new(&catalog).analyze(stmt, &BindParameters::new())?;
//! assert_eq!(analysis.relation.shape(), vec![DataType::Text]);
//! # Ok::<(), detsql::Error>(())
//! ```

pub mod ast;
pub mod attributes;
pub mod binder;
pub mod catalog;
pub mod error;
pub mod rules;
pub mod types;

use indexmap::IndexMap;
use tracing::debug;

pub use binder::{Attribute, BindParameters, EvaluationContext, Relation, TypeChecker};
pub use error::{Error, ErrorKind, Result};

use ast::Statement;
use catalog::Catalog;
use rules::{AggregateRule, DefaultOrderingRule, JoinRule, RewriteRule, ValidationRule};

/// Configuration for an [`Analyzer`].
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Type unknown bind parameters as `UNKNOWN` instead of failing.
    pub arbitrary_binds: bool,
    /// Run the GROUP BY / aggregate checks.
    pub validate_aggregates: bool,
    /// Run the join constraint checks.
    pub validate_joins: bool,
    /// Append default ORDER BY terms.
    pub inject_ordering: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            arbitrary_binds: false,
            validate_aggregates: true,
            validate_joins: true,
            inject_ordering: true,
        }
    }
}

impl AnalyzerConfig {
    /// Creates a new analyzer configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether unknown bind parameters are accepted.
    #[must_use]
    pub fn with_arbitrary_binds(mut self, arbitrary_binds: bool) -> Self {
        self.arbitrary_binds = arbitrary_binds;
        self
    }

    /// Sets whether aggregate queries are validated.
    #[must_use]
    pub fn with_validate_aggregates(mut self, validate_aggregates: bool) -> Self {
        self.validate_aggregates = validate_aggregates;
        self
    }

    /// Sets whether join constraints are validated.
    #[must_use]
    pub fn with_validate_joins(mut self, validate_joins: bool) -> Self {
        self.validate_joins = validate_joins;
        self
    }

    /// Sets whether default ordering is injected.
    #[must_use]
    pub fn with_inject_ordering(mut self, inject_ordering: bool) -> Self {
        self.inject_ordering = inject_ordering;
        self
    }
}

/// Result of analyzing one statement.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The statement after every rewrite rule ran.
    pub statement: Statement,
    /// Columns the statement returns.
    pub relation: Relation,
    /// Relation of each CTE, in declaration order.
    pub ctes: IndexMap<String, Relation>,
    /// Names of the rewrite rules that changed the statement.
    pub applied_rules: Vec<String>,
}

/// Runs every analysis pass over a statement.
///
/// Validation rules run first, then type checking, then rewrite rules. The
/// first failing pass aborts the run.
pub struct Analyzer<'a> {
    catalog: &'a Catalog,
    config: AnalyzerConfig,
    validators: Vec<Box<dyn ValidationRule>>,
    rewriters: Vec<Box<dyn RewriteRule>>,
}

impl<'a> Analyzer<'a> {
    /// Creates an analyzer with the default configuration.
    #[must_use]
    pub fn new(catalog: &'a Catalog) -> Self {
        Self::with_config(catalog, AnalyzerConfig::default())
    }

    /// Creates an analyzer whose rules follow `config`.
    #[must_use]
    pub fn with_config(catalog: &'a Catalog, config: AnalyzerConfig) -> Self {
        let mut validators: Vec<Box<dyn ValidationRule>> = Vec::new();
        if config.validate_joins {
            validators.push(Box::new(JoinRule));
        }
        if config.validate_aggregates {
            validators.push(Box::new(AggregateRule));
        }

        let mut rewriters: Vec<Box<dyn RewriteRule>> = Vec::new();
        if config.inject_ordering {
            rewriters.push(Box::new(DefaultOrderingRule));
        }

        Analyzer {
            catalog,
            config,
            validators,
            rewriters,
        }
    }

    /// Adds a validation rule, run after the built-in ones.
    pub fn add_validation_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.validators.push(rule);
    }

    /// Adds a rewrite rule, run after the built-in ones.
    pub fn add_rewrite_rule(&mut self, rule: Box<dyn RewriteRule>) {
        self.rewriters.push(rule);
    }

    /// Analyzes one statement.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a validation rule, the type checker,
    /// or a rewrite rule.
    pub fn analyze(&self, stmt: Statement, binds: &BindParameters) -> Result<Analysis> {
        debug!(validators = self.validators.len(), rewriters = self.rewriters.len(), "analyzing statement");

        for rule in &self.validators {
            rule.validate(&stmt, self.catalog)?;
            debug!(rule = rule.name(), "validation passed");
        }

        let mut checker =
            TypeChecker::new(self.catalog, binds).with_arbitrary_binds(self.config.arbitrary_binds);
        let relation = checker.check(&stmt)?;
        let ctes = checker.into_ctes();

        let mut statement = stmt;
        let mut applied_rules = Vec::new();
        for rule in &self.rewriters {
            let result = rule.rewrite(statement, self.catalog)?;
            if result.was_transformed() {
                debug!(rule = rule.name(), "rewrite applied");
                applied_rules.push(rule.name().to_string());
            }
            statement = result.into_inner();
        }

        Ok(Analysis {
            statement,
            relation,
            ctes,
            applied_rules,
        })
    }
}
