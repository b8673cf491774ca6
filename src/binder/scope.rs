//! Evaluation scope for column resolution.

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Error, Result};

use super::relation::{Attribute, Relation};

/// Key of the bucket that collects relations joined without a name.
const ANONYMOUS: &str = "";

/// Tables reachable by column lookups at one point of a statement.
///
/// `joined` holds the current scope in join order. `outer` holds enclosing
/// scopes and is only reachable through qualified references.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    joined: IndexMap<String, Relation>,
    outer: IndexMap<String, Relation>,
}

impl EvaluationContext {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins `relation` into the current scope under `name`.
    ///
    /// An empty name merges into the shared anonymous bucket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Redeclaration`] if `name` is already joined or is
    /// visible from an enclosing scope.
    pub fn join(&mut self, name: &str, relation: &Relation) -> Result<()> {
        if name.is_empty() {
            self.joined
                .entry(ANONYMOUS.to_string())
                .or_default()
                .merge(relation);
            trace!(columns = relation.len(), "joined anonymous relation");
            return Ok(());
        }

        if self.joined.contains_key(name) || self.outer.contains_key(name) {
            return Err(Error::Redeclaration(format!(
                "table '{name}' is already in scope"
            )));
        }

        self.joined.insert(name.to_string(), relation.clone());
        trace!(table = name, columns = relation.len(), "joined relation");
        Ok(())
    }

    /// Resolves a column reference.
    ///
    /// Qualified references search the current scope, then enclosing scopes.
    /// Unqualified references search the current scope only.
    ///
    /// # Errors
    ///
    /// Returns an unresolved-reference error if nothing matches, or
    /// [`Error::AmbiguousColumn`] if an unqualified name matches more than once.
    pub fn find_column(&self, table: Option<&str>, column: &str) -> Result<Attribute> {
        match table {
            Some(table) => {
                let relation = self
                    .joined
                    .get(table)
                    .filter(|_| !table.is_empty())
                    .or_else(|| self.outer.get(table))
                    .ok_or_else(|| Error::UnknownTable(table.to_string()))?;
                single(relation.attributes_named(column), Some(table), column)
            }
            None => single(
                self.joined
                    .values()
                    .flat_map(|r| r.attributes_named(column)),
                None,
                column,
            ),
        }
    }

    /// Returns a child scope for a subquery or compound branch.
    ///
    /// Every named table visible here becomes an outer table of the child;
    /// the child starts with nothing joined.
    #[must_use]
    pub fn scope(&self) -> Self {
        let mut outer = self.outer.clone();
        for (name, relation) in &self.joined {
            if !name.is_empty() {
                outer.insert(name.clone(), relation.clone());
            }
        }
        EvaluationContext {
            joined: IndexMap::new(),
            outer,
        }
    }

    /// Returns an identical scope that can be extended independently.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Names of the joined tables, in join order.
    pub fn join_order(&self) -> impl Iterator<Item = &str> {
        self.joined
            .keys()
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Returns a joined (not outer) relation by name.
    #[must_use]
    pub fn joined(&self, name: &str) -> Option<&Relation> {
        if name.is_empty() {
            return None;
        }
        self.joined.get(name)
    }

    /// Iterates every joined relation, anonymous bucket included, in join order.
    pub fn joined_relations(&self) -> impl Iterator<Item = &Relation> {
        self.joined.values()
    }
}

fn single<'a>(
    mut matches: impl Iterator<Item = &'a Attribute>,
    table: Option<&str>,
    column: &str,
) -> Result<Attribute> {
    let Some(first) = matches.next() else {
        return Err(Error::unknown_column(table, column));
    };
    if matches.next().is_some() {
        let name = match table {
            Some(table) => format!("{table}.{column}"),
            None => column.to_string(),
        };
        return Err(Error::AmbiguousColumn(name));
    }
    Ok(first.clone())
}
