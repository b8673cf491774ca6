//! Ordered, typed attribute lists.

use serde::{Deserialize, Serialize};

use crate::catalog::TableSchema;
use crate::types::DataType;

/// A named, typed column. An empty name marks an anonymous attribute, such
/// as an unaliased expression, which cannot be referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Attribute {
            name: name.into(),
            data_type,
        }
    }

    #[must_use]
    pub fn anonymous(data_type: DataType) -> Self {
        Attribute {
            name: String::new(),
            data_type,
        }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Returns the attribute exposed under a new name.
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Output schema of a table, statement, or sub-statement.
///
/// Names are not required to be unique; lookups report ambiguity instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    attributes: Vec<Attribute>,
}

impl Relation {
    #[must_use]
    pub fn new() -> Self {
        Relation {
            attributes: Vec::new(),
        }
    }

    /// Builds the relation exposed by a table.
    #[must_use]
    pub fn from_table(table: &TableSchema) -> Self {
        Relation {
            attributes: table
                .columns
                .iter()
                .map(|c| Attribute::new(c.name.clone(), c.data_type))
                .collect(),
        }
    }

    /// Appends one attribute.
    pub fn add(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    /// Appends all attributes of `other`, in order.
    pub fn merge(&mut self, other: &Relation) {
        self.attributes.extend(other.attributes.iter().cloned());
    }

    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns every attribute exposed under `name`.
    pub fn attributes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attribute> {
        self.attributes.iter().filter(move |a| a.name == name)
    }

    /// Returns the ordered list of attribute types.
    #[must_use]
    pub fn shape(&self) -> Vec<DataType> {
        self.attributes.iter().map(|a| a.data_type).collect()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Returns the first anonymous attribute, if any.
    #[must_use]
    pub fn first_anonymous(&self) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is_anonymous())
    }
}

impl FromIterator<Attribute> for Relation {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Relation {
            attributes: iter.into_iter().collect(),
        }
    }
}
