//! Schema definitions for declared tables and procedures.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::DataType;

/// Snapshot of the base tables and procedures a statement may reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Base table schemas.
    tables: HashMap<String, TableSchema>,
    /// Declared procedures, keyed by lowercase name.
    #[serde(default)]
    procedures: HashMap<String, ProcedureDef>,
}

impl Catalog {
    /// Creates a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Catalog {
            tables: HashMap::new(),
            procedures: HashMap::new(),
        }
    }

    /// Registers a base table.
    ///
    /// # Errors
    ///
    /// Returns an error if a table with the same name already exists, or if
    /// the table has no primary key.
    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        if self.tables.contains_key(&schema.name) {
            return Err(Error::Catalog(format!(
                "Table '{}' already exists",
                schema.name
            )));
        }
        // Base tables need a key for default ordering.
        if schema.primary_key.is_empty() {
            return Err(Error::Catalog(format!(
                "Table '{}' must declare a primary key",
                schema.name
            )));
        }
        self.tables.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Registers a procedure callable from SQL.
    ///
    /// # Errors
    ///
    /// Returns an error if a procedure with the same name already exists.
    pub fn create_procedure(&mut self, procedure: ProcedureDef) -> Result<()> {
        let key = procedure.name.to_lowercase();
        if self.procedures.contains_key(&key) {
            return Err(Error::Catalog(format!(
                "Procedure '{}' already exists",
                procedure.name
            )));
        }
        self.procedures.insert(key, procedure);
        Ok(())
    }

    /// Retrieves a table schema by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Retrieves a procedure by name (case-insensitive).
    #[must_use]
    pub fn get_procedure(&self, name: &str) -> Option<&ProcedureDef> {
        self.procedures.get(&name.to_lowercase())
    }

    /// Checks if a table exists in the catalog.
    #[must_use]
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns all table names, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Serializes the catalog to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| Error::Catalog(format!("Failed to serialize catalog: {e}")))
    }

    /// Deserializes a catalog from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| Error::Catalog(format!("Failed to deserialize catalog: {e}")))
    }
}

/// Schema definition for a table, either declared or synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Ordered list of column definitions.
    pub columns: Vec<ColumnDef>,
    /// Column names forming the primary key.
    pub primary_key: Vec<String>,
}

impl TableSchema {
    /// Creates a new table schema with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (empty columns, duplicate names,
    /// primary key naming an unknown column).
    pub fn new(name: String, columns: Vec<ColumnDef>, primary_key: Vec<String>) -> Result<Self> {
        let schema = TableSchema {
            name,
            columns,
            primary_key,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Catalog("Table name cannot be empty".into()));
        }

        if self.columns.is_empty() {
            return Err(Error::Catalog(format!(
                "Table '{}' must have at least one column",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(&col.name) {
                return Err(Error::Catalog(format!(
                    "Duplicate column name '{}' in table '{}'",
                    col.name, self.name
                )));
            }
        }

        for pk_col in &self.primary_key {
            if !self.columns.iter().any(|c| &c.name == pk_col) {
                return Err(Error::Catalog(format!(
                    "Primary key column '{pk_col}' not found in table '{}'",
                    self.name
                )));
            }
        }

        Ok(())
    }

    /// Finds a column definition by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the primary key columns sorted by name.
    #[must_use]
    pub fn sorted_primary_key(&self) -> Vec<&str> {
        let mut pk: Vec<&str> = self.primary_key.iter().map(String::as_str).collect();
        pk.sort_unstable();
        pk
    }

    /// Returns the column names sorted by name.
    #[must_use]
    pub fn sorted_column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Definition of a single column in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub data_type: DataType,
}

impl ColumnDef {
    /// Creates a new column definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the column name is empty.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Catalog("Column name cannot be empty".into()));
        }
        Ok(ColumnDef { name, data_type })
    }
}

/// A procedure that SQL may call as a function or use as a table in FROM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDef {
    /// Procedure name.
    pub name: String,
    /// Positional parameter types.
    pub parameters: Vec<DataType>,
    /// What the procedure returns, if anything.
    pub returns: Option<ProcedureReturn>,
}

impl ProcedureDef {
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: Vec<DataType>) -> Self {
        ProcedureDef {
            name: name.into(),
            parameters,
            returns: None,
        }
    }

    /// Declares scalar return fields.
    #[must_use]
    pub fn returning(mut self, fields: Vec<ColumnDef>) -> Self {
        self.returns = Some(ProcedureReturn {
            is_table: false,
            fields,
        });
        self
    }

    /// Declares a table return.
    #[must_use]
    pub fn returning_table(mut self, fields: Vec<ColumnDef>) -> Self {
        self.returns = Some(ProcedureReturn {
            is_table: true,
            fields,
        });
        self
    }

    /// Returns the type of a call expression: a single scalar field gives
    /// its type, anything else gives `Null`.
    #[must_use]
    pub fn scalar_type(&self) -> DataType {
        match &self.returns {
            Some(ret) if !ret.is_table && ret.fields.len() == 1 => ret.fields[0].data_type,
            _ => DataType::Null,
        }
    }
}

/// Return shape of a procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureReturn {
    /// True if the procedure returns a set of rows.
    pub is_table: bool,
    /// Returned fields.
    pub fields: Vec<ColumnDef>,
}
