//! `DataType` definitions for detsql.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Types the analyzer assigns to columns, expressions, and bind parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int,
    /// UTF-8 text.
    Text,
    /// Boolean.
    Bool,
    /// Raw bytes.
    Blob,
    /// 16-byte UUID.
    Uuid,
    /// Type of the NULL literal.
    Null,
    /// Type of a bind parameter whose type was not supplied.
    Unknown,
}

impl DataType {
    /// Returns the name of the data type as used in SQL text.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int => "INT",
            DataType::Text => "TEXT",
            DataType::Bool => "BOOL",
            DataType::Blob => "BLOB",
            DataType::Uuid => "UUID",
            DataType::Null => "NULL",
            DataType::Unknown => "UNKNOWN",
        }
    }

    /// Parses a declared type name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INT" | "INT8" | "INTEGER" | "BIGINT" => Some(DataType::Int),
            "TEXT" | "STRING" | "VARCHAR" => Some(DataType::Text),
            "BOOL" | "BOOLEAN" => Some(DataType::Bool),
            "BLOB" | "BYTEA" => Some(DataType::Blob),
            "UUID" => Some(DataType::Uuid),
            "NULL" => Some(DataType::Null),
            _ => None,
        }
    }

    /// Returns true if a value of `other` may stand where `self` is expected.
    ///
    /// `NULL` and `UNKNOWN` are compatible with every type; everything else
    /// must match exactly.
    #[must_use]
    pub fn is_compatible(&self, other: &DataType) -> bool {
        self == other || self.is_wildcard() || other.is_wildcard()
    }

    /// Returns true for the types that carry no information (`NULL`, `UNKNOWN`).
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, DataType::Null | DataType::Unknown)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
