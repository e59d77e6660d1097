use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One column of a table as the engine declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Engine-native type name, e.g. `TEXT`, `INT`, `REAL`, `BOOLEAN`.
    #[serde(rename = "type", default)]
    pub column_type: String,
    #[serde(default)]
    pub is_key: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        ColumnDefinition {
            name: name.into(),
            column_type: column_type.into(),
            is_key: false,
        }
    }

    pub fn key(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        ColumnDefinition {
            is_key: true,
            ..ColumnDefinition::new(name, column_type)
        }
    }
}

/// Columns of a table, in physical order.
pub type TableDefinition = Vec<ColumnDefinition>;

/// Every table in a store, keyed by table name.
pub type TableDefinitions = BTreeMap<String, TableDefinition>;
