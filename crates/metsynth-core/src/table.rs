use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Descriptive records table.
pub const DMDSEC: &str = "dmdSec";
/// File manifest table.
pub const FILE: &str = "file";
/// Structure map table.
pub const STRUCTMAP: &str = "structMap";

pub const DMD_ID: &str = "dmd_id";
pub const FILE_ID: &str = "file_id";
pub const STRUCT_ID: &str = "struct_id";
pub const PARENT_ID: &str = "parent_id";

/// The three tables of an archival package, in load order.
pub const PACKAGE_TABLES: [&str; 3] = [DMDSEC, FILE, STRUCTMAP];

/// A single cell value.
///
/// `Null` is the only absent value; every other variant counts as present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Convert a JSON value into a cell. Nested arrays and objects are kept as JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(*flag),
            serde_json::Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Value::Int(int)
                } else if let Some(float) = number.as_f64() {
                    Value::Float(float)
                } else {
                    Value::Text(number.to_string())
                }
            }
            serde_json::Value::String(text) => Value::Text(text.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Parse a CSV cell. Empty cells are null; finite numbers are typed.
    pub fn parse_cell(cell: &str) -> Self {
        if cell.is_empty() {
            return Value::Null;
        }
        if let Ok(int) = cell.parse::<i64>() {
            return Value::Int(int);
        }
        match cell.parse::<f64>() {
            Ok(float) if float.is_finite() => Value::Float(float),
            _ => Value::Text(cell.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Textual key form used for identifier comparison.
    ///
    /// Null and blank text have no key, so they never resolve a reference.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(text) if text.trim().is_empty() => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Int(int) => write!(f, "{int}"),
            Value::Float(float) => write!(f, "{float}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

/// One record, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Key form of a row's column, if present.
pub fn key_of(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(Value::as_key)
}

/// A named, ordered set of rows sharing a column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Column names in source order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table whose columns are the union of the rows' keys, in key order.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for column in row.keys() {
                if !columns.iter().any(|known| known == column) {
                    columns.push(column.clone());
                }
            }
        }

        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|known| known == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct keys present in a column.
    pub fn key_set(&self, column: &str) -> HashSet<String> {
        self.rows.iter().filter_map(|row| key_of(row, column)).collect()
    }
}

/// An ordered collection of named tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    tables: Vec<Table>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Vec<Table>) -> Self {
        let mut dataset = Self::new();
        for table in tables {
            dataset.insert(table);
        }
        dataset
    }

    /// Insert a table, replacing any table with the same name in place.
    pub fn insert(&mut self, table: Table) {
        match self.tables.iter_mut().find(|known| known.name == table.name) {
            Some(slot) => *slot = table,
            None => self.tables.push(table),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|table| table.name == name)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn into_tables(self) -> Vec<Table> {
        self.tables
    }

    /// Row count per table, in table order.
    pub fn row_counts(&self) -> BTreeMap<String, usize> {
        self.tables
            .iter()
            .map(|table| (table.name.clone(), table.len()))
            .collect()
    }
}
