//! Table metadata and schema definitions
//!
//! Column declarations carry the constraint set (NOT NULL / UNIQUE /
//! PRIMARY KEY / DEFAULT) and the write-side coercion rules.

use super::{Date, Row, Timestamp, Value};
use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Column data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Float,
    /// Length-limited string
    Varchar(usize),
    Text,
    Boolean,
    Date,
    Timestamp,
}

impl ColumnType {
    /// Coerce a value written to a column of this type.
    ///
    /// NULL always passes; NOT NULL is enforced separately. Integer literals
    /// promote to FLOAT columns, strings parse into DATE/TIMESTAMP columns,
    /// everything else must match the declared kind.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),

            (ColumnType::Integer, Value::Integer(i)) => Ok(Value::Integer(i)),
            (ColumnType::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (ColumnType::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
            (ColumnType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ColumnType::Text, Value::Text(s)) => Ok(Value::Text(s)),

            (ColumnType::Varchar(limit), Value::Text(s)) => {
                let len = s.chars().count();
                if len > *limit {
                    return Err(DbError::Constraint(format!(
                        "Value of length {} exceeds VARCHAR({}) limit",
                        len, limit
                    )));
                }
                Ok(Value::Text(s))
            }

            (ColumnType::Date, Value::Date(d)) => Ok(Value::Date(d)),
            (ColumnType::Date, Value::Text(s)) => Ok(Value::Date(Date::parse(&s)?)),
            (ColumnType::Timestamp, Value::Timestamp(ts)) => Ok(Value::Timestamp(ts)),
            (ColumnType::Timestamp, Value::Text(s)) => Ok(Value::Timestamp(Timestamp::parse(&s)?)),

            (expected, got) => Err(DbError::Type(format!(
                "Cannot store {} value in {} column",
                got.kind_name(),
                expected
            ))),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::Float => write!(f, "FLOAT"),
            ColumnType::Varchar(n) => write!(f, "VARCHAR({})", n),
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::Boolean => write!(f, "BOOLEAN"),
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name (declared case preserved)
    pub name: String,
    /// Declared type
    pub col_type: ColumnType,
    /// NOT NULL constraint
    pub not_null: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// PRIMARY KEY flag (implies NOT NULL + UNIQUE)
    pub primary_key: bool,
    /// DEFAULT literal, applied when INSERT omits the column
    pub default: Option<Value>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            col_type,
            not_null: false,
            unique: false,
            primary_key: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Whether writes to this column must probe a unique index
    pub fn requires_unique(&self) -> bool {
        self.unique || self.primary_key
    }
}

/// Index definition recorded in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name (unique across the database)
    pub name: String,
    /// Table name
    pub table_name: String,
    /// Column name
    pub column_name: String,
    /// Unique index flag
    pub unique: bool,
}

impl IndexDef {
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            unique,
        }
    }
}

/// Table schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name (declared case preserved)
    pub name: String,
    /// Column definitions, in declaration order
    pub columns: Vec<ColumnDef>,
    /// Index definitions (implicit constraint indexes + CREATE INDEX)
    pub indexes: Vec<IndexDef>,
    /// Primary key column name, if any
    pub primary_key_column: Option<String>,
    /// Lowercased column name -> position
    #[serde(skip)]
    column_map: HashMap<String, usize>,
}

impl TableSchema {
    /// Create a new table schema. Fails on duplicate column names or more
    /// than one PRIMARY KEY column.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Result<Self> {
        let name = name.into();
        let mut column_map = HashMap::new();
        let mut primary_key_column = None;

        for (position, col) in columns.iter().enumerate() {
            let key = col.name.to_lowercase();
            if column_map.insert(key, position).is_some() {
                return Err(DbError::Schema(format!(
                    "Duplicate column '{}' in table '{}'",
                    col.name, name
                )));
            }
            if col.primary_key {
                if primary_key_column.is_some() {
                    return Err(DbError::Schema(format!(
                        "Table '{}' has more than one PRIMARY KEY column",
                        name
                    )));
                }
                primary_key_column = Some(col.name.clone());
            }
        }

        Ok(Self {
            name,
            columns,
            indexes: Vec::new(),
            primary_key_column,
            column_map,
        })
    }

    /// Get column by name (case-insensitive)
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.column_map
            .get(&name.to_lowercase())
            .map(|&pos| &self.columns[pos])
    }

    /// Get column position by name (case-insensitive)
    pub fn get_column_position(&self, name: &str) -> Option<usize> {
        self.column_map.get(&name.to_lowercase()).copied()
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Rebuild the lookup map (call after deserialization)
    pub fn rebuild_column_map(&mut self) {
        self.column_map.clear();
        for (position, col) in self.columns.iter().enumerate() {
            self.column_map.insert(col.name.to_lowercase(), position);
        }
    }

    /// Columns that carry a UNIQUE or PRIMARY KEY constraint
    pub fn unique_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.requires_unique())
    }

    pub fn add_index(&mut self, index: IndexDef) {
        self.indexes.push(index);
    }

    /// Assemble a full row from provided values keyed by lowercased column
    /// name: applies DEFAULTs, enforces NOT NULL, coerces each value.
    pub fn finalize_row(&self, mut provided: HashMap<String, Value>) -> Result<Row> {
        let mut row = Vec::with_capacity(self.columns.len());

        for col in &self.columns {
            let value = match provided.remove(&col.name.to_lowercase()) {
                Some(v) => v,
                None => match &col.default {
                    Some(d) => d.clone(),
                    None => Value::Null,
                },
            };

            if value.is_null() && col.not_null {
                return Err(DbError::Constraint(format!(
                    "Column '{}' cannot be NULL",
                    col.name
                )));
            }

            let coerced = col.col_type.coerce(value)?;
            row.push(coerced);
        }

        if let Some(extra) = provided.keys().next() {
            return Err(DbError::Schema(format!(
                "Unknown column '{}' in table '{}'",
                extra, self.name
            )));
        }

        Ok(row)
    }
}
