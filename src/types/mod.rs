//! Value model and schema types for GritDB

mod datetime;
mod schema;

pub use datetime::{Date, Timestamp};
pub use schema::{ColumnDef, ColumnType, IndexDef, TableSchema};

use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Unified value type covering every column kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,

    /// 64-bit signed integer
    Integer(i64),

    /// Double-precision float
    Float(f64),

    /// Text string (VARCHAR and TEXT columns)
    Text(String),

    /// Boolean
    Bool(bool),

    /// Calendar date
    Date(Date),

    /// Calendar timestamp
    Timestamp(Timestamp),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human-readable kind name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Text(_) => "TEXT",
            Value::Bool(_) => "BOOLEAN",
            Value::Date(_) => "DATE",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// SQL comparison under three-valued logic.
    ///
    /// `Ok(None)` means the comparison is unknown (a NULL was involved).
    /// Integer/float mix compares numerically; any other cross-kind
    /// comparison is a type error.
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>> {
        use Value::*;
        let ord = match (self, other) {
            (Null, _) | (_, Null) => return Ok(None),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => {
                return a
                    .partial_cmp(b)
                    .map(Some)
                    .ok_or_else(|| DbError::Type("Cannot compare NaN".to_string()));
            }
            (Integer(a), Float(b)) => {
                return (*a as f64)
                    .partial_cmp(b)
                    .map(Some)
                    .ok_or_else(|| DbError::Type("Cannot compare NaN".to_string()));
            }
            (Float(a), Integer(b)) => {
                return a
                    .partial_cmp(&(*b as f64))
                    .map(Some)
                    .ok_or_else(|| DbError::Type("Cannot compare NaN".to_string()));
            }
            (Text(a), Text(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (a, b) => {
                return Err(DbError::Type(format!(
                    "Cannot compare {} and {}",
                    a.kind_name(),
                    b.kind_name()
                )));
            }
        };
        Ok(Some(ord))
    }

    /// SQL equality as a three-valued predicate
    pub fn sql_eq(&self, other: &Value) -> Result<Option<bool>> {
        Ok(self.compare(other)?.map(|ord| ord == Ordering::Equal))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

/// A stored row: values in schema column order
pub type Row = Vec<Value>;

/// A named row used by the SQL pipeline (column name -> value)
pub type SqlRow = std::collections::HashMap<String, Value>;

/// Row identifier, unique and monotonic within a table
pub type RowId = u64;
