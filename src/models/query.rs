//! Query-related data models.
//!
//! Parameters passed to statements and the shapes results come back in.

use crate::error::{DbError, DbResult};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Default statement timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Result of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecuteResult {
    pub rows_affected: u64,
    /// MySQL `LAST_INSERT_ID()` or SQLite `ROWID`. Always `None` on PostgreSQL.
    pub last_insert_id: Option<i64>,
}

/// Rows returned by a query, decoded to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    /// One entry per row, values in `columns` order.
    pub rows: Vec<Vec<JsonValue>>,
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in the row at `row`.
    pub fn get(&self, row: usize, column: &str) -> Option<&JsonValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    /// First column of the first row. `None` if there are no rows.
    pub fn first_value(&self) -> Option<&JsonValue> {
        self.rows.first()?.first()
    }

    /// Rows as column-name keyed maps.
    pub fn to_maps(&self) -> Vec<serde_json::Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// First value as an integer. NULL and "no rows" are both `None`.
    pub fn scalar_int(&self) -> DbResult<Option<i64>> {
        match self.first_value() {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v @ JsonValue::Number(n)) => {
                n.as_i64().map(Some).ok_or_else(|| not_scalar("an integer", v))
            }
            Some(JsonValue::Bool(b)) => Ok(Some(i64::from(*b))),
            // Decimals come back as strings
            Some(v @ JsonValue::String(s)) => {
                s.parse().map(Some).map_err(|_| not_scalar("an integer", v))
            }
            Some(v) => Err(not_scalar("an integer", v)),
        }
    }

    /// First value as a float. NULL and "no rows" are both `None`.
    pub fn scalar_float(&self) -> DbResult<Option<f64>> {
        match self.first_value() {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v @ JsonValue::Number(n)) => {
                n.as_f64().map(Some).ok_or_else(|| not_scalar("a float", v))
            }
            Some(v @ JsonValue::String(s)) => {
                s.parse().map(Some).map_err(|_| not_scalar("a float", v))
            }
            Some(v) => Err(not_scalar("a float", v)),
        }
    }

    /// First value as a string. Non-string values use their JSON rendering.
    pub fn scalar_str(&self) -> DbResult<Option<String>> {
        Ok(match self.first_value() {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(v) => Some(v.to_string()),
        })
    }
}

fn not_scalar(expected: &str, value: &JsonValue) -> DbError {
    DbError::invalid_input(format!("Expected {} scalar, got {}", expected, value))
}
