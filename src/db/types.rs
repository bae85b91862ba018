//! Row decoding.
//!
//! Column values are classified into a [`TypeCategory`] first, then decoded by
//! the backend-specific decoder into a `serde_json::Value`:
//!
//! | Category  | JSON                                  |
//! |-----------|---------------------------------------|
//! | Integer   | number                                |
//! | Float     | number (string for NaN / infinities)  |
//! | Decimal   | string, exact database representation |
//! | Boolean   | bool                                  |
//! | Binary    | base64 string                         |
//! | Json      | embedded JSON                         |
//! | Temporal  | string                                |
//! | Uuid/Text | string                                |
//!
//! MySQL and PostgreSQL classify by the declared column type. SQLite is
//! dynamically typed, so its values are classified by their storage class.

use crate::models::DatabaseType;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Temporal,
    Uuid,
    Text,
}

/// Classify a database type name into a logical category.
///
/// Only the first word counts, so `DECIMAL(10,2)`, `INT UNSIGNED` and
/// `DOUBLE PRECISION` classify like their base type.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();
    let base = lower.split(['(', ' ']).next().unwrap_or_default();

    match base {
        // SQLite's NUMERIC affinity holds floats
        "decimal" | "numeric" if db == DatabaseType::SQLite => TypeCategory::Float,
        "decimal" | "numeric" => TypeCategory::Decimal,
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2" | "int4"
        | "int8" | "smallserial" | "serial" | "bigserial" => TypeCategory::Integer,
        "bool" | "boolean" => TypeCategory::Boolean,
        "float" | "float4" | "float8" | "double" | "real" => TypeCategory::Float,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" | "bytea" => {
            TypeCategory::Binary
        }
        "timestamp" | "timestamptz" | "datetime" | "date" | "time" | "timetz" => {
            TypeCategory::Temporal
        }
        _ => TypeCategory::Text,
    }
}

/// Binary values are always base64 encoded.
pub fn binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// DECIMAL/NUMERIC value kept in its exact textual form.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        categorize_type(ty.name(), DatabaseType::MySQL) == TypeCategory::Decimal
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        // Both MySQL protocols send DECIMAL as text
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        categorize_type(ty.name(), DatabaseType::PostgreSQL) == TypeCategory::Decimal
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
            PgValueFormat::Binary => pg_numeric_to_string(value.as_bytes()?)
                .map(RawDecimal)
                .ok_or_else(|| "malformed binary NUMERIC".into()),
        }
    }
}

/// Render PostgreSQL's binary NUMERIC (base-10000 digit groups) as text.
fn pg_numeric_to_string(buf: &[u8]) -> Option<String> {
    use std::fmt::Write as _;

    let word = |i: usize| -> Option<u16> {
        let b = buf.get(i * 2..i * 2 + 2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    };

    let ndigits = usize::from(word(0)?);
    let weight = i32::from(word(1)? as i16);
    let sign = word(2)?;
    let dscale = usize::from(word(3)?);
    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Option<Vec<u16>>>()?;

    match sign {
        0xC000 => return Some("NaN".to_string()),
        0xD000 => return Some("Infinity".to_string()),
        0xF000 => return Some("-Infinity".to_string()),
        _ => {}
    }

    // Group at index `g` has weight `weight - g`
    let group = |g: i32| -> u16 {
        usize::try_from(g)
            .ok()
            .and_then(|g| digits.get(g).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for g in 0..=weight {
            let _ = if g == 0 {
                write!(out, "{}", group(g))
            } else {
                write!(out, "{:04}", group(g))
            };
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut g = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", group(g));
            g += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Some(out)
}

// =============================================================================
// Row to JSON
// =============================================================================

/// Conversion of a driver row into column names and JSON values.
pub trait RowToJson {
    fn column_names(&self) -> Vec<String>;
    /// Values in column order.
    fn to_json_values(&self) -> Vec<JsonValue>;
}

macro_rules! impl_row_to_json {
    ($($row:ty => $decoder:ident),+ $(,)?) => {$(
        impl RowToJson for $row {
            fn column_names(&self) -> Vec<String> {
                self.columns().iter().map(|c| c.name().to_string()).collect()
            }

            fn to_json_values(&self) -> Vec<JsonValue> {
                (0..self.len())
                    .map(|idx| $decoder::decode_column(self, idx))
                    .collect()
            }
        }
    )+};
}

impl_row_to_json!(MySqlRow => mysql, PgRow => postgres, SqliteRow => sqlite);

/// `Some(value)` when the column decodes as `Option<$ty>` and is not NULL.
macro_rules! try_decode {
    ($row:expr, $idx:expr, $ty:ty) => {
        $row.try_get::<Option<$ty>, _>($idx).ok().flatten()
    };
}

/// Date and time columns, tried from the most to the least specific type.
macro_rules! decode_temporal {
    ($row:expr, $idx:expr) => {
        try_decode!($row, $idx, chrono::DateTime<chrono::Utc>)
            .map(|v| v.to_rfc3339())
            .or_else(|| try_decode!($row, $idx, chrono::NaiveDateTime).map(|v| v.to_string()))
            .or_else(|| try_decode!($row, $idx, chrono::NaiveDate).map(|v| v.to_string()))
            .or_else(|| try_decode!($row, $idx, chrono::NaiveTime).map(|v| v.to_string()))
            .or_else(|| try_decode!($row, $idx, String))
            .map(JsonValue::String)
    };
}

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize) -> JsonValue {
        let category = categorize_type(row.column(idx).type_info().name(), DatabaseType::MySQL);
        let value = match category {
            TypeCategory::Decimal => match row.try_get::<Option<RawDecimal>, _>(idx) {
                Ok(v) => v.map(|d| JsonValue::String(d.0)),
                Err(e) => {
                    tracing::error!(column = idx, error = %e, "Failed to decode DECIMAL");
                    None
                }
            },
            TypeCategory::Integer => try_decode!(row, idx, i64)
                .map(JsonValue::from)
                .or_else(|| try_decode!(row, idx, u64).map(JsonValue::from)),
            TypeCategory::Boolean => try_decode!(row, idx, bool).map(JsonValue::Bool),
            TypeCategory::Float => try_decode!(row, idx, f64)
                .or_else(|| try_decode!(row, idx, f32).map(f64::from))
                .map(float_value),
            TypeCategory::Binary => try_decode!(row, idx, Vec<u8>).map(|b| binary_value(&b)),
            TypeCategory::Json => try_decode!(row, idx, JsonValue),
            TypeCategory::Temporal => decode_temporal!(row, idx),
            TypeCategory::Uuid | TypeCategory::Text => try_decode!(row, idx, String)
                .map(JsonValue::String)
                // Binary collations surface as VARBINARY-compatible text
                .or_else(|| try_decode!(row, idx, Vec<u8>).map(|b| binary_value(&b))),
        };
        value.unwrap_or(JsonValue::Null)
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize) -> JsonValue {
        let category = categorize_type(
            row.column(idx).type_info().name(),
            DatabaseType::PostgreSQL,
        );
        let value = match category {
            TypeCategory::Decimal => match row.try_get::<Option<RawDecimal>, _>(idx) {
                Ok(v) => v.map(|d| JsonValue::String(d.0)),
                Err(e) => {
                    tracing::error!(column = idx, error = %e, "Failed to decode NUMERIC");
                    None
                }
            },
            // Postgres integer types only decode into their exact width
            TypeCategory::Integer => try_decode!(row, idx, i64)
                .or_else(|| try_decode!(row, idx, i32).map(i64::from))
                .or_else(|| try_decode!(row, idx, i16).map(i64::from))
                .map(JsonValue::from),
            TypeCategory::Boolean => try_decode!(row, idx, bool).map(JsonValue::Bool),
            TypeCategory::Float => try_decode!(row, idx, f64)
                .or_else(|| try_decode!(row, idx, f32).map(f64::from))
                .map(float_value),
            TypeCategory::Binary => try_decode!(row, idx, Vec<u8>).map(|b| binary_value(&b)),
            TypeCategory::Json => try_decode!(row, idx, JsonValue),
            TypeCategory::Temporal => decode_temporal!(row, idx),
            TypeCategory::Uuid => {
                try_decode!(row, idx, uuid::Uuid).map(|u| JsonValue::String(u.to_string()))
            }
            TypeCategory::Text => try_decode!(row, idx, String).map(JsonValue::String),
        };
        value.unwrap_or(JsonValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize) -> JsonValue {
        let category = match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => {
                categorize_type(raw.type_info().name(), DatabaseType::SQLite)
            }
            _ => return JsonValue::Null,
        };
        let value = match category {
            TypeCategory::Integer | TypeCategory::Boolean => {
                try_decode!(row, idx, i64).map(JsonValue::from)
            }
            TypeCategory::Float | TypeCategory::Decimal => {
                try_decode!(row, idx, f64).map(float_value)
            }
            TypeCategory::Binary => try_decode!(row, idx, Vec<u8>).map(|b| binary_value(&b)),
            _ => try_decode!(row, idx, String).map(JsonValue::String),
        };
        value.unwrap_or(JsonValue::Null)
    }
}
