//! Record kinds and the value types shared by every repository.
//!
//! # Responsibility
//! - Define the illustrative `Article`/`Comment` records.
//! - Define the tagged `FieldValue` used by attribute maps and predicates.
//! - Host the declarative validation gate.
//!
//! # Invariants
//! - `id == 0` means "not yet persisted"; stored rows never carry id 0.
//! - Timestamps are Unix epoch milliseconds.

pub mod article;
pub mod comment;
pub mod validation;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Surrogate identity assigned by the store.
pub type RecordId = i64;

/// Dynamically typed column value for partial writes and bound parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    /// Unix epoch milliseconds.
    Timestamp(i64),
}

impl FieldValue {
    /// Converts into the value bound to a SQL placeholder.
    pub fn to_sql_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(value) | Self::Timestamp(value) => Value::Integer(*value),
            Self::Real(value) => Value::Real(*value),
            Self::Text(value) => Value::Text(value.clone()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Current instant as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
