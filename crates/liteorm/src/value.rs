//! Typed field values.
//!
//! [`Value`] is what entities hand to and receive from the ORM. The storage form that
//! actually crosses the driver boundary is [`StorageValue`] (SQLite's five storage
//! classes); conversion between the two is schema-driven and lives in
//! [`crate::serialize`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

/// SQLite storage value (`NULL`, `INTEGER`, `REAL`, `TEXT`, `BLOB`).
pub use rusqlite::types::Value as StorageValue;

/// A typed entity field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Json(_) => "json",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
        }
    }

    /// Schema-independent storage form.
    ///
    /// Used for filter parameters, where no field kind is known. Field values that
    /// are written to a table go through [`crate::serialize::to_storage`] instead.
    pub fn to_storage(&self) -> StorageValue {
        match self {
            Value::Null => StorageValue::Null,
            Value::Bool(b) => StorageValue::Integer(i64::from(*b)),
            Value::Integer(v) => StorageValue::Integer(*v),
            Value::Real(v) => StorageValue::Real(*v),
            Value::Text(s) => StorageValue::Text(s.clone()),
            Value::Blob(b) => StorageValue::Blob(b.clone()),
            Value::Json(v) => StorageValue::Text(v.to_string()),
            Value::Timestamp(ts) => StorageValue::Text(format_timestamp(ts)),
            Value::Uuid(u) => StorageValue::Text(u.hyphenated().to_string()),
        }
    }
}

/// RFC 3339 in UTC with a `Z` suffix; lexicographic order matches time order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
    }

    #[test]
    fn storage_form_is_schema_independent() {
        assert_eq!(Value::Bool(true).to_storage(), StorageValue::Integer(1));
        assert_eq!(
            Value::Json(serde_json::json!({"a": 1})).to_storage(),
            StorageValue::Text(r#"{"a":1}"#.into())
        );
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            Value::from(ts).to_storage(),
            StorageValue::Text("2024-03-01T12:00:00.000000Z".into())
        );
    }

    #[test]
    fn numeric_accessors() {
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Real(1.5).as_i64(), None);
        assert_eq!(Value::Text("x".into()).as_str(), Some("x"));
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_value(vec![Value::Integer(1), Value::Null, "a".into()]).unwrap();
        assert_eq!(json, serde_json::json!([1, null, "a"]));
    }
}
