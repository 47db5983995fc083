//! Schema-driven conversion between [`Value`] and [`StorageValue`].

use crate::error::{OrmError, OrmResult};
use crate::schema::{EntitySchema, FieldKind, FieldSchema};
use crate::value::{StorageValue, Value, format_timestamp};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Convert a typed value into the storage form declared by `field`.
pub fn to_storage(field: &FieldSchema, value: &Value) -> OrmResult<StorageValue> {
    let mismatch = || {
        OrmError::serialization(format!(
            "field '{}' expects {:?}, got {}",
            field.name(),
            field.kind(),
            value.type_name()
        ))
    };

    if value.is_null() {
        return if field.is_nullable() {
            Ok(StorageValue::Null)
        } else {
            Err(OrmError::serialization(format!(
                "field '{}' is not nullable",
                field.name()
            )))
        };
    }

    let stored = match (field.kind(), value) {
        (FieldKind::Integer, Value::Integer(v)) => StorageValue::Integer(*v),
        (FieldKind::Integer, Value::Bool(b)) => StorageValue::Integer(i64::from(*b)),
        (FieldKind::Real, Value::Real(v)) => StorageValue::Real(*v),
        (FieldKind::Real, Value::Integer(v)) => StorageValue::Real(*v as f64),
        (FieldKind::Text, Value::Text(s)) => StorageValue::Text(s.clone()),
        (FieldKind::Bool, Value::Bool(b)) => StorageValue::Integer(i64::from(*b)),
        (FieldKind::Blob, Value::Blob(b)) => StorageValue::Blob(b.clone()),
        (FieldKind::Json, Value::Json(v)) => StorageValue::Text(v.to_string()),
        (FieldKind::Timestamp, Value::Timestamp(ts)) => StorageValue::Text(format_timestamp(ts)),
        (FieldKind::Uuid, Value::Uuid(u)) => StorageValue::Text(u.hyphenated().to_string()),
        _ => return Err(mismatch()),
    };
    Ok(stored)
}

/// Convert a value read from the store back into the typed form declared by `field`.
pub fn from_storage(field: &FieldSchema, value: StorageValue) -> OrmResult<Value> {
    let column = field.name();
    let unexpected = |got: &str| {
        OrmError::decode(
            column,
            format!("expected {:?} storage, got {got}", field.kind()),
        )
    };

    let typed = match (field.kind(), value) {
        (_, StorageValue::Null) => Value::Null,
        (FieldKind::Integer, StorageValue::Integer(v)) => Value::Integer(v),
        (FieldKind::Integer, StorageValue::Real(v)) if v.fract() == 0.0 => Value::Integer(v as i64),
        (FieldKind::Real, StorageValue::Real(v)) => Value::Real(v),
        (FieldKind::Real, StorageValue::Integer(v)) => Value::Real(v as f64),
        (FieldKind::Text, StorageValue::Text(s)) => Value::Text(s),
        (FieldKind::Bool, StorageValue::Integer(v)) => Value::Bool(v != 0),
        (FieldKind::Blob, StorageValue::Blob(b)) => Value::Blob(b),
        (FieldKind::Json, StorageValue::Text(s)) => Value::Json(
            serde_json::from_str(&s).map_err(|e| OrmError::decode(column, e.to_string()))?,
        ),
        (FieldKind::Timestamp, StorageValue::Text(s)) => Value::Timestamp(
            DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| OrmError::decode(column, e.to_string()))?,
        ),
        (FieldKind::Uuid, StorageValue::Text(s)) => Value::Uuid(
            Uuid::parse_str(&s).map_err(|e| OrmError::decode(column, e.to_string()))?,
        ),
        (_, StorageValue::Integer(_)) => return Err(unexpected("integer")),
        (_, StorageValue::Real(_)) => return Err(unexpected("real")),
        (_, StorageValue::Text(_)) => return Err(unexpected("text")),
        (_, StorageValue::Blob(_)) => return Err(unexpected("blob")),
    };
    Ok(typed)
}

/// Serialize only the given fields, in the given order.
///
/// Absent fields never appear in the output; unknown field names are rejected.
pub fn partial_serialize<'a, I>(
    schema: &EntitySchema,
    pairs: I,
) -> OrmResult<Vec<(String, StorageValue)>>
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| {
            let field = schema.require_field(name)?;
            Ok((name.to_string(), to_storage(field, value)?))
        })
        .collect()
}
