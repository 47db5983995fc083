//! Literal quoting.
//!
//! The only place that turns a storage value into SQL literal text. Statements bind
//! values as parameters wherever SQLite allows it; literals are reserved for the
//! `CASE WHEN pk = <id> THEN origin.col + <amount>` expressions of staged updates
//! and for keying read-back rows.

use crate::value::StorageValue;
use std::fmt::Write;

/// Render a storage value as an SQLite literal.
///
/// Non-finite reals have no literal form and render as `NULL`.
pub fn quote_value(value: &StorageValue) -> String {
    match value {
        StorageValue::Null => "NULL".to_string(),
        StorageValue::Integer(v) => v.to_string(),
        StorageValue::Real(v) if v.is_finite() => format!("{v:?}"),
        StorageValue::Real(_) => "NULL".to_string(),
        StorageValue::Text(s) => quote_text(s),
        StorageValue::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02X}");
            }
            out.push('\'');
            out
        }
    }
}

/// Render text as a single-quoted SQL string, doubling embedded quotes.
pub fn quote_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}
