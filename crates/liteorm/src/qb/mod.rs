//! Query builder (QB): filters and SELECT statements over entity tables.
//!
//! # Features
//!
//! - **Expression layer**: AND/OR/NOT groups with automatic `?N` placeholder numbering
//! - **No string replacement**: parameter indices are computed at build time
//! - **Schema-checked**: filters referencing undeclared fields are rejected before any SQL runs
//!
//! # Usage
//!
//! ```ignore
//! use liteorm::qb::{self, Filter};
//!
//! let filter = Filter::new().eq("name", "alice").gt("count", 3).limit(20);
//! let (sql, params) = qb::select(&schema, &filter, &["id", "count"])?;
//! // SELECT "id", "count" FROM "counters" WHERE "name" = ?1 AND "count" > ?2 LIMIT 20
//! ```

mod expr;
mod filter;
mod param;
mod select;

pub use expr::{Expr, ExprGroup};
pub use filter::{Filter, Order};
pub use param::ParamList;
pub use select::SelectQb;

use crate::error::OrmResult;
use crate::schema::EntitySchema;
use crate::value::StorageValue;

/// Render `SELECT <fields> FROM <table> WHERE <filter>` and its bound parameters.
///
/// An empty `fields` slice selects `*`.
pub fn select(
    schema: &EntitySchema,
    filter: &Filter,
    fields: &[&str],
) -> OrmResult<(String, Vec<StorageValue>)> {
    let mut qb = SelectQb::new(schema, filter);
    if !fields.is_empty() {
        qb = qb.select_fields(fields);
    }
    let (sql, params) = qb.to_sql()?;
    Ok((sql, params.into_vec()))
}
