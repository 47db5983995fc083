//! Query-scoped patch and delete.
//!
//! Unlike [`crate::Persistence::update`], the affected rows are not known up front: a
//! [`Filter`] selects them. The filtered primary keys, together with the new value of
//! every changed or requested field, are staged first; the origin table is then mutated
//! by joining against the staging table, and the staged copy is read back as the record
//! of what was affected.

use crate::changeset::{Change, Changes};
use crate::connection::{Session, SqlConnection};
use crate::error::{OrmError, OrmResult};
use crate::ident::quote_identifier;
use crate::pool::ConnectionPool;
use crate::qb::{Filter, ParamList, SelectQb};
use crate::quote::quote_value;
use crate::schema::EntitySchema;
use crate::serialize::{from_storage, to_storage};
use crate::staging::StagingTable;
use crate::value::{StorageValue, Value};
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of [`QueryResolver::patch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchResult {
    /// Rows the origin `UPDATE` changed.
    pub modified: u64,
    /// Primary keys of every matched row, in staged order.
    pub primary_keys: Vec<Value>,
    /// Post-patch values per returned field, aligned with `primary_keys`.
    pub returning: BTreeMap<String, Vec<Value>>,
}

/// Outcome of [`QueryResolver::delete`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteResult {
    /// Rows removed from the origin table.
    pub modified: u64,
    /// Primary keys of the removed rows.
    pub primary_keys: Vec<Value>,
}

/// A decoded row: field name to typed value.
pub type Record = BTreeMap<String, Value>;

/// Resolves filter-scoped operations against one entity table.
///
/// Each call acquires its own connection and releases it before returning, on error
/// paths too.
#[derive(Debug, Clone)]
pub struct QueryResolver<'s> {
    pool: ConnectionPool,
    schema: &'s EntitySchema,
    staging: StagingTable,
}

impl<'s> QueryResolver<'s> {
    pub(crate) fn new(pool: ConnectionPool, schema: &'s EntitySchema, staging: StagingTable) -> Self {
        Self {
            pool,
            schema,
            staging,
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        self.schema
    }

    /// Apply `changes` to every row matching `filter`.
    ///
    /// `returning` names fields whose post-patch values are reported; incremented fields
    /// are always reported. A returned field that is also `$set` reports the new value.
    pub fn patch(
        &self,
        filter: &Filter,
        changes: &Changes,
        returning: &[&str],
    ) -> OrmResult<PatchResult> {
        let schema = self.schema;
        changes.validate(schema)?;

        let pk = schema.primary_key();
        let mut params = ParamList::new();
        let mut projected = vec![pk.name().to_string()];
        let mut select = vec![pk.column_sql()];
        let mut touched = Vec::new();
        let mut reported: Vec<&str> = Vec::new();

        for (name, change) in changes.iter() {
            let field = schema.require_field(name)?;
            let col = field.column_sql();
            let expr = match change {
                Change::Set(value) => params.placeholder(to_storage(field, value)?),
                Change::Unset => "NULL".to_string(),
                Change::Inc(amount) => {
                    reported.push(name);
                    format!("{col} + {}", params.placeholder(to_storage(field, amount)?))
                }
            };
            select.push(format!("{expr} AS {col}"));
            projected.push(name.to_string());
            touched.push(name);
        }

        for name in returning {
            schema.require_field(name)?;
            if !reported.contains(name) {
                reported.push(*name);
            }
            if !projected.iter().any(|p| p == name) {
                let col = quote_identifier(name);
                select.push(format!("{col} AS {col}"));
                projected.push(name.to_string());
            }
        }

        let select_sql = SelectQb::new(schema, filter)
            .select_exprs(select)
            .build(&mut params)?;
        let params = params.into_vec();
        let columns: Vec<&str> = projected.iter().map(String::as_str).collect();
        let staging = &self.staging;

        let result = self.with_connection(|session| {
            staging.create(session, &select_sql, &params)?;
            let modified = if touched.is_empty() {
                0
            } else {
                staging.apply_update(session, schema, &touched)?
            };
            let rows = staging.read_back(session, &columns)?;
            staging.discard(session)?;

            let mut result = PatchResult {
                modified,
                primary_keys: Vec::with_capacity(rows.len()),
                returning: reported
                    .iter()
                    .map(|name| (name.to_string(), Vec::with_capacity(rows.len())))
                    .collect(),
            };
            for row in rows {
                result
                    .primary_keys
                    .push(from_storage(pk, row.try_get(pk.name())?.clone())?);
                for name in &reported {
                    let field = schema.require_field(name)?;
                    let value = from_storage(field, row.try_get(name)?.clone())?;
                    if let Some(values) = result.returning.get_mut(*name) {
                        values.push(value);
                    }
                }
            }
            Ok(result)
        })?;

        tracing::debug!(
            target: "liteorm.sql",
            table = %schema.table().name(),
            modified = result.modified,
            matched = result.primary_keys.len(),
            "patch applied"
        );
        Ok(result)
    }

    /// Delete every row matching `filter`.
    pub fn delete(&self, filter: &Filter) -> OrmResult<DeleteResult> {
        let schema = self.schema;
        let pk = schema.primary_key().name();
        let (select_sql, params) = SelectQb::new(schema, filter)
            .select_fields(&[pk])
            .to_sql()?;
        let params = params.into_vec();
        let staging = &self.staging;
        self.with_connection(|session| delete_staged(session, staging, schema, &select_sql, &params))
    }

    /// Number of rows matching `filter` (after its limit and offset).
    pub fn count(&self, filter: &Filter) -> OrmResult<u64> {
        let pk = self.schema.primary_key().name();
        let (inner, params) = SelectQb::new(self.schema, filter)
            .select_fields(&[pk])
            .to_sql()?;
        let sql = format!("SELECT COUNT(*) AS n FROM ({inner})");
        let row = self.with_connection(|session| session.query_single(&sql, params.as_slice()))?;
        match row.try_get("n")? {
            StorageValue::Integer(n) => Ok(*n as u64),
            other => Err(OrmError::decode("n", format!("expected integer, got {other:?}"))),
        }
    }

    /// Every row matching `filter`, decoded by the schema.
    pub fn find(&self, filter: &Filter) -> OrmResult<Vec<Record>> {
        let (sql, params) = SelectQb::new(self.schema, filter).to_sql()?;
        let rows = self.with_connection(|session| session.query_all(&sql, params.as_slice()))?;
        rows.into_iter()
            .map(|row| {
                row.iter()
                    .filter_map(|(column, value)| {
                        self.schema.field(column).map(|field| {
                            from_storage(field, value.clone()).map(|v| (column.to_string(), v))
                        })
                    })
                    .collect()
            })
            .collect()
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Session<'_>) -> OrmResult<T>,
    ) -> OrmResult<T> {
        let conn = self.pool.get()?;
        let result = conn.transaction(f);
        conn.release();
        result
    }
}

/// Stage the keys selected by `select_sql`, delete them from the origin table, and
/// report them. Runs inside the caller's transaction, decoding included.
pub(crate) fn delete_staged(
    conn: &impl SqlConnection,
    staging: &StagingTable,
    schema: &EntitySchema,
    select_sql: &str,
    params: &[StorageValue],
) -> OrmResult<DeleteResult> {
    let pk = schema.primary_key();
    staging.create(conn, select_sql, params)?;
    let modified = staging.apply_delete(conn, schema)?;
    let rows = staging.read_back(conn, &[pk.name()])?;
    staging.discard(conn)?;

    let primary_keys = rows
        .iter()
        .map(|row| from_storage(pk, row.try_get(pk.name())?.clone()))
        .collect::<OrmResult<Vec<_>>>()?;

    tracing::debug!(
        target: "liteorm.sql",
        table = %schema.table().name(),
        modified,
        keys = %primary_keys
            .iter()
            .map(|k| quote_value(&k.to_storage()))
            .collect::<Vec<_>>()
            .join(", "),
        "rows deleted"
    );
    Ok(DeleteResult {
        modified,
        primary_keys,
    })
}
