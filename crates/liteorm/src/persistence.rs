//! Unit-of-work writes: insert, batched update, remove.
//!
//! A [`Persistence`] holds one pooled connection for its whole lifetime. Every write
//! runs in its own transaction; entities receive store-computed values (generated keys,
//! incremented fields) only after that transaction commits.

use crate::changeset::ChangeSet;
use crate::compiler::{MAX_BIND_PARAMS, UpdatePlan};
use crate::connection::SqlConnection;
use crate::error::{OrmError, OrmResult};
use crate::pool::PooledConnection;
use crate::qb::{self, Filter, ParamList};
use crate::resolver::{DeleteResult, delete_staged};
use crate::schema::{Entity, EntitySchema, FieldSchema};
use crate::serialize::partial_serialize;
use crate::staging::StagingTable;
use crate::value::{StorageValue, Value};

/// Writes entities of any schema through one acquired connection.
#[derive(Debug)]
pub struct Persistence {
    conn: PooledConnection,
    staging: StagingTable,
}

impl Persistence {
    pub(crate) fn new(conn: PooledConnection, staging: StagingTable) -> Self {
        Self { conn, staging }
    }

    /// Insert `items` with multi-row `INSERT` statements.
    ///
    /// When the schema has an auto-increment key and every item leaves it `Null`, the
    /// column is omitted and the generated keys are assigned back to the items.
    /// Returns the number of inserted rows.
    pub fn insert<T: Entity>(&mut self, schema: &EntitySchema, items: &mut [T]) -> OrmResult<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let generated = match schema.auto_increment_field() {
            Some(field) => {
                let missing = items
                    .iter()
                    .filter(|item| item.field(field.name()).unwrap_or(Value::Null).is_null())
                    .count();
                if missing != 0 && missing != items.len() {
                    return Err(OrmError::validation(format!(
                        "either all or none of the inserted items must set '{}'",
                        field.name()
                    )));
                }
                missing == items.len()
            }
            None => false,
        };

        let pk_name = schema.primary_key().name();
        let fields: Vec<&FieldSchema> = schema
            .fields()
            .iter()
            .filter(|f| !(generated && f.name() == pk_name))
            .collect();

        let rows = items
            .iter()
            .map(|item| -> OrmResult<Vec<StorageValue>> {
                let values: Vec<(&str, Value)> = fields
                    .iter()
                    .map(|f| (f.name(), item.field(f.name()).unwrap_or(Value::Null)))
                    .collect();
                let row =
                    partial_serialize(schema, values.iter().map(|(name, value)| (*name, value)))?;
                Ok(row.into_iter().map(|(_, value)| value).collect())
            })
            .collect::<OrmResult<Vec<_>>>()?;

        let columns: Vec<String> = fields.iter().map(|f| f.column_sql()).collect();
        let per_chunk = (MAX_BIND_PARAMS / columns.len().max(1)).max(1);
        let table = schema.table_sql();

        let (inserted, last_ids) = self.conn.transaction(|session| {
            let mut inserted = 0u64;
            let mut last_ids = Vec::new();
            for chunk in rows.chunks(per_chunk) {
                if columns.is_empty() {
                    // Only a generated key.
                    for _ in chunk {
                        session.run(&format!("INSERT INTO {table} DEFAULT VALUES"), &[])?;
                    }
                } else {
                    let (sql, params) = insert_sql(&table, &columns, chunk);
                    session.run(&sql, &params)?;
                }
                inserted += chunk.len() as u64;
                if generated {
                    last_ids.push((chunk.len(), last_insert_rowid(session)?));
                }
            }
            Ok((inserted, last_ids))
        })?;

        if generated {
            let mut offset = 0;
            for (len, last) in last_ids {
                assign_auto_increment(schema, &mut items[offset..offset + len], last)?;
                offset += len;
            }
        }

        tracing::debug!(target: "liteorm.sql", table = %schema.table().name(), inserted, "inserted rows");
        Ok(inserted)
    }

    /// Apply a batch of change sets with one staged `UPDATE`.
    ///
    /// Fields changed by `$inc` are read back into each change set's entity.
    /// Returns the number of origin rows the `UPDATE` touched.
    pub fn update<T: Entity + ?Sized>(
        &mut self,
        schema: &EntitySchema,
        change_sets: &mut [ChangeSet<'_, T>],
    ) -> OrmResult<u64> {
        let plan = UpdatePlan::compile(schema, change_sets)?;
        if plan.is_noop() {
            return Ok(0);
        }

        let staging = &self.staging;
        let (modified, decoded) = self.conn.transaction(|session| {
            plan.stage(session, schema, staging)?;
            let modified = staging.apply_update(session, schema, &plan.set_fields())?;
            let decoded = if plan.has_returning() {
                let rows = staging.read_back(session, &plan.staged_columns())?;
                plan.decode_returning(schema, &rows)?
            } else {
                Vec::new()
            };
            staging.discard(session)?;
            Ok((modified, decoded))
        })?;

        UpdatePlan::assign_returning(decoded, change_sets)?;
        Ok(modified)
    }

    /// Delete `items` by primary key.
    pub fn remove<T: Entity>(&mut self, schema: &EntitySchema, items: &[T]) -> OrmResult<DeleteResult> {
        let pk = schema.primary_key();
        let keys = items
            .iter()
            .map(|item| {
                item.field(pk.name())
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| OrmError::validation(format!("item has no '{}'", pk.name())))
            })
            .collect::<OrmResult<Vec<_>>>()?;
        if keys.is_empty() {
            return Ok(DeleteResult::default());
        }

        let staging = &self.staging;
        let mut result = DeleteResult::default();
        for chunk in keys.chunks(MAX_BIND_PARAMS) {
            let filter = Filter::new().in_list(pk.name(), chunk.to_vec());
            let (sql, params) = qb::select(schema, &filter, &[pk.name()])?;
            let part = self
                .conn
                .transaction(|session| delete_staged(session, staging, schema, &sql, &params))?;
            result.modified += part.modified;
            result.primary_keys.extend(part.primary_keys);
        }
        Ok(result)
    }

    /// Assign generated keys to `items` from the store's last generated key.
    ///
    /// Must run right after the single multi-row insert that created `items`, with no
    /// other writer on the connection in between: keys are derived as
    /// `last - items.len() + 1 ..= last`.
    pub fn populate_auto_increment_fields<T: Entity>(
        &mut self,
        schema: &EntitySchema,
        items: &mut [T],
    ) -> OrmResult<()> {
        if schema.auto_increment_field().is_none() || items.is_empty() {
            return Ok(());
        }
        let last = self.conn.transaction(|session| last_insert_rowid(session))?;
        assign_auto_increment(schema, items, last)
    }

    /// Return the connection to the pool.
    pub fn release(self) {
        self.conn.release();
    }
}

fn insert_sql(table: &str, columns: &[String], rows: &[Vec<StorageValue>]) -> (String, Vec<StorageValue>) {
    let mut params = ParamList::new();
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let placeholders: Vec<String> =
                row.iter().map(|v| params.placeholder(v.clone())).collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {}",
        columns.join(", "),
        tuples.join(", ")
    );
    (sql, params.into_vec())
}

/// `SELECT last_insert_rowid()`; a missing row means the insert did not happen.
pub fn last_insert_rowid(conn: &impl SqlConnection) -> OrmResult<i64> {
    let row = conn.query_single("SELECT last_insert_rowid() AS rowid", &[])?;
    match row.try_get("rowid")? {
        StorageValue::Integer(id) => Ok(*id),
        other => Err(OrmError::decode("rowid", format!("expected integer, got {other:?}"))),
    }
}

/// Keys `last - n + 1 ..= last`, in insertion order.
pub fn auto_increment_keys(last: i64, count: usize) -> impl Iterator<Item = i64> {
    let first = last - count as i64 + 1;
    first..=last
}

fn assign_auto_increment<T: Entity>(schema: &EntitySchema, items: &mut [T], last: i64) -> OrmResult<()> {
    let Some(field) = schema.auto_increment_field() else {
        return Ok(());
    };
    let count = items.len();
    for (item, id) in items.iter_mut().zip(auto_increment_keys(last, count)) {
        item.set_field(field.name(), Value::Integer(id))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_numbers_every_cell() {
        let (sql, params) = insert_sql(
            r#""t""#,
            &[r#""a""#.to_string(), r#""b""#.to_string()],
            &[
                vec![StorageValue::Integer(1), StorageValue::Null],
                vec![StorageValue::Integer(2), StorageValue::Text("x".into())],
            ],
        );
        assert_eq!(sql, r#"INSERT INTO "t" ("a", "b") VALUES (?1, ?2), (?3, ?4)"#);
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn generated_keys_are_assigned_in_order() {
        let schema = EntitySchema::builder("tickets")
            .primary_key("id", crate::schema::FieldKind::Integer)
            .auto_increment()
            .build()
            .unwrap();
        let mut items = vec![std::collections::BTreeMap::<String, Value>::new(); 3];
        assign_auto_increment(&schema, &mut items, 12).unwrap();
        let ids: Vec<_> = items.iter().map(|item| item["id"].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(10), Value::Integer(11), Value::Integer(12)]);
    }

    #[test]
    fn keys_end_at_last_generated() {
        assert_eq!(auto_increment_keys(10, 3).collect::<Vec<_>>(), vec![8, 9, 10]);
        assert_eq!(auto_increment_keys(1, 1).collect::<Vec<_>>(), vec![1]);
        assert_eq!(auto_increment_keys(5, 0).count(), 0);
    }
}
