//! Batch update compiler.
//!
//! Turns a list of heterogeneous [`ChangeSet`]s into one staged update:
//!
//! 1. every distinct touched field becomes one column of a `VALUES` table, with the
//!    primary key first;
//! 2. a `SELECT` over that table, joined to the origin rows, resolves each cell to its
//!    final value: bound `$set` literals pass through, `$inc` cells become
//!    `origin.col + amount`, and cells a row did not touch fall back to `origin.col`;
//! 3. the result is materialized into the staging table and applied with one
//!    `UPDATE ... FROM staging`;
//! 4. incremented values are read back and written into the in-memory entities.
//!
//! Only the `CASE WHEN pk = <literal>` arms interpolate literals; every other value is a
//! bound parameter.

use crate::changeset::{Change, ChangeSet};
use crate::connection::{Row, SqlConnection};
use crate::error::{OrmError, OrmResult};
use crate::ident::quote_identifier;
use crate::qb::ParamList;
use crate::quote::quote_value;
use crate::schema::{Entity, EntitySchema};
use crate::serialize::{from_storage, to_storage};
use crate::staging::StagingTable;
use crate::value::{StorageValue, Value};
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER`.
pub const MAX_BIND_PARAMS: usize = 32766;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    /// A `$set`/`$unset` value or the primary key; bound as a parameter.
    Literal(StorageValue),
    /// A `$inc` amount, resolved against the origin row.
    Increment(StorageValue),
    /// The row does not touch this field; keeps the origin value.
    Untouched,
}

/// A compiled batch update.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    /// Primary key first, then touched fields in first-seen order.
    columns: Vec<String>,
    /// Primary key literal of each row, for `CASE WHEN` arms.
    keys: Vec<String>,
    rows: Vec<Vec<Cell>>,
    /// Primary key literal -> (change set index, incremented fields).
    returning: BTreeMap<String, (usize, Vec<String>)>,
}

impl UpdatePlan {
    /// Compile `change_sets` against `schema`.
    ///
    /// Two change sets for the same primary key in one batch are rejected.
    pub fn compile<T: Entity + ?Sized>(
        schema: &EntitySchema,
        change_sets: &[ChangeSet<'_, T>],
    ) -> OrmResult<Self> {
        let pk_field = schema.primary_key();
        let mut columns = vec![pk_field.name().to_string()];
        let mut keys = Vec::with_capacity(change_sets.len());
        let mut per_row: Vec<Vec<(usize, Cell)>> = Vec::with_capacity(change_sets.len());
        let mut returning = BTreeMap::new();
        let mut seen = HashSet::new();

        for (index, change_set) in change_sets.iter().enumerate() {
            let pk = to_storage(pk_field, change_set.primary_key())?;
            let key = quote_value(&pk);
            if !seen.insert(key.clone()) {
                return Err(OrmError::validation(format!(
                    "primary key {key} appears in more than one change set"
                )));
            }

            let mut cells = vec![(0, Cell::Literal(pk))];
            let mut incremented = Vec::new();
            for (name, change) in change_set.changes().iter() {
                let field = schema.require_field(name)?;
                let column = match columns.iter().position(|c| c == name) {
                    Some(i) => i,
                    None => {
                        columns.push(name.to_string());
                        columns.len() - 1
                    }
                };
                let cell = match change {
                    Change::Set(value) => Cell::Literal(to_storage(field, value)?),
                    Change::Unset => Cell::Literal(StorageValue::Null),
                    Change::Inc(amount) => {
                        incremented.push(name.to_string());
                        Cell::Increment(to_storage(field, amount)?)
                    }
                };
                cells.push((column, cell));
            }

            if !incremented.is_empty() {
                returning.insert(key.clone(), (index, incremented));
            }
            keys.push(key);
            per_row.push(cells);
        }

        let width = columns.len();
        let rows = per_row
            .into_iter()
            .map(|cells| {
                let mut row = vec![Cell::Untouched; width];
                for (column, cell) in cells {
                    row[column] = cell;
                }
                row
            })
            .collect();

        Ok(Self {
            columns,
            keys,
            rows,
            returning,
        })
    }

    /// Whether the batch touches no field at all.
    pub fn is_noop(&self) -> bool {
        self.columns.len() < 2 || self.rows.is_empty()
    }

    /// Fields the origin `UPDATE` assigns.
    pub fn set_fields(&self) -> Vec<&str> {
        self.columns[1..].iter().map(String::as_str).collect()
    }

    /// Whether any row incremented a field, so the staging table must be read back.
    pub fn has_returning(&self) -> bool {
        !self.returning.is_empty()
    }

    /// Row ranges sized so no statement exceeds [`MAX_BIND_PARAMS`].
    pub fn chunks(&self) -> Vec<Range<usize>> {
        let per_chunk = (MAX_BIND_PARAMS / self.columns.len()).max(1);
        (0..self.rows.len())
            .step_by(per_chunk)
            .map(|start| start..(start + per_chunk).min(self.rows.len()))
            .collect()
    }

    /// The staging `SELECT` for `rows`, with its bound parameters.
    pub fn select_sql(&self, schema: &EntitySchema, rows: Range<usize>) -> (String, Vec<StorageValue>) {
        let mut params = ParamList::new();
        let rows_slice = &self.rows[rows.clone()];
        let keys = &self.keys[rows];

        let values: Vec<String> = rows_slice
            .iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| match cell {
                        Cell::Literal(v) => params.placeholder(v.clone()),
                        Cell::Increment(_) | Cell::Untouched => "NULL".to_string(),
                    })
                    .collect();
                format!("({})", cells.join(", "))
            })
            .collect();

        let renamed: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("column{} AS {}", i + 1, quote_identifier(c)))
            .collect();

        let pk = quote_identifier(&self.columns[0]);
        let projected: Vec<String> = (0..self.columns.len())
            .map(|column| self.project(column, rows_slice, keys, &pk))
            .collect();

        let sql = format!(
            "SELECT {} FROM (SELECT {} FROM (VALUES {})) AS _rows INNER JOIN {} AS _origin ON _origin.{pk} = _rows.{pk}",
            projected.join(", "),
            renamed.join(", "),
            values.join(", "),
            schema.table_sql(),
        );
        (sql, params.into_vec())
    }

    fn project(&self, column: usize, rows: &[Vec<Cell>], keys: &[String], pk: &str) -> String {
        let col = quote_identifier(&self.columns[column]);
        let mut arms = Vec::new();
        let mut untouched = Vec::new();
        for (row, key) in rows.iter().zip(keys) {
            match &row[column] {
                Cell::Increment(amount) => arms.push(format!(
                    "WHEN _rows.{pk} = {key} THEN _origin.{col} + {}",
                    quote_value(amount)
                )),
                Cell::Untouched => untouched.push(key.as_str()),
                Cell::Literal(_) => {}
            }
        }
        if arms.is_empty() && untouched.is_empty() {
            return format!("_rows.{col} AS {col}");
        }
        if !untouched.is_empty() {
            arms.push(format!(
                "WHEN _rows.{pk} IN ({}) THEN _origin.{col}",
                untouched.join(", ")
            ));
        }
        format!("CASE {} ELSE _rows.{col} END AS {col}", arms.join(" "))
    }

    /// Materialize every chunk into the staging table.
    pub fn stage(
        &self,
        conn: &impl SqlConnection,
        schema: &EntitySchema,
        staging: &StagingTable,
    ) -> OrmResult<()> {
        for (i, range) in self.chunks().into_iter().enumerate() {
            let (sql, params) = self.select_sql(schema, range);
            if i == 0 {
                staging.create(conn, &sql, &params)?;
            } else {
                staging.append(conn, &sql, &params)?;
            }
        }
        Ok(())
    }

    /// Columns of the staging table: primary key first, then the assigned fields.
    pub fn staged_columns(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    /// Decode the incremented values of staged rows, keyed by change set index.
    ///
    /// Runs inside the update's transaction so a decode failure rolls the update back.
    pub fn decode_returning(
        &self,
        schema: &EntitySchema,
        rows: &[Row],
    ) -> OrmResult<Vec<(usize, Vec<(String, Value)>)>> {
        let pk_name = schema.primary_key().name();
        let mut decoded = Vec::with_capacity(self.returning.len());
        for row in rows {
            let key = quote_value(row.try_get(pk_name)?);
            let Some((index, fields)) = self.returning.get(&key) else {
                continue;
            };
            let values = fields
                .iter()
                .map(|name| {
                    let field = schema.require_field(name)?;
                    let value = from_storage(field, row.try_get(name)?.clone())?;
                    Ok((name.clone(), value))
                })
                .collect::<OrmResult<Vec<_>>>()?;
            decoded.push((*index, values));
        }
        Ok(decoded)
    }

    /// Write decoded values back into the change sets' entities.
    pub fn assign_returning<T: Entity + ?Sized>(
        decoded: Vec<(usize, Vec<(String, Value)>)>,
        change_sets: &mut [ChangeSet<'_, T>],
    ) -> OrmResult<()> {
        for (index, values) in decoded {
            let Some(change_set) = change_sets.get_mut(index) else {
                continue;
            };
            for (name, value) in values {
                change_set.item_mut().set_field(&name, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::Changes;
    use crate::schema::FieldKind;

    type Record = BTreeMap<String, Value>;

    fn schema() -> EntitySchema {
        EntitySchema::builder("counters")
            .primary_key("id", FieldKind::Integer)
            .field("name", FieldKind::Text)
            .field("count", FieldKind::Integer)
            .nullable_field("note", FieldKind::Text)
            .build()
            .unwrap()
    }

    #[test]
    fn set_only_batch_passes_columns_through() {
        let s = schema();
        let (mut a, mut b) = (Record::new(), Record::new());
        let sets = vec![
            ChangeSet::new(&s, 1, Changes::new().set("name", "a"), &mut a).unwrap(),
            ChangeSet::new(&s, 2, Changes::new().set("name", "b"), &mut b).unwrap(),
        ];
        let plan = UpdatePlan::compile(&s, &sets).unwrap();
        assert_eq!(plan.set_fields(), vec!["name"]);
        assert!(!plan.has_returning());

        let (sql, params) = plan.select_sql(&s, 0..2);
        assert_eq!(
            sql,
            r#"SELECT _rows."id" AS "id", _rows."name" AS "name" FROM (SELECT column1 AS "id", column2 AS "name" FROM (VALUES (?1, ?2), (?3, ?4))) AS _rows INNER JOIN "counters" AS _origin ON _origin."id" = _rows."id""#
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn increments_and_untouched_cells_resolve_against_origin() {
        let s = schema();
        let (mut a, mut b) = (Record::new(), Record::new());
        let sets = vec![
            ChangeSet::new(&s, 1, Changes::new().inc("count", 3), &mut a).unwrap(),
            ChangeSet::new(&s, 2, Changes::new().set("name", "x"), &mut b).unwrap(),
        ];
        let plan = UpdatePlan::compile(&s, &sets).unwrap();
        assert_eq!(plan.set_fields(), vec!["count", "name"]);
        assert!(plan.has_returning());

        let (sql, params) = plan.select_sql(&s, 0..2);
        assert!(sql.contains(
            r#"CASE WHEN _rows."id" = 1 THEN _origin."count" + 3 WHEN _rows."id" IN (2) THEN _origin."count" ELSE _rows."count" END AS "count""#
        ));
        assert!(sql.contains(
            r#"CASE WHEN _rows."id" IN (1) THEN _origin."name" ELSE _rows."name" END AS "name""#
        ));
        assert!(sql.contains("VALUES (?1, NULL, NULL), (?2, NULL, ?3)"));
        assert_eq!(
            params,
            vec![
                StorageValue::Integer(1),
                StorageValue::Integer(2),
                StorageValue::Text("x".into())
            ]
        );
    }

    #[test]
    fn returning_is_decoded_then_assigned_by_change_set() {
        let s = schema();
        let (mut a, mut b) = (Record::new(), Record::new());
        let mut sets = vec![
            ChangeSet::new(&s, 1, Changes::new().set("name", "x"), &mut a).unwrap(),
            ChangeSet::new(&s, 2, Changes::new().inc("count", 3), &mut b).unwrap(),
        ];
        let plan = UpdatePlan::compile(&s, &sets).unwrap();
        assert_eq!(plan.staged_columns(), vec!["id", "name", "count"]);

        let columns = vec!["id".to_string(), "name".to_string(), "count".to_string()];
        let rows = vec![
            Row::new(
                columns.clone(),
                vec![
                    StorageValue::Integer(1),
                    StorageValue::Text("x".into()),
                    StorageValue::Integer(9),
                ],
            ),
            Row::new(
                columns,
                vec![
                    StorageValue::Integer(2),
                    StorageValue::Text("b".into()),
                    StorageValue::Integer(13),
                ],
            ),
        ];
        let decoded = plan.decode_returning(&s, &rows).unwrap();
        assert_eq!(decoded, vec![(1, vec![("count".to_string(), Value::Integer(13))])]);

        UpdatePlan::assign_returning(decoded, &mut sets).unwrap();
        drop(sets);
        assert!(a.is_empty());
        assert_eq!(b.get("count"), Some(&Value::Integer(13)));
    }

    #[test]
    fn undecodable_returning_fails() {
        let s = schema();
        let mut a = Record::new();
        let sets = vec![ChangeSet::new(&s, 1, Changes::new().inc("count", 1), &mut a).unwrap()];
        let plan = UpdatePlan::compile(&s, &sets).unwrap();
        let rows = vec![Row::new(
            vec!["id".to_string(), "count".to_string()],
            vec![StorageValue::Integer(1), StorageValue::Real(2.5)],
        )];
        assert!(matches!(
            plan.decode_returning(&s, &rows),
            Err(OrmError::Decode { .. })
        ));
    }

    #[test]
    fn unset_binds_null() {
        let s = schema();
        let mut a = Record::new();
        let sets = vec![ChangeSet::new(&s, 1, Changes::new().unset("note"), &mut a).unwrap()];
        let plan = UpdatePlan::compile(&s, &sets).unwrap();
        let (_, params) = plan.select_sql(&s, 0..1);
        assert_eq!(params, vec![StorageValue::Integer(1), StorageValue::Null]);
    }

    #[test]
    fn duplicate_primary_keys_are_rejected() {
        let s = schema();
        let (mut a, mut b) = (Record::new(), Record::new());
        let sets = vec![
            ChangeSet::new(&s, 1, Changes::new().inc("count", 1), &mut a).unwrap(),
            ChangeSet::new(&s, 1, Changes::new().inc("count", 1), &mut b).unwrap(),
        ];
        assert!(UpdatePlan::compile(&s, &sets).unwrap_err().is_validation());
    }

    #[test]
    fn empty_deltas_compile_to_noop() {
        let s = schema();
        let mut a = Record::new();
        let sets = vec![ChangeSet::new(&s, 1, Changes::new(), &mut a).unwrap()];
        assert!(UpdatePlan::compile(&s, &sets).unwrap().is_noop());
        assert!(UpdatePlan::compile::<Record>(&s, &[]).unwrap().is_noop());
    }

    #[test]
    fn chunks_respect_parameter_limit() {
        let s = schema();
        let mut items: Vec<Record> = (0..20_000).map(|_| Record::new()).collect();
        let sets: Vec<_> = items
            .iter_mut()
            .enumerate()
            .map(|(i, item)| {
                ChangeSet::new(&s, i as i64, Changes::new().set("count", 1), item).unwrap()
            })
            .collect();
        let plan = UpdatePlan::compile(&s, &sets).unwrap();
        let chunks = plan.chunks();
        assert_eq!(chunks, vec![0..16383, 16383..20_000]);
        for range in chunks {
            let (_, params) = plan.select_sql(&s, range);
            assert!(params.len() <= MAX_BIND_PARAMS);
        }
    }
}
