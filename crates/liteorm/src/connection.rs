//! Statement execution facade.
//!
//! [`SqlConnection`] is the narrow surface the staging compiler and resolvers need:
//! run a script, run one parameterized statement, read the affected-row count, and read
//! rows back. [`Session`] implements it over the pooled SQLite handle while a
//! transaction is open.

use crate::error::{OrmError, OrmResult};
use crate::value::StorageValue;
use rusqlite::params_from_iter;
use std::cell::Cell;

/// A loosely typed result row: column names with their storage values, in select order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<StorageValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<StorageValue>) -> Self {
        Self { columns, values }
    }

    /// Value of `column`, if the row has it.
    pub fn get(&self, column: &str) -> Option<&StorageValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Value of `column`, or a decode error naming it.
    pub fn try_get(&self, column: &str) -> OrmResult<&StorageValue> {
        self.get(column)
            .ok_or_else(|| OrmError::decode(column, "column missing from result row"))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StorageValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// The statement primitives the compiler and resolvers execute through.
pub trait SqlConnection {
    /// Run a multi-statement script without parameters.
    fn exec(&self, sql: &str) -> OrmResult<()>;

    /// Run one statement with bound parameters; returns the affected-row count.
    fn run(&self, sql: &str, params: &[StorageValue]) -> OrmResult<usize>;

    /// Rows affected by the most recent [`SqlConnection::run`] or [`SqlConnection::exec`].
    fn changes(&self) -> u64;

    /// Run a query and collect every row.
    fn query_all(&self, sql: &str, params: &[StorageValue]) -> OrmResult<Vec<Row>>;

    /// Run a query that must produce a row.
    ///
    /// Semantics:
    /// - 0 rows: returns [`OrmError::NotFound`]
    /// - 1 or more rows: returns the first row
    fn query_single(&self, sql: &str, params: &[StorageValue]) -> OrmResult<Row> {
        self.query_all(sql, params)?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found(format!("expected a row from: {sql}")))
    }
}

/// A connection borrowed for the duration of one transaction.
pub struct Session<'t> {
    conn: &'t rusqlite::Connection,
    changes: Cell<u64>,
    max_sql_log_length: Option<usize>,
}

impl<'t> Session<'t> {
    pub(crate) fn new(conn: &'t rusqlite::Connection, max_sql_log_length: Option<usize>) -> Self {
        Self {
            conn,
            changes: Cell::new(0),
            max_sql_log_length,
        }
    }

    fn observe<T>(&self, sql: &str, f: impl FnOnce() -> rusqlite::Result<T>) -> OrmResult<T> {
        tracing::debug!(
            target: "liteorm.sql",
            sql = %truncate_sql(sql, self.max_sql_log_length),
            "executing"
        );
        f().map_err(|e| {
            tracing::warn!(target: "liteorm.sql", error = %e, sql = %sql, "statement failed");
            OrmError::from_db_error(e)
        })
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("changes", &self.changes.get())
            .finish_non_exhaustive()
    }
}

impl SqlConnection for Session<'_> {
    fn exec(&self, sql: &str) -> OrmResult<()> {
        self.observe(sql, || self.conn.execute_batch(sql))?;
        self.changes.set(self.conn.changes());
        Ok(())
    }

    fn run(&self, sql: &str, params: &[StorageValue]) -> OrmResult<usize> {
        let affected = self.observe(sql, || {
            let mut stmt = self.conn.prepare_cached(sql)?;
            stmt.execute(params_from_iter(params.iter()))
        })?;
        self.changes.set(affected as u64);
        Ok(affected)
    }

    fn changes(&self) -> u64 {
        self.changes.get()
    }

    fn query_all(&self, sql: &str, params: &[StorageValue]) -> OrmResult<Vec<Row>> {
        self.observe(sql, || {
            let mut stmt = self.conn.prepare_cached(sql)?;
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            let mut columns: Option<Vec<String>> = None;
            while let Some(row) = rows.next()? {
                // Names are taken after the first step: a cached statement re-prepared
                // against a changed schema reports its new shape only then.
                let columns = columns.get_or_insert_with(|| {
                    let statement: &rusqlite::Statement<'_> = row.as_ref();
                    statement.column_names().into_iter().map(String::from).collect()
                });
                let values = (0..columns.len())
                    .map(|i| row.get::<_, StorageValue>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                out.push(Row::new(columns.clone(), values));
            }
            Ok(out)
        })
    }
}

fn truncate_sql(sql: &str, max_bytes: Option<usize>) -> std::borrow::Cow<'_, str> {
    match max_bytes {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while end > 0 && !sql.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &sql[..end]).into()
        }
        _ => sql.into(),
    }
}
