//! Connection-local staging table shared by batched updates, patches and deletes.
//!
//! Every use follows the same shape: drop any leftover copy, materialize a `SELECT` into
//! a temporary table, mutate the origin table by joining against it, read it back, and
//! drop it again. All of it runs inside the caller's transaction, so a failure rolls the
//! temporary table away together with the origin changes.

use crate::connection::{Row, SqlConnection};
use crate::error::{OrmError, OrmResult};
use crate::ident::{Ident, quote_identifier};
use crate::schema::EntitySchema;
use crate::value::StorageValue;

/// Alias the staging table is joined under.
const STAGED: &str = "_staged";

/// The temporary table used to batch per-row values into one join-based statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTable {
    name: String,
}

impl StagingTable {
    /// Use `name` (unqualified) in the `temp` schema.
    pub fn new(name: &str) -> OrmResult<Self> {
        let ident = Ident::parse(name)?;
        if ident.parts().len() != 1 {
            return Err(OrmError::validation(format!(
                "staging table '{name}' must not be schema-qualified"
            )));
        }
        Ok(Self {
            name: ident.name().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `temp."<name>"`
    pub fn table_sql(&self) -> String {
        format!("temp.{}", quote_identifier(&self.name))
    }

    /// Drop any leftover copy, then materialize `select_sql` as the staging table.
    ///
    /// Returns the number of staged rows.
    pub fn create(
        &self,
        conn: &impl SqlConnection,
        select_sql: &str,
        params: &[StorageValue],
    ) -> OrmResult<u64> {
        self.discard(conn)?;
        conn.run(
            &format!(
                "CREATE TEMPORARY TABLE {} AS {select_sql}",
                quote_identifier(&self.name)
            ),
            params,
        )?;
        let staged = self.count(conn)?;
        tracing::trace!(target: "liteorm.staging", table = %self.name, staged, "staging table created");
        Ok(staged)
    }

    /// Append more rows to an existing staging table. Column order must match the
    /// statement that created it.
    pub fn append(
        &self,
        conn: &impl SqlConnection,
        select_sql: &str,
        params: &[StorageValue],
    ) -> OrmResult<usize> {
        let n = conn.run(
            &format!("INSERT INTO {} {select_sql}", self.table_sql()),
            params,
        )?;
        tracing::trace!(target: "liteorm.staging", table = %self.name, appended = n, "staging rows appended");
        Ok(n)
    }

    /// `UPDATE origin SET f = staged.f, ... FROM staging WHERE origin.pk = staged.pk`
    pub fn update_origin_sql(&self, schema: &EntitySchema, fields: &[&str]) -> String {
        let pk = schema.primary_key().column_sql();
        let assignments: Vec<String> = fields
            .iter()
            .map(|f| {
                let col = quote_identifier(f);
                format!("{col} = {STAGED}.{col}")
            })
            .collect();
        format!(
            "UPDATE {} SET {} FROM {} AS {STAGED} WHERE {}.{pk} = {STAGED}.{pk}",
            schema.table_sql(),
            assignments.join(", "),
            self.table_sql(),
            schema.table_name_sql(),
        )
    }

    /// `DELETE FROM origin WHERE pk IN (SELECT pk FROM staging)`
    pub fn delete_origin_sql(&self, schema: &EntitySchema) -> String {
        let pk = schema.primary_key().column_sql();
        format!(
            "DELETE FROM {} WHERE {pk} IN (SELECT {pk} FROM {})",
            schema.table_sql(),
            self.table_sql()
        )
    }

    /// Run the origin update; returns the affected-row count.
    pub fn apply_update(
        &self,
        conn: &impl SqlConnection,
        schema: &EntitySchema,
        fields: &[&str],
    ) -> OrmResult<u64> {
        conn.run(&self.update_origin_sql(schema, fields), &[])?;
        Ok(conn.changes())
    }

    /// Run the origin delete; returns the affected-row count.
    pub fn apply_delete(&self, conn: &impl SqlConnection, schema: &EntitySchema) -> OrmResult<u64> {
        conn.run(&self.delete_origin_sql(schema), &[])?;
        Ok(conn.changes())
    }

    /// `columns` of every staged row, in insertion order.
    ///
    /// The column list is explicit: the table is rebuilt with a different shape on every
    /// use, and the statement text must change with it.
    pub fn read_back(&self, conn: &impl SqlConnection, columns: &[&str]) -> OrmResult<Vec<Row>> {
        conn.query_all(&self.read_back_sql(columns), &[])
    }

    pub fn read_back_sql(&self, columns: &[&str]) -> String {
        let columns: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns.join(", "),
            self.table_sql()
        )
    }

    fn count(&self, conn: &impl SqlConnection) -> OrmResult<u64> {
        let row = conn.query_single(
            &format!("SELECT COUNT(*) AS n FROM {}", self.table_sql()),
            &[],
        )?;
        match row.try_get("n")? {
            StorageValue::Integer(n) => Ok(*n as u64),
            other => Err(OrmError::decode("n", format!("expected integer, got {other:?}"))),
        }
    }

    /// Drop the staging table if it exists.
    pub fn discard(&self, conn: &impl SqlConnection) -> OrmResult<()> {
        conn.exec(&format!("DROP TABLE IF EXISTS {};", self.table_sql()))?;
        tracing::trace!(target: "liteorm.staging", table = %self.name, "staging table dropped");
        Ok(())
    }
}
