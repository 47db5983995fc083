//! SELECT builder over one entity table.

use crate::error::{OrmError, OrmResult};
use crate::ident::quote_identifier;
use crate::qb::filter::Filter;
use crate::qb::param::ParamList;
use crate::schema::EntitySchema;

/// SELECT query builder: `SELECT <columns> FROM <table> [WHERE] [ORDER BY] [LIMIT] [OFFSET]`.
#[derive(Clone, Debug)]
pub struct SelectQb<'a> {
    schema: &'a EntitySchema,
    filter: &'a Filter,
    /// Rendered select-list entries (default `*`).
    select_cols: Vec<String>,
}

impl<'a> SelectQb<'a> {
    pub fn new(schema: &'a EntitySchema, filter: &'a Filter) -> Self {
        Self {
            schema,
            filter,
            select_cols: vec!["*".to_string()],
        }
    }

    /// Select these fields, quoted.
    pub fn select_fields(mut self, fields: &[&str]) -> Self {
        self.select_cols = fields.iter().map(|f| quote_identifier(f)).collect();
        self
    }

    /// Select pre-rendered expressions, e.g. `"count" + 1 AS "count"`.
    pub fn select_exprs(mut self, exprs: Vec<String>) -> Self {
        self.select_cols = exprs;
        self
    }

    /// Reject filters that reference fields the schema does not declare.
    pub fn validate(&self) -> OrmResult<()> {
        for column in self.filter.columns() {
            self.schema.require_field(column)?;
        }
        if self.select_cols.is_empty() {
            return Err(OrmError::validation("SELECT requires at least one column"));
        }
        Ok(())
    }

    /// Render the statement, pushing parameters into `params`.
    ///
    /// Sharing `params` lets callers bind placeholders in their own select-list
    /// expressions before the filter's.
    pub fn build(&self, params: &mut ParamList) -> OrmResult<String> {
        self.validate()?;

        let mut sql = format!(
            "SELECT {} FROM {}",
            self.select_cols.join(", "),
            self.schema.table_sql()
        );

        let conditions = self.filter.conditions().build(params);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }

        // Qualified with the table: a bare name would bind to a same-named select-list
        // alias first, which patch uses for post-change values.
        let ordering = self.filter.ordering();
        if !ordering.is_empty() {
            let table = self.schema.table_name_sql();
            let clauses: Vec<String> = ordering
                .iter()
                .map(|(column, order)| {
                    format!("{table}.{} {}", quote_identifier(column), order.as_sql())
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&clauses.join(", "));
        }

        match (self.filter.limit_value(), self.filter.offset_value()) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite only accepts OFFSET after a LIMIT.
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        Ok(sql)
    }

    /// Render the statement with a fresh parameter list.
    pub fn to_sql(&self) -> OrmResult<(String, ParamList)> {
        let mut params = ParamList::new();
        let sql = self.build(&mut params)?;
        Ok((sql, params))
    }
}
