//! Entity metadata: table identifier, fields, primary key.
//!
//! # Example
//! ```ignore
//! use liteorm::{EntitySchema, FieldKind};
//!
//! let counters = EntitySchema::builder("counters")
//!     .primary_key("id", FieldKind::Integer)
//!     .auto_increment()
//!     .field("name", FieldKind::Text)
//!     .field("count", FieldKind::Integer)
//!     .nullable_field("note", FieldKind::Text)
//!     .build()?;
//! ```

use crate::error::{OrmError, OrmResult};
use crate::ident::{Ident, quote_identifier};
use crate::value::Value;
use std::collections::BTreeMap;

/// Declared kind of a field; drives storage conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
    /// Stored as `0`/`1`.
    Bool,
    Blob,
    /// Stored as JSON text.
    Json,
    /// Stored as RFC 3339 UTC text.
    Timestamp,
    /// Stored as hyphenated text.
    Uuid,
}

impl FieldKind {
    /// Column type used by [`EntitySchema::create_table_sql`].
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Integer | FieldKind::Bool => "INTEGER",
            FieldKind::Real => "REAL",
            FieldKind::Blob => "BLOB",
            FieldKind::Text | FieldKind::Json | FieldKind::Timestamp | FieldKind::Uuid => "TEXT",
        }
    }

    /// Whether `$inc` is meaningful for this kind.
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Real)
    }
}

/// One column of an entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    name: String,
    kind: FieldKind,
    nullable: bool,
}

impl FieldSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The column name, quoted.
    pub fn column_sql(&self) -> String {
        quote_identifier(&self.name)
    }
}

/// Table-level metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    table: Ident,
    fields: Vec<FieldSchema>,
    primary_key: usize,
    auto_increment: bool,
}

impl EntitySchema {
    pub fn builder(table: &str) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            table: table.to_string(),
            fields: Vec::new(),
            primary_key: None,
            auto_increment: false,
        }
    }

    pub fn table(&self) -> &Ident {
        &self.table
    }

    /// Fully quoted table reference, e.g. `"main"."users"`.
    pub fn table_sql(&self) -> String {
        self.table.to_quoted_sql()
    }

    /// Quoted unqualified table name, used to qualify origin columns.
    pub fn table_name_sql(&self) -> String {
        quote_identifier(self.table.name())
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field or fail with a validation error naming the table.
    pub fn require_field(&self, name: &str) -> OrmResult<&FieldSchema> {
        self.field(name).ok_or_else(|| {
            OrmError::validation(format!(
                "unknown field '{}' on '{}'",
                name,
                self.table.name()
            ))
        })
    }

    pub fn primary_key(&self) -> &FieldSchema {
        &self.fields[self.primary_key]
    }

    /// The auto-increment field, if the primary key is one.
    pub fn auto_increment_field(&self) -> Option<&FieldSchema> {
        self.auto_increment.then(|| self.primary_key())
    }

    /// `CREATE TABLE IF NOT EXISTS` statement matching this schema.
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let mut col = format!("{} {}", f.column_sql(), f.kind.sql_type());
                if i == self.primary_key {
                    col.push_str(" PRIMARY KEY");
                    if self.auto_increment {
                        col.push_str(" AUTOINCREMENT");
                    }
                }
                if !f.nullable {
                    col.push_str(" NOT NULL");
                }
                col
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table_sql(),
            columns.join(", ")
        )
    }
}

/// Builder for [`EntitySchema`]. Validation happens in [`EntitySchemaBuilder::build`].
#[must_use]
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    table: String,
    fields: Vec<FieldSchema>,
    primary_key: Option<usize>,
    auto_increment: bool,
}

impl EntitySchemaBuilder {
    /// Declare the primary key field.
    pub fn primary_key(mut self, name: &str, kind: FieldKind) -> Self {
        self.primary_key = Some(self.fields.len());
        self.fields.push(FieldSchema {
            name: name.to_string(),
            kind,
            nullable: false,
        });
        self
    }

    /// Mark the primary key as store-generated.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Declare a `NOT NULL` field.
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSchema {
            name: name.to_string(),
            kind,
            nullable: false,
        });
        self
    }

    /// Declare a nullable field.
    pub fn nullable_field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSchema {
            name: name.to_string(),
            kind,
            nullable: true,
        });
        self
    }

    pub fn build(self) -> OrmResult<EntitySchema> {
        let table = Ident::parse(&self.table)?;

        for (i, field) in self.fields.iter().enumerate() {
            Ident::quoted(&field.name)?;
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(OrmError::validation(format!(
                    "duplicate field '{}' on '{}'",
                    field.name,
                    table.name()
                )));
            }
        }

        let primary_key = self.primary_key.ok_or_else(|| {
            OrmError::validation(format!("'{}' has no primary key", table.name()))
        })?;
        if self.auto_increment && self.fields[primary_key].kind != FieldKind::Integer {
            return Err(OrmError::validation(format!(
                "auto-increment primary key '{}' must be an Integer field",
                self.fields[primary_key].name
            )));
        }

        Ok(EntitySchema {
            table,
            fields: self.fields,
            primary_key,
            auto_increment: self.auto_increment,
        })
    }
}

/// An in-memory object the ORM can read fields from and write server-computed values into.
pub trait Entity {
    /// Current value of `name`, or `None` if the entity has no such field.
    fn field(&self, name: &str) -> Option<Value>;

    /// Overwrite `name` with a value read back from the store.
    fn set_field(&mut self, name: &str, value: Value) -> OrmResult<()>;
}

/// Loosely typed records.
impl Entity for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) -> OrmResult<()> {
        self.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters() -> EntitySchema {
        EntitySchema::builder("counters")
            .primary_key("id", FieldKind::Integer)
            .auto_increment()
            .field("name", FieldKind::Text)
            .field("count", FieldKind::Integer)
            .nullable_field("note", FieldKind::Text)
            .build()
            .unwrap()
    }

    #[test]
    fn builds_and_looks_up_fields() {
        let schema = counters();
        assert_eq!(schema.primary_key().name(), "id");
        assert_eq!(schema.auto_increment_field().map(|f| f.name()), Some("id"));
        assert_eq!(schema.field("count").unwrap().kind(), FieldKind::Integer);
        assert!(schema.field("note").unwrap().is_nullable());
        assert!(schema.require_field("missing").is_err());
        assert_eq!(schema.table_sql(), r#""counters""#);
    }

    #[test]
    fn create_table_sql() {
        assert_eq!(
            counters().create_table_sql(),
            r#"CREATE TABLE IF NOT EXISTS "counters" ("id" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, "name" TEXT NOT NULL, "count" INTEGER NOT NULL, "note" TEXT)"#
        );
    }

    #[test]
    fn rejects_invalid_schemas() {
        assert!(EntitySchema::builder("t").field("a", FieldKind::Text).build().is_err());
        assert!(
            EntitySchema::builder("t")
                .primary_key("id", FieldKind::Text)
                .auto_increment()
                .build()
                .is_err()
        );
        assert!(
            EntitySchema::builder("t")
                .primary_key("id", FieldKind::Integer)
                .field("a", FieldKind::Text)
                .field("a", FieldKind::Text)
                .build()
                .is_err()
        );
        assert!(EntitySchema::builder("bad table").primary_key("id", FieldKind::Integer).build().is_err());
    }

    #[test]
    fn map_records_are_entities() {
        let mut record = BTreeMap::new();
        record.set_field("count", Value::Integer(3)).unwrap();
        assert_eq!(record.field("count"), Some(Value::Integer(3)));
        assert_eq!(record.field("missing"), None);
    }
}
