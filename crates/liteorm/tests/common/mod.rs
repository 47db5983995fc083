#![allow(dead_code)]

use liteorm::{Entity, EntitySchema, FieldKind, OrmError, OrmResult, SqliteAdapter, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub id: Option<i64>,
    pub name: String,
    pub count: i64,
    pub note: Option<String>,
}

impl Counter {
    pub fn new(name: &str, count: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            count,
            note: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id.expect("counter has been inserted")
    }
}

impl Entity for Counter {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "count" => Some(self.count.into()),
            "note" => Some(self.note.clone().into()),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> OrmResult<()> {
        let mismatch = || OrmError::decode(name, format!("unexpected {}", value.type_name()));
        match name {
            "id" => self.id = Some(value.as_i64().ok_or_else(mismatch)?),
            "count" => self.count = value.as_i64().ok_or_else(mismatch)?,
            "name" => self.name = value.as_str().ok_or_else(mismatch)?.to_string(),
            "note" => self.note = value.as_str().map(str::to_string),
            _ => return Err(OrmError::validation(format!("unknown field '{name}'"))),
        }
        Ok(())
    }
}

pub fn counter_schema() -> EntitySchema {
    EntitySchema::builder("counters")
        .primary_key("id", FieldKind::Integer)
        .auto_increment()
        .field("name", FieldKind::Text)
        .field("count", FieldKind::Integer)
        .nullable_field("note", FieldKind::Text)
        .build()
        .expect("valid schema")
}

/// An in-memory adapter with the counters table and `counters` inserted.
pub fn setup(counters: &mut [Counter]) -> (SqliteAdapter, EntitySchema) {
    let adapter = SqliteAdapter::open_in_memory().expect("open in-memory store");
    let schema = counter_schema();
    adapter.create_table(&schema).expect("create table");
    if !counters.is_empty() {
        let mut persistence = adapter.persistence().expect("acquire");
        persistence.insert(&schema, counters).expect("insert");
        persistence.release();
    }
    (adapter, schema)
}

/// Current `count` of every row, ordered by key.
pub fn counts(adapter: &SqliteAdapter, schema: &EntitySchema) -> Vec<(i64, i64)> {
    adapter
        .query(schema)
        .find(&liteorm::Filter::new().order_by_asc("id"))
        .expect("find")
        .into_iter()
        .map(|record| {
            (
                record["id"].as_i64().expect("id"),
                record["count"].as_i64().expect("count"),
            )
        })
        .collect()
}
