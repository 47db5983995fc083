//! Change descriptors: `$set`, `$inc` and `$unset` deltas keyed by field name.
//!
//! # Example
//! ```ignore
//! use liteorm::{ChangeSet, Changes};
//!
//! let changes = Changes::new().inc("count", 3).set("name", "renamed");
//! let change_set = ChangeSet::new(&schema, 1, changes, &mut counter)?;
//! ```

use crate::error::{OrmError, OrmResult};
use crate::schema::{Entity, EntitySchema};
use crate::serialize::to_storage;
use crate::value::Value;

/// One delta applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Assign a literal value.
    Set(Value),
    /// Add to the stored value, server-side.
    Inc(Value),
    /// Clear the value (store `NULL`).
    Unset,
}

/// An ordered, per-field set of deltas.
///
/// A later call for the same field replaces the earlier one.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    entries: Vec<(String, Change)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Change::Set(value.into()))
    }

    pub fn inc(self, field: &str, amount: impl Into<Value>) -> Self {
        self.with(field, Change::Inc(amount.into()))
    }

    pub fn unset(self, field: &str) -> Self {
        self.with(field, Change::Unset)
    }

    fn with(mut self, field: &str, change: Change) -> Self {
        match self.entries.iter_mut().find(|(name, _)| name == field) {
            Some(entry) => entry.1 = change,
            None => self.entries.push((field.to_string(), change)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.entries.iter().map(|(name, change)| (name.as_str(), change))
    }

    pub fn get(&self, field: &str) -> Option<&Change> {
        self.iter().find(|(name, _)| *name == field).map(|(_, c)| c)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check every delta against the schema.
    pub fn validate(&self, schema: &EntitySchema) -> OrmResult<()> {
        let pk = schema.primary_key().name();
        for (name, change) in self.iter() {
            let field = schema.require_field(name)?;
            if name == pk {
                return Err(OrmError::validation(format!(
                    "primary key '{pk}' cannot be changed"
                )));
            }
            match change {
                Change::Set(value) => {
                    to_storage(field, value)?;
                }
                Change::Inc(amount) => {
                    if !field.kind().is_numeric() {
                        return Err(OrmError::validation(format!(
                            "cannot increment non-numeric field '{name}'"
                        )));
                    }
                    if amount.is_null() {
                        return Err(OrmError::validation(format!(
                            "increment for '{name}' is null"
                        )));
                    }
                    to_storage(field, amount)?;
                }
                Change::Unset => {
                    if !field.is_nullable() {
                        return Err(OrmError::validation(format!(
                            "cannot unset non-nullable field '{name}'"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// One entity's pending mutation: its primary key, its deltas, and the in-memory
/// object that receives server-computed values afterwards.
#[derive(Debug)]
pub struct ChangeSet<'a, T: Entity + ?Sized> {
    primary_key: Value,
    changes: Changes,
    item: &'a mut T,
}

impl<'a, T: Entity + ?Sized> ChangeSet<'a, T> {
    /// Build a change set, validating the deltas against `schema`.
    pub fn new(
        schema: &EntitySchema,
        primary_key: impl Into<Value>,
        changes: Changes,
        item: &'a mut T,
    ) -> OrmResult<Self> {
        let primary_key = primary_key.into();
        if primary_key.is_null() {
            return Err(OrmError::validation("change set primary key is null"));
        }
        to_storage(schema.primary_key(), &primary_key)?;
        changes.validate(schema)?;
        Ok(Self {
            primary_key,
            changes,
            item,
        })
    }

    /// Build a change set keyed by the item's own primary key field.
    pub fn from_item(schema: &EntitySchema, changes: Changes, item: &'a mut T) -> OrmResult<Self> {
        let pk = item.field(schema.primary_key().name()).unwrap_or(Value::Null);
        Self::new(schema, pk, changes, item)
    }

    pub fn primary_key(&self) -> &Value {
        &self.primary_key
    }

    pub fn changes(&self) -> &Changes {
        &self.changes
    }

    pub(crate) fn item_mut(&mut self) -> &mut T {
        &mut *self.item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;
    use std::collections::BTreeMap;

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
    fn later_delta_replaces_earlier() {
        let changes = Changes::new().inc("count", 1).set("count", 7);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("count"), Some(&Change::Set(Value::Integer(7))));
    }

    #[test]
    fn validation_rules() {
        let s = schema();
        assert!(Changes::new().inc("count", 2).unset("note").validate(&s).is_ok());
        assert!(Changes::new().set("missing", 1).validate(&s).is_err());
        assert!(Changes::new().set("id", 2).validate(&s).is_err());
        assert!(Changes::new().inc("name", 1).validate(&s).is_err());
        assert!(Changes::new().unset("count").validate(&s).is_err());
        assert!(Changes::new().set("count", "ten").validate(&s).is_err());
        assert!(Changes::new().inc("count", 1.5).validate(&s).is_err());
    }

    #[test]
    fn change_set_from_item_uses_primary_key_field() {
        let s = schema();
        let mut item: BTreeMap<String, Value> = BTreeMap::new();
        assert!(ChangeSet::from_item(&s, Changes::new(), &mut item).is_err());

        item.insert("id".into(), Value::Integer(4));
        let cs = ChangeSet::from_item(&s, Changes::new().inc("count", 1), &mut item).unwrap();
        assert_eq!(cs.primary_key(), &Value::Integer(4));
    }
}
