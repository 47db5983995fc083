//! Convenient imports for typical `liteorm` usage.
//!
//! ```ignore
//! use liteorm::prelude::*;
//! ```

pub use crate::{
    AdapterConfig, Change, ChangeSet, Changes, DeleteResult, Entity, EntitySchema, Expr,
    FieldKind, Filter, OrmError, OrmResult, PatchResult, Persistence, QueryResolver, Record,
    SqliteAdapter, Value,
};
