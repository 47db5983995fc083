//! # liteorm
//!
//! Batch change-set compilation for SQLite.
//!
//! SQLite runs one statement per call and has no "bulk update with per-row values"
//! primitive. liteorm encodes a list of heterogeneous per-row updates (different rows
//! setting different columns, some rows incrementing columns server-side) into a single
//! staged statement: the per-row values go into a temporary staging table that is joined
//! back to the origin table, and server-computed values are recovered with one read.
//!
//! ## Features
//!
//! - **Batched updates**: `$set`, `$inc` and `$unset` deltas for many rows in one `UPDATE ... FROM`
//! - **Query-scoped patch/delete**: mutate whatever a [`Filter`] selects and learn which keys were hit
//! - **Auto-increment reconciliation**: generated keys assigned back after multi-row inserts
//! - **Transactional**: every compiled script commits or rolls back as a whole
//! - **Leak detection**: [`SqliteAdapter::disconnect`] refuses to close while connections are out
//!
//! ## Usage
//!
//! ```ignore
//! use liteorm::prelude::*;
//!
//! let counters = EntitySchema::builder("counters")
//!     .primary_key("id", FieldKind::Integer)
//!     .auto_increment()
//!     .field("count", FieldKind::Integer)
//!     .build()?;
//!
//! let adapter = SqliteAdapter::open_in_memory()?;
//! adapter.create_table(&counters)?;
//!
//! let mut persistence = adapter.persistence()?;
//! persistence.insert(&counters, &mut items)?;
//!
//! let (first, second) = items.split_at_mut(1);
//! let mut change_sets = vec![
//!     ChangeSet::new(&counters, 1, Changes::new().inc("count", 3), &mut first[0])?,
//!     ChangeSet::new(&counters, 2, Changes::new().set("count", 0), &mut second[0])?,
//! ];
//! persistence.update(&counters, &mut change_sets)?;
//! persistence.release();
//!
//! let deleted = adapter.query(&counters).delete(&Filter::new().eq("count", 0))?;
//! adapter.disconnect()?;
//! ```
//!
//! ## Logging
//!
//! Events are emitted with `tracing` under the targets `liteorm.sql` (statements),
//! `liteorm.staging` (staging table lifecycle) and `liteorm.pool` (connection accounting).

pub mod adapter;
pub mod changeset;
pub mod compiler;
pub mod config;
pub mod connection;
pub mod error;
pub mod ident;
pub mod persistence;
pub mod pool;
pub mod prelude;
pub mod qb;
pub mod quote;
pub mod resolver;
pub mod schema;
pub mod serialize;
pub mod staging;
pub mod value;

pub use adapter::SqliteAdapter;
pub use changeset::{Change, ChangeSet, Changes};
pub use compiler::UpdatePlan;
pub use config::AdapterConfig;
pub use connection::{Row, Session, SqlConnection};
pub use error::{OrmError, OrmResult};
pub use ident::{Ident, IdentPart, quote_identifier};
pub use persistence::Persistence;
pub use pool::{ConnectionPool, PooledConnection, create_pool, create_pool_with_config};
pub use qb::{Expr, ExprGroup, Filter, Order, SelectQb};
pub use quote::quote_value;
pub use resolver::{DeleteResult, PatchResult, QueryResolver, Record};
pub use schema::{Entity, EntitySchema, EntitySchemaBuilder, FieldKind, FieldSchema};
pub use staging::StagingTable;
pub use value::{StorageValue, Value};
