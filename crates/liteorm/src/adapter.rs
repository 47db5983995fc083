//! SQLite adapter: opens the store and hands out persistence and query objects.

use crate::config::AdapterConfig;
use crate::connection::SqlConnection;
use crate::error::{OrmError, OrmResult};
use crate::persistence::Persistence;
use crate::pool::{ConnectionPool, create_pool_with_config};
use crate::resolver::QueryResolver;
use crate::schema::EntitySchema;
use crate::staging::StagingTable;
use std::path::Path;

/// Entry point over one SQLite database.
///
/// # Example
/// ```ignore
/// let adapter = SqliteAdapter::open_in_memory()?;
/// adapter.create_table(&counters)?;
///
/// let mut persistence = adapter.persistence()?;
/// persistence.insert(&counters, &mut items)?;
/// persistence.release();
///
/// let result = adapter.query(&counters).patch(&Filter::new(), &Changes::new().inc("count", 1), &[])?;
/// adapter.disconnect()?;
/// ```
#[derive(Debug)]
pub struct SqliteAdapter {
    pool: ConnectionPool,
    config: AdapterConfig,
    staging: StagingTable,
}

impl SqliteAdapter {
    /// Open (or create) the database file at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> OrmResult<Self> {
        Self::open_with_config(path, AdapterConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: AdapterConfig) -> OrmResult<Self> {
        config.validate()?;
        let pool = create_pool_with_config(path, &config)?;
        Self::with_pool(pool, config)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> OrmResult<Self> {
        Self::open_in_memory_with_config(AdapterConfig::default())
    }

    pub fn open_in_memory_with_config(config: AdapterConfig) -> OrmResult<Self> {
        Self::open_with_config(":memory:", config)
    }

    /// Adopt an already-open connection.
    pub fn from_connection(conn: rusqlite::Connection, config: AdapterConfig) -> OrmResult<Self> {
        config.validate()?;
        let pool = ConnectionPool::from_connection(conn, &config)?;
        Self::with_pool(pool, config)
    }

    fn with_pool(pool: ConnectionPool, config: AdapterConfig) -> OrmResult<Self> {
        let staging = StagingTable::new(&config.staging_table)?;
        tracing::debug!(target: "liteorm.pool", staging = %staging.name(), "sqlite adapter opened");
        Ok(Self {
            pool,
            config,
            staging,
        })
    }

    pub fn name(&self) -> &'static str {
        "sqlite"
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// A persistence object holding one acquired connection until released.
    pub fn persistence(&self) -> OrmResult<Persistence> {
        Ok(Persistence::new(self.pool.get()?, self.staging.clone()))
    }

    /// Filter-scoped operations on `schema`'s table.
    pub fn query<'s>(&self, schema: &'s EntitySchema) -> QueryResolver<'s> {
        QueryResolver::new(self.pool.clone(), schema, self.staging.clone())
    }

    /// Run a multi-statement script in one transaction.
    pub fn execute_batch(&self, sql: &str) -> OrmResult<()> {
        let conn = self.pool.get()?;
        let result = conn.transaction(|session| session.exec(sql));
        conn.release();
        result
    }

    /// Create `schema`'s table if it does not exist.
    pub fn create_table(&self, schema: &EntitySchema) -> OrmResult<()> {
        self.execute_batch(&schema.create_table_sql())
    }

    /// Close the database.
    ///
    /// Fails with [`OrmError::ActiveConnections`] while any acquired connection is
    /// unreleased; the store stays open in that case.
    pub fn disconnect(&self) -> OrmResult<()> {
        let active = self.pool.active_connections();
        if active > 0 {
            tracing::error!(target: "liteorm.pool", active, "disconnect refused: connections still active");
            return Err(OrmError::ActiveConnections(active));
        }
        self.pool.close()?;
        tracing::debug!(target: "liteorm.pool", "sqlite adapter closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_staging_name() {
        let config = AdapterConfig::new().staging_table("no spaces");
        assert!(SqliteAdapter::open_in_memory_with_config(config).is_err());
    }

    #[test]
    fn disconnect_waits_for_release() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        assert_eq!(adapter.name(), "sqlite");
        let persistence = adapter.persistence().unwrap();
        assert!(matches!(
            adapter.disconnect(),
            Err(OrmError::ActiveConnections(1))
        ));
        assert!(!adapter.pool().is_closed());
        persistence.release();
        adapter.disconnect().unwrap();
        assert!(adapter.pool().is_closed());
        assert!(adapter.persistence().is_err());
    }
}
