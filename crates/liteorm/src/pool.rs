//! Connection pool for the embedded store.
//!
//! SQLite is embedded and a single handle serializes its own writes, so the pool owns
//! exactly one [`rusqlite::Connection`]. What it adds is accounting: every
//! [`ConnectionPool::get`] bumps an active counter that [`PooledConnection::release`]
//! (or dropping the handle) brings back down, and the store can only be closed once
//! that counter is zero.
//!
//! # Example
//!
//! ```ignore
//! let pool = liteorm::create_pool("app.db")?;
//! let conn = pool.get()?;
//! let n = conn.transaction(|session| session.run("DELETE FROM logs", &[]))?;
//! conn.release();
//! ```

use crate::config::AdapterConfig;
use crate::connection::Session;
use crate::error::{OrmError, OrmResult};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Open a pool over the database at `path` with default settings.
///
/// `":memory:"` opens a private in-memory database.
pub fn create_pool(path: impl AsRef<Path>) -> OrmResult<ConnectionPool> {
    create_pool_with_config(path, &AdapterConfig::default())
}

/// Open a pool over the database at `path`.
pub fn create_pool_with_config(
    path: impl AsRef<Path>,
    config: &AdapterConfig,
) -> OrmResult<ConnectionPool> {
    let path = path.as_ref();
    let conn = Connection::open(path)
        .map_err(|e| OrmError::Connection(format!("{}: {e}", path.display())))?;
    ConnectionPool::from_connection(conn, config)
}

/// Shared handle to the pooled store.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    db: Mutex<Option<Connection>>,
    active: AtomicUsize,
    max_sql_log_length: Option<usize>,
}

impl ConnectionPool {
    /// Wrap an already-open connection, applying the connection-level settings of `config`.
    pub fn from_connection(conn: Connection, config: &AdapterConfig) -> OrmResult<Self> {
        if config.foreign_keys {
            conn.pragma_update(None, "foreign_keys", true)
                .map_err(|e| OrmError::Connection(format!("enabling foreign keys: {e}")))?;
        }
        if let Some(timeout) = config.busy_timeout {
            conn.busy_timeout(timeout)
                .map_err(|e| OrmError::Connection(format!("setting busy timeout: {e}")))?;
        }
        Ok(Self {
            inner: Arc::new(PoolInner {
                db: Mutex::new(Some(conn)),
                active: AtomicUsize::new(0),
                max_sql_log_length: config.max_sql_log_length,
            }),
        })
    }

    /// Acquire a connection.
    pub fn get(&self) -> OrmResult<PooledConnection> {
        if self.is_closed() {
            return Err(OrmError::Pool("pool is closed".to_string()));
        }
        let active = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(target: "liteorm.pool", active, "connection acquired");
        Ok(PooledConnection {
            inner: Arc::clone(&self.inner),
            released: false,
        })
    }

    /// Number of acquired, not yet released connections.
    pub fn active_connections(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.db.lock().is_none()
    }

    /// Close the underlying handle. Callers check [`ConnectionPool::active_connections`] first.
    pub(crate) fn close(&self) -> OrmResult<()> {
        let Some(conn) = self.inner.db.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| OrmError::from_db_error(e))
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("active", &self.active_connections())
            .finish_non_exhaustive()
    }
}

/// An acquired connection. Returned to the pool by [`PooledConnection::release`] or on drop.
pub struct PooledConnection {
    inner: Arc<PoolInner>,
    released: bool,
}

impl PooledConnection {
    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// The store handle stays locked for the whole closure; calling back into the
    /// pool's transactions from inside `f` deadlocks.
    pub fn transaction<T>(&self, f: impl FnOnce(&Session<'_>) -> OrmResult<T>) -> OrmResult<T> {
        let mut guard = self.inner.db.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| OrmError::Pool("pool is closed".to_string()))?;
        let tx = conn.transaction().map_err(OrmError::from_db_error)?;

        let result = {
            let session = Session::new(&tx, self.inner.max_sql_log_length);
            f(&session)
        };

        match result {
            Ok(value) => {
                tx.commit().map_err(OrmError::from_db_error)?;
                Ok(value)
            }
            Err(e) => match tx.rollback() {
                Ok(()) => Err(e),
                Err(rb) => Err(OrmError::Other(format!("{e} (rollback failed: {rb})"))),
            },
        }
    }

    /// Return the connection to the pool.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let active = self.inner.active.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::trace!(target: "liteorm.pool", active, "connection released");
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
