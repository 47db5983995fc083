use crate::error::OrmResult;
use crate::ident::Ident;
use std::time::Duration;

/// Default name of the connection-local staging table.
pub const DEFAULT_STAGING_TABLE: &str = "_liteorm_staging";

/// Configuration for [`crate::SqliteAdapter`].
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Whether to run `PRAGMA foreign_keys = ON` after opening.
    pub foreign_keys: bool,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Option<Duration>,
    /// Maximum SQL length written to `liteorm.sql` debug events (`None` logs it whole).
    pub max_sql_log_length: Option<usize>,
    /// Name of the temporary staging table.
    pub staging_table: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            foreign_keys: true,
            busy_timeout: None,
            max_sql_log_length: Some(200),
            staging_table: DEFAULT_STAGING_TABLE.to_string(),
        }
    }
}

impl AdapterConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Set the maximum SQL length in log events.
    pub fn max_sql_log_length(mut self, len: Option<usize>) -> Self {
        self.max_sql_log_length = len;
        self
    }

    /// Use a different staging table name.
    pub fn staging_table(mut self, name: impl Into<String>) -> Self {
        self.staging_table = name.into();
        self
    }

    /// Check values that can only be validated as a whole.
    pub fn validate(&self) -> OrmResult<()> {
        let ident = Ident::parse(&self.staging_table)?;
        if ident.parts().len() != 1 {
            return Err(crate::OrmError::validation(format!(
                "staging table '{}' must not be schema-qualified",
                self.staging_table
            )));
        }
        Ok(())
    }
}
