//! Store configuration.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};

use crate::{EventStoreError, Result};

/// Connection and deadline settings for [`SqliteEventStore`](crate::SqliteEventStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite file path or `sqlite:` URL. The file is created if missing.
    pub database_url: String,
    pub max_connections: u32,
    /// How long a statement waits for SQLite's write lock before failing.
    pub busy_timeout: Duration,
    /// Deadline for schema setup at startup.
    pub migrate_timeout: Duration,
    /// Deadline for reads on the request path.
    pub read_timeout: Duration,
    /// Deadline for recording an event on the request path.
    pub write_timeout: Duration,
    /// Deadline for one background aggregation run.
    pub aggregate_timeout: Duration,
}

impl StoreConfig {
    /// Creates a configuration for `database_url` with default limits.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    /// Builds SQLite connect options from the configured URL.
    ///
    /// Plain paths such as `./db.sqlite` are accepted as well as `sqlite:` URLs.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = if self.database_url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(&self.database_url).map_err(EventStoreError::Connect)?
        } else {
            SqliteConnectOptions::new().filename(&self.database_url)
        };

        Ok(options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "./db.sqlite".to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            migrate_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
            aggregate_timeout: Duration::from_secs(30),
        }
    }
}
