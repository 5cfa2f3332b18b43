use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when interacting with the store.
///
/// Variants follow the step that failed, so a log line says whether the
/// connection, the transaction or the statement was at fault. None of them
/// are retried.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The database file could not be opened or the pool could not be built.
    #[error("failed to open database: {0}")]
    Connect(#[source] sqlx::Error),

    /// No connection could be taken from the pool.
    #[error("failed to acquire connection: {0}")]
    Acquire(#[source] sqlx::Error),

    /// The transaction could not be started.
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    /// A statement inside the transaction failed.
    #[error("statement failed: {0}")]
    Execute(#[source] sqlx::Error),

    /// The transaction could not be committed.
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// The sum of the event log does not fit in an `i64`.
    #[error("aggregate total overflows i64")]
    Overflow,

    /// The operation did not finish before its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl EventStoreError {
    /// Returns true if the operation was abandoned at its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EventStoreError::Timeout { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
