//! Projection error types.

use thiserror::Error;

/// Errors that can occur during aggregation.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// The aggregation worker has exited and accepts no more requests.
    #[error("Aggregation worker stopped")]
    WorkerStopped,
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
