use async_trait::async_trait;

use crate::{AggregateSnapshot, CounterEvent, LatestAggregate, Result};

/// Core trait for counter stores.
///
/// Each method opens its own connection and transaction and releases both on
/// every exit path. Implementations must be thread-safe (Send + Sync) since a
/// single handle is shared by every request and the aggregation worker.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Creates the event and aggregate tables if they do not exist.
    ///
    /// Idempotent. Either every table exists afterwards or none was created.
    async fn ensure_schema(&self) -> Result<()>;

    /// Appends one event with the given quantity and the current time.
    ///
    /// On error nothing is written.
    async fn record_event(&self, count: i64) -> Result<CounterEvent>;

    /// Sums every recorded event and appends the total as a new snapshot.
    ///
    /// The scan and the insert share one transaction; events committed after
    /// it began are not included. On error no snapshot is written.
    async fn compute_aggregate(&self) -> Result<AggregateSnapshot>;

    /// Returns the snapshot with the greatest `created_at`, if any.
    async fn latest_aggregate(&self) -> Result<Option<AggregateSnapshot>>;

    /// Returns the number of recorded events.
    async fn event_count(&self) -> Result<i64>;

    /// Returns the number of snapshots written so far.
    async fn snapshot_count(&self) -> Result<i64>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Records a single increment.
    async fn record_increment(&self) -> Result<CounterEvent> {
        self.record_event(1).await
    }

    /// Reads the latest aggregate, falling back to the zero state when no
    /// aggregation has completed yet.
    async fn get_latest_aggregate(&self) -> Result<LatestAggregate> {
        Ok(LatestAggregate::from_option(self.latest_aggregate().await?))
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for std::sync::Arc<T> {
    async fn ensure_schema(&self) -> Result<()> {
        (**self).ensure_schema().await
    }

    async fn record_event(&self, count: i64) -> Result<CounterEvent> {
        (**self).record_event(count).await
    }

    async fn compute_aggregate(&self) -> Result<AggregateSnapshot> {
        (**self).compute_aggregate().await
    }

    async fn latest_aggregate(&self) -> Result<Option<AggregateSnapshot>> {
        (**self).latest_aggregate().await
    }

    async fn event_count(&self) -> Result<i64> {
        (**self).event_count().await
    }

    async fn snapshot_count(&self) -> Result<i64> {
        (**self).snapshot_count().await
    }
}
