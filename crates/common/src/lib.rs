//! Data model shared by the store, the aggregation worker and the HTTP layer.

pub mod types;

pub use types::{AggregateSnapshot, CounterEvent, LatestAggregate};
