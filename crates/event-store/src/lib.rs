//! Persistence for the counter service.
//!
//! Two append-only tables live in one SQLite file: `counter`, the raw event
//! log, and `counter_aggregate`, the log of computed totals. Every operation
//! runs on its own pooled connection inside its own transaction and is bounded
//! by a deadline from [`StoreConfig`].

pub mod config;
pub mod deadline;
pub mod error;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use common::{AggregateSnapshot, CounterEvent, LatestAggregate};
pub use config::StoreConfig;
pub use error::{EventStoreError, Result};
pub use sqlite::SqliteEventStore;
pub use store::{EventStore, EventStoreExt};
