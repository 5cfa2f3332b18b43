//! Aggregation of the counter event log.
//!
//! Recording an event only appends to the log; the total is recomputed in the
//! background by a single [`Aggregator`] worker. Callers submit requests
//! through an [`AggregationTrigger`], which never blocks and coalesces
//! requests while a run is already pending.

pub mod aggregator;
pub mod error;
pub mod status;

pub use aggregator::{AggregationTrigger, Aggregator};
pub use error::{ProjectionError, Result};
pub use status::AggregationStatus;
