use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One recorded increment.
///
/// `count` is a quantity, not a flag: the HTTP layer always records `1`, but
/// the aggregate is the sum of whatever was recorded. Events are immutable
/// once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterEvent {
    pub count: i64,
    pub created_at: DateTime<Utc>,
}

impl CounterEvent {
    /// Creates an event stamped with the current time.
    pub fn now(count: i64) -> Self {
        Self {
            count,
            created_at: Utc::now(),
        }
    }
}

/// A total-to-date computed by one aggregation run.
///
/// Snapshots are append-only; the log of them is the history of the total,
/// and only the most recent one is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub counts: i64,
    pub created_at: DateTime<Utc>,
}

impl AggregateSnapshot {
    pub fn new(counts: i64, created_at: DateTime<Utc>) -> Self {
        Self { counts, created_at }
    }

    /// The zero state served before any aggregation has completed.
    ///
    /// Its timestamp is the Unix epoch, which clients read as "never".
    pub fn never() -> Self {
        Self {
            counts: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Returns true if this is the epoch sentinel.
    pub fn is_never(&self) -> bool {
        self.created_at == DateTime::<Utc>::UNIX_EPOCH
    }
}

/// Result of reading the latest aggregate.
///
/// `found` is false when no snapshot exists yet; `snapshot` then holds
/// [`AggregateSnapshot::never`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestAggregate {
    pub snapshot: AggregateSnapshot,
    pub found: bool,
}

impl LatestAggregate {
    pub fn from_option(snapshot: Option<AggregateSnapshot>) -> Self {
        match snapshot {
            Some(snapshot) => Self {
                snapshot,
                found: true,
            },
            None => Self {
                snapshot: AggregateSnapshot::never(),
                found: false,
            },
        }
    }

    pub fn counts(&self) -> i64 {
        self.snapshot.counts
    }

    pub fn last_time(&self) -> DateTime<Utc> {
        self.snapshot.created_at
    }

    /// Formats the snapshot time as RFC 3339 with whole seconds in UTC,
    /// e.g. `1970-01-01T00:00:00Z`.
    pub fn last_time_rfc3339(&self) -> String {
        self.snapshot
            .created_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
