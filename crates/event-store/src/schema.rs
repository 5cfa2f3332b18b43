//! Database schema.

use sqlx::{Connection, SqlitePool};

use crate::{EventStoreError, Result};

/// Raw event log: one row per increment.
pub const CREATE_COUNTER_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS counter (
    count      INTEGER  NOT NULL,
    created_at DATETIME NOT NULL
)";

/// Aggregate log: one row per aggregation run.
pub const CREATE_COUNTER_AGGREGATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS counter_aggregate (
    counts     INTEGER  NOT NULL,
    created_at DATETIME NOT NULL
)";

/// Serves the latest-snapshot lookup.
pub const CREATE_COUNTER_AGGREGATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_counter_aggregate_created_at
    ON counter_aggregate (created_at)";

/// Statements applied by [`ensure_schema`], in order.
pub const SCHEMA: [&str; 3] = [
    CREATE_COUNTER_TABLE,
    CREATE_COUNTER_AGGREGATE_TABLE,
    CREATE_COUNTER_AGGREGATE_INDEX,
];

/// Creates both tables if they are absent.
///
/// All statements run in one transaction, so a failure part way leaves no
/// table behind. Safe to call on every start.
#[tracing::instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    let mut conn = pool.acquire().await.map_err(EventStoreError::Acquire)?;
    let mut tx = conn.begin().await.map_err(EventStoreError::Begin)?;

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(EventStoreError::Execute)?;
    }

    tx.commit().await.map_err(EventStoreError::Commit)?;
    tracing::debug!("schema ensured");
    Ok(())
}
