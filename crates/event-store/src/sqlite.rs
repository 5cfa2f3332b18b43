use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Connection, SqlitePool};

use crate::deadline::with_deadline;
use crate::{
    AggregateSnapshot, CounterEvent, EventStoreError, Result, StoreConfig, schema,
    store::EventStore,
};

/// SQLite-backed store implementation.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
    config: StoreConfig,
}

impl SqliteEventStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: SqlitePool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Opens the database described by `config`, creating the file if needed.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let options = config.connect_options()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.write_timeout)
            .connect_with(options)
            .await
            .map_err(EventStoreError::Connect)?;

        tracing::debug!(database_url = %config.database_url, "database opened");
        Ok(Self::new(pool, config))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn count_rows(&self, operation: &'static str, sql: &'static str) -> Result<i64> {
        with_deadline(operation, self.config.read_timeout, async {
            let mut conn = self.pool.acquire().await.map_err(EventStoreError::Acquire)?;
            sqlx::query_scalar::<_, i64>(sql)
                .fetch_one(&mut *conn)
                .await
                .map_err(EventStoreError::Execute)
        })
        .await
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn ensure_schema(&self) -> Result<()> {
        with_deadline(
            "ensure_schema",
            self.config.migrate_timeout,
            schema::ensure_schema(&self.pool),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn record_event(&self, count: i64) -> Result<CounterEvent> {
        let result = with_deadline("record_event", self.config.write_timeout, async {
            let event = CounterEvent::now(count);

            let mut conn = self.pool.acquire().await.map_err(EventStoreError::Acquire)?;
            let mut tx = conn.begin().await.map_err(EventStoreError::Begin)?;

            sqlx::query("INSERT INTO counter (count, created_at) VALUES (?, ?)")
                .bind(event.count)
                .bind(event.created_at)
                .execute(&mut *tx)
                .await
                .map_err(EventStoreError::Execute)?;

            tx.commit().await.map_err(EventStoreError::Commit)?;
            Ok(event)
        })
        .await;

        match &result {
            Ok(_) => metrics::counter!("counter_events_recorded_total").increment(1),
            Err(_) => metrics::counter!("counter_record_failures_total").increment(1),
        }
        result
    }

    /// Sums the event log and appends the result as a new snapshot.
    ///
    /// The transaction takes the write lock before scanning, so no increment
    /// can commit between the scan and the insert. Writers wait on the busy
    /// timeout for the duration of the scan instead of failing this run.
    #[tracing::instrument(skip(self))]
    async fn compute_aggregate(&self) -> Result<AggregateSnapshot> {
        with_deadline("compute_aggregate", self.config.aggregate_timeout, async {
            let mut conn = self.pool.acquire().await.map_err(EventStoreError::Acquire)?;
            let mut tx = conn
                .begin_with("BEGIN IMMEDIATE")
                .await
                .map_err(EventStoreError::Begin)?;

            let counts = sqlx::query_scalar::<_, i64>("SELECT count FROM counter")
                .fetch(&mut *tx)
                .map_err(EventStoreError::Execute)
                .try_fold(0i64, |total, count| async move {
                    total.checked_add(count).ok_or(EventStoreError::Overflow)
                })
                .await?;

            let snapshot = AggregateSnapshot::new(counts, Utc::now());

            sqlx::query("INSERT INTO counter_aggregate (counts, created_at) VALUES (?, ?)")
                .bind(snapshot.counts)
                .bind(snapshot.created_at)
                .execute(&mut *tx)
                .await
                .map_err(EventStoreError::Execute)?;

            tx.commit().await.map_err(EventStoreError::Commit)?;
            Ok(snapshot)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn latest_aggregate(&self) -> Result<Option<AggregateSnapshot>> {
        with_deadline("latest_aggregate", self.config.read_timeout, async {
            let mut conn = self.pool.acquire().await.map_err(EventStoreError::Acquire)?;

            // rowid breaks ties between snapshots stamped within the same instant
            let row: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
                r#"
                SELECT counts, created_at
                FROM counter_aggregate
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                "#,
            )
            .fetch_optional(&mut *conn)
            .await
            .map_err(EventStoreError::Execute)?;

            Ok(row.map(|(counts, created_at)| AggregateSnapshot::new(counts, created_at)))
        })
        .await
    }

    async fn event_count(&self) -> Result<i64> {
        self.count_rows("event_count", "SELECT COUNT(*) FROM counter")
            .await
    }

    async fn snapshot_count(&self) -> Result<i64> {
        self.count_rows("snapshot_count", "SELECT COUNT(*) FROM counter_aggregate")
            .await
    }
}
