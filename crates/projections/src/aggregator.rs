//! Background worker that recomputes the running total.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use common::AggregateSnapshot;
use event_store::EventStore;
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::status::AggregationStatus;
use crate::{ProjectionError, Result};

/// Handle for requesting aggregation runs.
///
/// Cloning is cheap. The worker exits once every handle has been dropped.
#[derive(Clone)]
pub struct AggregationTrigger {
    tx: mpsc::Sender<()>,
    status: Arc<watch::Sender<AggregationStatus>>,
}

impl AggregationTrigger {
    /// Asks the worker to recompute the total.
    ///
    /// Never blocks. If a run is already queued it has not started yet, so it
    /// will observe everything committed before this call and the request is
    /// folded into it. Returns true if a new run was queued.
    pub fn request(&self) -> bool {
        self.status.send_modify(|s| s.runs_requested += 1);

        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                self.status.send_modify(|s| {
                    s.runs_requested -= 1;
                    s.requests_coalesced += 1;
                });
                metrics::counter!("aggregation_requests_coalesced_total").increment(1);
                tracing::debug!("aggregation already pending, request coalesced");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                self.status.send_modify(|s| s.runs_requested -= 1);
                tracing::warn!("aggregation worker stopped, request dropped");
                false
            }
        }
    }

    /// Returns a copy of the worker's current status.
    pub fn status(&self) -> AggregationStatus {
        self.status.borrow().clone()
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<AggregationStatus> {
        self.status.subscribe()
    }

    /// Waits until every accepted request has been run.
    ///
    /// Fails with [`ProjectionError::WorkerStopped`] if the worker exits while
    /// requests are still outstanding.
    pub async fn wait_idle(&self) -> Result<AggregationStatus> {
        let mut rx = self.status.subscribe();
        tokio::select! {
            biased;
            status = rx.wait_for(AggregationStatus::is_idle) => status
                .map(|s| s.clone())
                .map_err(|_| ProjectionError::WorkerStopped),
            () = self.tx.closed() => Err(ProjectionError::WorkerStopped),
        }
    }
}

/// Single worker draining aggregation requests one at a time.
///
/// Runs never overlap, so concurrent increments cannot produce redundant
/// concurrent full scans. Each run is bounded by the store's aggregate
/// deadline and its outcome is published on the status channel.
pub struct Aggregator<S: EventStore> {
    store: S,
    rx: mpsc::Receiver<()>,
    status: Arc<watch::Sender<AggregationStatus>>,
}

impl<S: EventStore + 'static> Aggregator<S> {
    /// Creates a worker and the trigger feeding it. Call [`Aggregator::run`]
    /// (or use [`Aggregator::spawn`]) to start processing.
    pub fn new(store: S) -> (Self, AggregationTrigger) {
        // One slot: a queued request stands for every request made before it starts
        let (tx, rx) = mpsc::channel(1);
        let status = Arc::new(watch::Sender::new(AggregationStatus::default()));

        let trigger = AggregationTrigger {
            tx,
            status: Arc::clone(&status),
        };
        (Self { store, rx, status }, trigger)
    }

    /// Spawns the worker on the current runtime.
    pub fn spawn(store: S) -> (AggregationTrigger, JoinHandle<()>) {
        let (worker, trigger) = Self::new(store);
        let handle = tokio::spawn(worker.run());
        (trigger, handle)
    }

    /// Processes requests until every trigger has been dropped.
    ///
    /// A run that panics is recorded as failed; the worker keeps serving.
    pub async fn run(mut self) {
        tracing::info!("aggregation worker started");
        while self.rx.recv().await.is_some() {
            if AssertUnwindSafe(self.run_once()).catch_unwind().await.is_err() {
                self.record_panic();
            }
        }
        tracing::info!("aggregation worker stopped");
    }

    fn record_panic(&self) {
        metrics::counter!("aggregation_runs_total", "outcome" => "panic").increment(1);
        tracing::error!("aggregation run panicked");

        self.status.send_modify(|s| {
            s.runs_failed += 1;
            s.last_error = Some("aggregation run panicked".to_string());
        });
    }

    /// Runs one aggregation and publishes its outcome.
    ///
    /// Errors are logged and recorded in the status; there is no caller to
    /// return them to beyond this method's result.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<AggregateSnapshot> {
        let started = Instant::now();
        let result = self.store.compute_aggregate().await;
        metrics::histogram!("aggregation_duration_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(snapshot) => {
                metrics::counter!("aggregation_runs_total", "outcome" => "success").increment(1);
                metrics::gauge!("aggregate_latest_counts").set(snapshot.counts as f64);
                tracing::info!(counts = snapshot.counts, "aggregate created");

                self.status.send_modify(|s| {
                    s.runs_succeeded += 1;
                    s.last_snapshot = Some(snapshot);
                    s.last_error = None;
                });
                Ok(snapshot)
            }
            Err(err) => {
                let outcome = if err.is_timeout() { "timeout" } else { "failure" };
                metrics::counter!("aggregation_runs_total", "outcome" => outcome).increment(1);
                tracing::error!(error = %err, "aggregation failed");

                self.status.send_modify(|s| {
                    s.runs_failed += 1;
                    s.last_error = Some(err.to_string());
                });
                Err(ProjectionError::from(err))
            }
        }
    }
}

impl<S: EventStore> std::fmt::Debug for Aggregator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use common::CounterEvent;
    use event_store::EventStoreError;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::time::Duration;

    /// Counts calls and sums recorded quantities without touching a database.
    #[derive(Default)]
    struct CountingStore {
        total: AtomicI64,
        aggregations: AtomicI64,
        fail: bool,
        panic_once: AtomicBool,
    }

    #[async_trait]
    impl EventStore for CountingStore {
        async fn ensure_schema(&self) -> event_store::Result<()> {
            Ok(())
        }

        async fn record_event(&self, count: i64) -> event_store::Result<CounterEvent> {
            self.total.fetch_add(count, Ordering::SeqCst);
            Ok(CounterEvent::now(count))
        }

        async fn compute_aggregate(&self) -> event_store::Result<AggregateSnapshot> {
            self.aggregations.fetch_add(1, Ordering::SeqCst);
            if self.panic_once.swap(false, Ordering::SeqCst) {
                panic!("store blew up");
            }
            if self.fail {
                return Err(EventStoreError::Execute(sqlx::Error::PoolClosed));
            }
            Ok(AggregateSnapshot::new(
                self.total.load(Ordering::SeqCst),
                Utc::now(),
            ))
        }

        async fn latest_aggregate(&self) -> event_store::Result<Option<AggregateSnapshot>> {
            Ok(None)
        }

        async fn event_count(&self) -> event_store::Result<i64> {
            Ok(self.total.load(Ordering::SeqCst))
        }

        async fn snapshot_count(&self) -> event_store::Result<i64> {
            Ok(self.aggregations.load(Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn run_once_publishes_snapshot() {
        let store = Arc::new(CountingStore::default());
        store.record_event(4).await.unwrap();

        let (worker, trigger) = Aggregator::new(Arc::clone(&store));
        let snapshot = worker.run_once().await.unwrap();

        assert_eq!(snapshot.counts, 4);
        let status = trigger.status();
        assert_eq!(status.runs_succeeded, 1);
        assert_eq!(status.last_snapshot, Some(snapshot));
        assert_eq!(status.last_error, None);
    }

    #[tokio::test]
    async fn run_once_records_failure() {
        let store = Arc::new(CountingStore {
            fail: true,
            ..Default::default()
        });

        let (worker, trigger) = Aggregator::new(store);
        let result = worker.run_once().await;

        assert!(matches!(result, Err(ProjectionError::EventStore(_))));
        let status = trigger.status();
        assert_eq!(status.runs_failed, 1);
        assert!(status.last_error.is_some());
        assert_eq!(status.last_snapshot, None);
    }

    #[tokio::test]
    async fn requests_while_pending_are_coalesced() {
        let store = Arc::new(CountingStore::default());
        // Worker not started yet, so the first request stays queued
        let (worker, trigger) = Aggregator::new(Arc::clone(&store));

        assert!(trigger.request());
        assert!(!trigger.request());
        assert!(!trigger.request());

        let status = trigger.status();
        assert_eq!(status.runs_requested, 1);
        assert_eq!(status.requests_coalesced, 2);

        let handle = tokio::spawn(worker.run());
        let status = tokio::time::timeout(Duration::from_secs(5), trigger.wait_idle())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(status.runs_succeeded, 1);
        assert_eq!(store.aggregations.load(Ordering::SeqCst), 1);

        drop(trigger);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn worker_stops_when_triggers_dropped() {
        let store = Arc::new(CountingStore::default());
        let (trigger, handle) = Aggregator::spawn(store);
        let second = trigger.clone();

        drop(trigger);
        drop(second);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn request_after_worker_exit_is_dropped() {
        let store = Arc::new(CountingStore::default());
        let (worker, trigger) = Aggregator::new(store);
        drop(worker);

        assert!(!trigger.request());
        let status = trigger.status();
        assert_eq!(status.runs_requested, 0);
        assert!(status.is_idle());
    }

    #[tokio::test]
    async fn panicking_run_is_recorded_and_worker_keeps_serving() {
        let store = Arc::new(CountingStore {
            panic_once: AtomicBool::new(true),
            ..Default::default()
        });
        store.record_event(2).await.unwrap();
        let (trigger, handle) = Aggregator::spawn(Arc::clone(&store));

        assert!(trigger.request());
        let status = tokio::time::timeout(Duration::from_secs(5), trigger.wait_idle())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.runs_failed, 1);
        assert_eq!(status.last_error.as_deref(), Some("aggregation run panicked"));

        assert!(trigger.request());
        let status = tokio::time::timeout(Duration::from_secs(5), trigger.wait_idle())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.runs_succeeded, 1);
        assert_eq!(status.last_snapshot.map(|s| s.counts), Some(2));
        assert_eq!(status.last_error, None);

        drop(trigger);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn wait_idle_fails_when_worker_stops_with_requests_pending() {
        let store = Arc::new(CountingStore::default());
        let (worker, trigger) = Aggregator::new(store);

        assert!(trigger.request());
        drop(worker);

        let result = tokio::time::timeout(Duration::from_secs(5), trigger.wait_idle())
            .await
            .unwrap();
        assert!(matches!(result, Err(ProjectionError::WorkerStopped)));
    }

    #[tokio::test]
    async fn wait_idle_after_clean_exit_reports_idle() {
        let store = Arc::new(CountingStore::default());
        let (worker, trigger) = Aggregator::new(store);
        drop(worker);

        let status = trigger.wait_idle().await.unwrap();
        assert!(status.is_idle());
    }
}
