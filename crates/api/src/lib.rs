//! HTTP server for the counter service.
//!
//! Serves the counter page, the JSON endpoints it polls, and health and
//! Prometheus endpoints, with structured logging (tracing) throughout.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::Aggregator;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::counter::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/", get(routes::index::get))
        .route("/health", get(routes::health::check::<S>))
        .route("/api/list", get(routes::counter::list::<S>))
        .route("/api/add", post(routes::counter::add::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state and starts the aggregation worker.
///
/// The worker runs until the returned state, and every clone of its trigger,
/// has been dropped; await the handle to let the last run finish.
pub fn create_state<S: EventStore + Clone + 'static>(
    store: S,
) -> (Arc<AppState<S>>, JoinHandle<()>) {
    let (aggregation, worker) = Aggregator::spawn(store.clone());
    let state = Arc::new(AppState { store, aggregation });
    (state, worker)
}
