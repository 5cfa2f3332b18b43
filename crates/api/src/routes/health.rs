//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use projections::AggregationStatus;
use serde::Serialize;

use super::counter::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub aggregation: AggregationStatus,
}

/// GET /health — returns system health and aggregation worker counters.
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        aggregation: state.aggregation.status(),
    })
}
