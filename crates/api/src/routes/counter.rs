//! Counter read and increment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::{EventStore, EventStoreExt};
use projections::AggregationTrigger;
use serde::Serialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub store: S,
    pub aggregation: AggregationTrigger,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub counter: i64,
    /// RFC 3339, whole seconds, UTC. The epoch means no aggregate exists yet.
    #[serde(rename = "lastDate")]
    pub last_date: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// -- Handlers --

/// GET /api/list — latest aggregate total and when it was computed.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ListResponse>, ApiError> {
    let latest = state.store.get_latest_aggregate().await?;

    Ok(Json(ListResponse {
        counter: latest.counts(),
        last_date: latest.last_time_rfc3339(),
    }))
}

/// POST /api/add — record one increment and schedule re-aggregation.
///
/// The response does not wait for the aggregate; `/api/list` catches up once
/// the background run completes. Recording and the aggregation request run on
/// their own task, so a client that disconnects mid-commit cannot leave a
/// committed event without a run scheduled for it.
#[tracing::instrument(skip(state))]
pub async fn add<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<MessageResponse>, ApiError> {
    tokio::spawn(async move {
        state.store.record_increment().await?;
        state.aggregation.request();
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(Json(MessageResponse { message: "success" }))
}
