//! Hub metrics endpoint.

use axum::Json;
use axum::extract::State;

use crate::dto::{ApiResponse, MetricsResponse};
use crate::state::AppState;

/// GET /api/metrics
pub async fn metrics(State(state): State<AppState>) -> Json<ApiResponse<MetricsResponse>> {
    Json(ApiResponse::ok(MetricsResponse {
        hub: state.hub.metrics_snapshot(),
        online_users: state.hub.registry.user_count(),
    }))
}
