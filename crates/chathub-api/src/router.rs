//! Route definitions for the ChatHub HTTP surface.
//!
//! The WebSocket endpoint is mounted at `/ws`; health and metrics live
//! under `/api`.

use axum::Router;
use axum::routing::get;

use crate::handlers;
use crate::state::AppState;

/// Build the router with every route, threading `AppState` through
/// `.with_state(state)`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new().merge(health_routes()).merge(metrics_routes());

    Router::new()
        .route("/ws", get(handlers::ws::ws_upgrade))
        .nest("/api", api_routes)
        .with_state(state)
}

/// Liveness and readiness
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

fn metrics_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(handlers::metrics::metrics))
}
