//! Response DTOs.

use serde::{Deserialize, Serialize};

use chathub_realtime::MetricsSnapshot;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness body with hub and dependency state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// `ok`, or `degraded` when the relationship store is unreachable.
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
    /// `connected` or `unavailable`.
    pub relationship_store: String,
    pub ws_connections: usize,
    pub online_users: usize,
}

/// Hub counters plus live gauges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub hub: MetricsSnapshot,
    pub online_users: usize,
}
