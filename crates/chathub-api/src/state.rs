//! Application state shared across all handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use chathub_auth::jwt::JwtDecoder;
use chathub_core::config::AppConfig;
use chathub_realtime::{ChatHub, WsAuthenticator};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// The connection hub
    pub hub: ChatHub,
    /// Resolves upgrade credentials to users
    pub authenticator: WsAuthenticator,
    /// Process start time, for uptime reporting
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state around an existing hub, validating tokens with the
    /// configured auth settings.
    pub fn new(config: Arc<AppConfig>, hub: ChatHub) -> Self {
        let decoder = Arc::new(JwtDecoder::new(&config.auth));
        Self {
            authenticator: WsAuthenticator::new(decoder),
            config,
            hub,
            started_at: Utc::now(),
        }
    }
}
