//! # chathub-api
//!
//! HTTP layer for ChatHub built on Axum.
//!
//! Provides the authenticated WebSocket upgrade, health and metrics
//! endpoints, CORS and request tracing, and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::ApiError;
pub use state::AppState;
