//! HTTP and WebSocket handlers.

pub mod health;
pub mod metrics;
pub mod ws;
