//! # chathub-realtime
//!
//! Connection hub for ChatHub. Provides:
//!
//! - A registry of live connections, indexed by connection and by user
//! - Routing of direct, group, broadcast, and system messages, with
//!   block/friend authorization that fails closed
//! - Per-connection pumps with bounded outbound queues, liveness probes,
//!   and disconnect-on-overflow
//! - Online/offline presence notices
//! - Hub metrics

pub mod connection;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod routing;
pub mod server;

pub use connection::{ClientHandle, CloseReason, HubRegistry, WsAuthenticator};
pub use message::{Envelope, Frame};
pub use metrics::{HubMetrics, MetricsSnapshot};
pub use presence::PresenceTracker;
pub use routing::MessageRouter;
pub use server::ChatHub;
