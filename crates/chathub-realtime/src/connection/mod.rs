//! Connection management: handles, the registry, pumps, heartbeat, auth.

pub mod authenticator;
pub mod handle;
pub mod heartbeat;
pub mod pump;
pub mod registry;

pub use authenticator::{AuthenticatedConnection, WsAuthenticator};
pub use handle::{ClientHandle, CloseReason, ConnectionState, EnqueueError, OutboundQueue};
pub use pump::ConnectionPump;
pub use registry::{Departure, HubRegistry, Registration};
