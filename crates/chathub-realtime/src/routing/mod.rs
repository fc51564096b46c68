//! Message routing and the delivery policy.

pub mod policy;
pub mod router;

pub use policy::{DeliveryPolicy, DeliveryScope};
pub use router::{MessageRouter, RouteReport};
