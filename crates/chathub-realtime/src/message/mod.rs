//! Wire messages, envelopes, and the frame codec.

pub mod codec;
pub mod envelope;
pub mod frame;
pub mod types;

pub use codec::{DecodeError, decode_inbound, encode_outbound};
pub use envelope::{Audience, Envelope};
pub use frame::{Frame, OutboundFrame};
pub use types::{InboundMessage, MessageKind, OutboundMessage, PresenceStatus};
