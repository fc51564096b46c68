//! Transport-neutral frames exchanged with a connection.

use std::sync::Arc;

use bytes::Bytes;

/// A serialized text frame waiting in an outbound queue.
///
/// Fan-out serializes a message once and shares the text between every
/// recipient queue.
pub type OutboundFrame = Arc<str>;

/// One unit read from or written to a client transport.
///
/// The pump only sees these; the HTTP layer adapts its WebSocket type to a
/// `Stream` and `Sink` of `Frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text, carrying a JSON message.
    Text(Arc<str>),
    /// Binary data. Not part of the protocol.
    Binary(Bytes),
    /// Liveness probe.
    Ping,
    /// Liveness probe acknowledgement.
    Pong,
    /// Orderly close.
    Close,
}

impl Frame {
    /// Build a text frame from anything string-like.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    /// Returns the text content, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}
