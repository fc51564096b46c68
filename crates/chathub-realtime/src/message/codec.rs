//! Decoding of inbound text frames and encoding of outbound messages.

use thiserror::Error;

use chathub_core::error::{AppError, ErrorKind};

use super::frame::OutboundFrame;
use super::types::{InboundMessage, OutboundMessage};

/// Why an inbound frame was rejected.
///
/// Decode faults are reported to the sender and never end the connection.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Larger than `realtime.max_frame_bytes`.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Received size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Binary frames carry no protocol meaning.
    #[error("binary frames are not supported")]
    Unsupported,
    /// A group message named no recipients.
    #[error("group message has no recipients")]
    EmptyGroup,
    /// Not a known JSON message.
    #[error("invalid frame: {0}")]
    Invalid(#[from] serde_json::Error),
}

impl DecodeError {
    /// Code sent back to the client in the `error` message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "FRAME_TOO_LARGE",
            Self::Unsupported => "UNSUPPORTED_FRAME",
            Self::EmptyGroup | Self::Invalid(_) => "INVALID_FRAME",
        }
    }

    /// The `error` message for the sender.
    pub fn to_outbound(&self) -> OutboundMessage {
        OutboundMessage::Error {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Decode a client text frame.
pub fn decode_inbound(text: &str, max_bytes: usize) -> Result<InboundMessage, DecodeError> {
    if text.len() > max_bytes {
        return Err(DecodeError::TooLarge {
            size: text.len(),
            limit: max_bytes,
        });
    }

    let message: InboundMessage = serde_json::from_str(text)?;
    if let InboundMessage::Group { to, .. } = &message
        && to.is_empty()
    {
        return Err(DecodeError::EmptyGroup);
    }
    Ok(message)
}

/// Serialize an outbound message into a shareable text frame.
pub fn encode_outbound(message: &OutboundMessage) -> Result<OutboundFrame, AppError> {
    serde_json::to_string(message)
        .map(OutboundFrame::from)
        .map_err(|e| AppError::with_source(ErrorKind::Serialization, "Failed to encode message", e))
}
