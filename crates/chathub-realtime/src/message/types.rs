//! Inbound and outbound wire message definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chathub_core::types::{ConnectionId, MessageId, UserId};

/// Messages sent by a client to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// One-to-one message.
    Direct {
        /// Recipient.
        to: UserId,
        /// Opaque application payload.
        payload: serde_json::Value,
    },
    /// Message to an explicit list of recipients.
    Group {
        /// Recipients. Duplicates and the sender's own id are ignored.
        to: Vec<UserId>,
        /// Opaque application payload.
        payload: serde_json::Value,
    },
    /// Message to every online user.
    Broadcast {
        /// Opaque application payload.
        payload: serde_json::Value,
    },
    /// Application-level keepalive.
    Ping,
}

/// Delivery category of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// One recipient.
    Direct,
    /// Explicit recipient list.
    Group,
    /// Every online user.
    Broadcast,
    /// Hub-originated notice. Never subject to authorization.
    System,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Group => write!(f, "group"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Online/offline status carried by presence notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// At least one live connection.
    Online,
    /// No live connections.
    Offline,
}

/// Messages sent by the hub to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Sent once, right after the connection is registered.
    Connected {
        /// The hub-assigned connection id.
        connection_id: ConnectionId,
        /// The authenticated user.
        user_id: UserId,
    },
    /// A routed message.
    Message {
        /// Envelope id.
        id: MessageId,
        /// Sender, absent for system notices.
        from: Option<UserId>,
        /// Delivery category.
        kind: MessageKind,
        /// Opaque application payload.
        payload: serde_json::Value,
        /// When the hub accepted the message.
        sent_at: DateTime<Utc>,
    },
    /// A user came online or went offline.
    Presence {
        /// The user whose status changed.
        user_id: UserId,
        /// New status.
        status: PresenceStatus,
        /// When the change happened.
        timestamp: DateTime<Utc>,
    },
    /// Reply to an application-level ping.
    Pong,
    /// The client's own frame could not be processed.
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable explanation.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_tags() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type":"direct","to":7,"payload":{"text":"hi"}}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Direct {
                to: UserId(7),
                payload: serde_json::json!({"text": "hi"}),
            }
        );

        let msg: InboundMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, InboundMessage::Ping);
    }

    #[test]
    fn test_clients_cannot_send_system_kind() {
        let result = serde_json::from_str::<InboundMessage>(r#"{"type":"system","payload":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_outbound_shape() {
        let json = serde_json::to_value(OutboundMessage::Presence {
            user_id: UserId(3),
            status: PresenceStatus::Offline,
            timestamp: Utc::now(),
        })
        .unwrap();

        assert_eq!(json["type"], "presence");
        assert_eq!(json["user_id"], 3);
        assert_eq!(json["status"], "offline");
    }
}
