//! Routed message envelope.

use chrono::{DateTime, Utc};

use chathub_core::error::AppError;
use chathub_core::types::{ConnectionId, MessageId, UserId};

use super::codec::encode_outbound;
use super::frame::OutboundFrame;
use super::types::{MessageKind, OutboundMessage};

/// Who an envelope is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// A single user, on all of their connections.
    Direct(UserId),
    /// An explicit set of users. Always de-duplicated and free of the sender.
    Group(Vec<UserId>),
    /// Every online user.
    Broadcast,
    /// Every online user, bypassing authorization.
    System,
}

/// A message accepted by the hub, ready for routing.
///
/// Envelopes are immutable once built. The sender and target fields are
/// only reachable through accessors so a routed envelope cannot be
/// re-addressed.
#[derive(Debug, Clone)]
pub struct Envelope {
    id: MessageId,
    sender: Option<UserId>,
    origin: Option<ConnectionId>,
    audience: Audience,
    payload: serde_json::Value,
    sent_at: DateTime<Utc>,
}

impl Envelope {
    fn new(
        sender: Option<UserId>,
        origin: Option<ConnectionId>,
        audience: Audience,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            origin,
            audience,
            payload,
            sent_at: Utc::now(),
        }
    }

    /// A direct message from `sender` (on connection `origin`) to `to`.
    pub fn direct(
        sender: UserId,
        origin: ConnectionId,
        to: UserId,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(Some(sender), Some(origin), Audience::Direct(to), payload)
    }

    /// A message to several users.
    pub fn group(
        sender: UserId,
        origin: ConnectionId,
        members: impl IntoIterator<Item = UserId>,
        payload: serde_json::Value,
    ) -> Self {
        let mut recipients: Vec<UserId> = Vec::new();
        for member in members {
            if member != sender && !recipients.contains(&member) {
                recipients.push(member);
            }
        }
        Self::new(Some(sender), Some(origin), Audience::Group(recipients), payload)
    }

    /// A message to every online user except the originating connection.
    pub fn broadcast(sender: UserId, origin: ConnectionId, payload: serde_json::Value) -> Self {
        Self::new(Some(sender), Some(origin), Audience::Broadcast, payload)
    }

    /// A hub-originated notice.
    pub fn system(payload: serde_json::Value) -> Self {
        Self::new(None, None, Audience::System, payload)
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// The sending user; `None` only for system notices.
    pub fn sender(&self) -> Option<UserId> {
        self.sender
    }

    /// The connection the message arrived on. Fan-out skips it.
    pub fn origin(&self) -> Option<ConnectionId> {
        self.origin
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    pub fn kind(&self) -> MessageKind {
        match self.audience {
            Audience::Direct(_) => MessageKind::Direct,
            Audience::Group(_) => MessageKind::Group,
            Audience::Broadcast => MessageKind::Broadcast,
            Audience::System => MessageKind::System,
        }
    }

    /// The recipient of a direct message. Present iff the kind is direct.
    pub fn target(&self) -> Option<UserId> {
        match self.audience {
            Audience::Direct(to) => Some(to),
            _ => None,
        }
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    /// The message as recipients see it.
    pub fn to_outbound(&self) -> OutboundMessage {
        OutboundMessage::Message {
            id: self.id,
            from: self.sender,
            kind: self.kind(),
            payload: self.payload.clone(),
            sent_at: self.sent_at,
        }
    }

    /// Serialize once for fan-out.
    pub fn to_frame(&self) -> Result<OutboundFrame, AppError> {
        encode_outbound(&self.to_outbound())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_only_for_direct() {
        let origin = ConnectionId::new();
        let direct = Envelope::direct(UserId(1), origin, UserId(2), serde_json::json!("x"));
        assert_eq!(direct.kind(), MessageKind::Direct);
        assert_eq!(direct.target(), Some(UserId(2)));

        let broadcast = Envelope::broadcast(UserId(1), origin, serde_json::json!("x"));
        assert_eq!(broadcast.kind(), MessageKind::Broadcast);
        assert_eq!(broadcast.target(), None);
        assert_eq!(broadcast.origin(), Some(origin));
    }

    #[test]
    fn test_group_collapses_duplicates_and_sender() {
        let env = Envelope::group(
            UserId(1),
            ConnectionId::new(),
            [UserId(2), UserId(1), UserId(3), UserId(2)],
            serde_json::Value::Null,
        );
        assert_eq!(env.audience(), &Audience::Group(vec![UserId(2), UserId(3)]));
    }

    #[test]
    fn test_system_has_no_sender() {
        let env = Envelope::system(serde_json::json!({"notice": "maintenance"}));
        assert_eq!(env.kind(), MessageKind::System);
        assert_eq!(env.sender(), None);

        let json: serde_json::Value = serde_json::from_str(&env.to_frame().unwrap()).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["kind"], "system");
        assert!(json["from"].is_null());
    }
}
