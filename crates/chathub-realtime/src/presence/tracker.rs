//! Presence tracker: online-since bookkeeping and presence notices.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use chathub_core::types::UserId;

use crate::message::{OutboundMessage, PresenceStatus};

/// Tracks when each online user came online.
///
/// The registry decides *whether* a user is online; this only remembers
/// since when, and builds the notices announced to other users.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    /// User ID → first-connection time
    online_since: DashMap<UserId, DateTime<Utc>>,
}

impl PresenceTracker {
    /// Create a new presence tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a user as online. Returns the notice to announce, or `None`
    /// if the user was already online.
    pub fn set_online(&self, user_id: UserId) -> Option<OutboundMessage> {
        let now = Utc::now();
        if self.online_since.insert(user_id, now).is_some() {
            return None;
        }
        Some(OutboundMessage::Presence {
            user_id,
            status: PresenceStatus::Online,
            timestamp: now,
        })
    }

    /// Mark a user as offline. Returns `None` if they were not online.
    pub fn set_offline(&self, user_id: UserId) -> Option<OutboundMessage> {
        self.online_since.remove(&user_id)?;
        Some(OutboundMessage::Presence {
            user_id,
            status: PresenceStatus::Offline,
            timestamp: Utc::now(),
        })
    }

    pub fn online_since(&self, user_id: &UserId) -> Option<DateTime<Utc>> {
        self.online_since.get(user_id).map(|entry| *entry.value())
    }

    pub fn status(&self, user_id: &UserId) -> PresenceStatus {
        if self.online_since.contains_key(user_id) {
            PresenceStatus::Online
        } else {
            PresenceStatus::Offline
        }
    }

    pub fn online_count(&self) -> usize {
        self.online_since.len()
    }
}
