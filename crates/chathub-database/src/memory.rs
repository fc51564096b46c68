//! In-memory relationship directory for development and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;

use chathub_core::result::AppResult;
use chathub_core::traits::RelationshipDirectory;
use chathub_core::types::UserId;

/// Friend and block lists held in process memory.
#[derive(Debug, Default)]
pub struct MemoryRelationshipDirectory {
    /// Owner → users the owner has blocked.
    blocked: DashMap<UserId, HashSet<UserId>>,
    /// Owner → users the owner lists as friends.
    friends: DashMap<UserId, HashSet<UserId>>,
}

impl MemoryRelationshipDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `owner` blocks `other`.
    pub fn block(&self, owner: UserId, other: UserId) {
        self.blocked.entry(owner).or_default().insert(other);
    }

    /// Remove a block. Returns `true` if one existed.
    pub fn unblock(&self, owner: UserId, other: UserId) -> bool {
        self.blocked
            .get_mut(&owner)
            .map(|mut set| set.remove(&other))
            .unwrap_or(false)
    }

    /// Record that `owner` lists `other` as a friend.
    pub fn add_friend(&self, owner: UserId, other: UserId) {
        self.friends.entry(owner).or_default().insert(other);
    }
}

#[async_trait]
impl RelationshipDirectory for MemoryRelationshipDirectory {
    async fn is_blocked(&self, owner: UserId, other: UserId) -> AppResult<bool> {
        Ok(self
            .blocked
            .get(&owner)
            .is_some_and(|set| set.contains(&other)))
    }

    async fn are_friends(&self, owner: UserId, other: UserId) -> AppResult<bool> {
        Ok(self
            .friends
            .get(&owner)
            .is_some_and(|set| set.contains(&other)))
    }
}
