//! Relationship lookups consulted by the router before delivery.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::UserId;

/// Read-only view of the friend and block lists kept by the profile store.
///
/// Implementations must be free of side effects. Callers treat any `Err`
/// as "do not deliver".
#[async_trait]
pub trait RelationshipDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Returns `true` if `owner` has blocked `other`.
    async fn is_blocked(&self, owner: UserId, other: UserId) -> AppResult<bool>;

    /// Returns `true` if `owner` lists `other` as a friend.
    async fn are_friends(&self, owner: UserId, other: UserId) -> AppResult<bool>;

    /// Check whether the backing store is reachable.
    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
