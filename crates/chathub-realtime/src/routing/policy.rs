//! Who may deliver to whom.

use std::sync::Arc;

use tracing::warn;

use chathub_core::result::AppResult;
use chathub_core::traits::RelationshipDirectory;
use chathub_core::types::UserId;

/// How a message reaches a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryScope {
    /// Addressed to the target by name (direct or group).
    Personal,
    /// Reaches the target because they are online.
    Broadcast,
}

/// Block and friendship rules applied to every (sender, target) pair.
///
/// Delivery is refused when either party has blocked the other. Personal
/// messages may additionally require a friendship. A failed lookup refuses.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    directory: Arc<dyn RelationshipDirectory>,
    require_friendship: bool,
}

impl DeliveryPolicy {
    pub fn new(directory: Arc<dyn RelationshipDirectory>, require_friendship: bool) -> Self {
        Self {
            directory,
            require_friendship,
        }
    }

    pub fn directory(&self) -> &Arc<dyn RelationshipDirectory> {
        &self.directory
    }

    /// Whether `sender` may deliver to `target`.
    pub async fn permits(&self, sender: UserId, target: UserId, scope: DeliveryScope) -> bool {
        match self.check(sender, target, scope).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(
                    sender = %sender,
                    target = %target,
                    error = %e,
                    transient = e.is_transient(),
                    "Relationship lookup failed, refusing delivery"
                );
                false
            }
        }
    }

    async fn check(&self, sender: UserId, target: UserId, scope: DeliveryScope) -> AppResult<bool> {
        if self.directory.is_blocked(target, sender).await? {
            return Ok(false);
        }
        if self.directory.is_blocked(sender, target).await? {
            return Ok(false);
        }
        if scope == DeliveryScope::Personal && self.require_friendship {
            return self.directory.are_friends(sender, target).await;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chathub_core::error::AppError;
    use chathub_database::MemoryRelationshipDirectory;

    use super::*;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl RelationshipDirectory for Unreachable {
        async fn is_blocked(&self, _owner: UserId, _other: UserId) -> AppResult<bool> {
            Err(AppError::database("connection refused"))
        }

        async fn are_friends(&self, _owner: UserId, _other: UserId) -> AppResult<bool> {
            Err(AppError::database("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_block_applies_in_both_directions() {
        let directory = Arc::new(MemoryRelationshipDirectory::new());
        directory.block(UserId(2), UserId(1));
        let policy = DeliveryPolicy::new(directory, false);

        assert!(!policy.permits(UserId(1), UserId(2), DeliveryScope::Personal).await);
        assert!(!policy.permits(UserId(2), UserId(1), DeliveryScope::Broadcast).await);
        assert!(policy.permits(UserId(1), UserId(3), DeliveryScope::Personal).await);
    }

    #[tokio::test]
    async fn test_friendship_only_for_personal_messages() {
        let directory = Arc::new(MemoryRelationshipDirectory::new());
        directory.add_friend(UserId(1), UserId(2));
        let policy = DeliveryPolicy::new(directory, true);

        assert!(policy.permits(UserId(1), UserId(2), DeliveryScope::Personal).await);
        assert!(!policy.permits(UserId(1), UserId(3), DeliveryScope::Personal).await);
        assert!(policy.permits(UserId(1), UserId(3), DeliveryScope::Broadcast).await);
    }

    #[tokio::test]
    async fn test_lookup_failure_refuses() {
        let policy = DeliveryPolicy::new(Arc::new(Unreachable), false);
        assert!(!policy.permits(UserId(1), UserId(2), DeliveryScope::Broadcast).await);
    }
}
