//! Friend and block lookups against the profile service's schema.
//!
//! The profile service owns the tables:
//!
//! - `profiles(id, user_id, ...)`
//! - `friends(profile_id, friend_id)`
//! - `blocked(profile_id, blocked_id)`
//!
//! Both link tables reference `profiles.id`, so every lookup translates
//! user ids through `profiles.user_id`.

use async_trait::async_trait;

use chathub_core::error::{AppError, ErrorKind};
use chathub_core::result::AppResult;
use chathub_core::traits::RelationshipDirectory;
use chathub_core::types::UserId;

use crate::connection::DatabasePool;

const IS_BLOCKED_SQL: &str = r#"
SELECT EXISTS (
    SELECT 1
    FROM blocked b
    JOIN profiles owner ON owner.id = b.profile_id
    JOIN profiles other ON other.id = b.blocked_id
    WHERE owner.user_id = $1 AND other.user_id = $2
)"#;

const ARE_FRIENDS_SQL: &str = r#"
SELECT EXISTS (
    SELECT 1
    FROM friends f
    JOIN profiles owner ON owner.id = f.profile_id
    JOIN profiles other ON other.id = f.friend_id
    WHERE owner.user_id = $1 AND other.user_id = $2
)"#;

/// Read-only repository over the friend and block tables.
#[derive(Debug, Clone)]
pub struct RelationshipRepository {
    db: DatabasePool,
}

impl RelationshipRepository {
    /// Create a new relationship repository.
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    async fn exists(&self, sql: &str, owner: UserId, other: UserId, what: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(sql)
            .bind(owner.as_i64())
            .bind(other.as_i64())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, format!("Failed to check {what}"), e)
            })
    }
}

#[async_trait]
impl RelationshipDirectory for RelationshipRepository {
    async fn is_blocked(&self, owner: UserId, other: UserId) -> AppResult<bool> {
        self.exists(IS_BLOCKED_SQL, owner, other, "block list").await
    }

    async fn are_friends(&self, owner: UserId, other: UserId) -> AppResult<bool> {
        self.exists(ARE_FRIENDS_SQL, owner, other, "friend list").await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.db.health_check().await
    }
}
