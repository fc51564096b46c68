//! Relationship provider that dispatches to the configured backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use chathub_core::config::AppConfig;
use chathub_core::error::AppError;
use chathub_core::result::AppResult;
use chathub_core::traits::RelationshipDirectory;
use chathub_core::types::UserId;

use crate::connection::DatabasePool;
use crate::memory::MemoryRelationshipDirectory;
use crate::repositories::RelationshipRepository;

/// Wraps the relationship directory selected by configuration.
#[derive(Debug, Clone)]
pub struct RelationshipProvider {
    inner: Arc<dyn RelationshipDirectory>,
}

impl RelationshipProvider {
    /// Create a provider from configuration.
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let inner: Arc<dyn RelationshipDirectory> = match config.relationships.provider.as_str() {
            "postgres" => {
                info!("Using PostgreSQL relationship directory");
                let db = DatabasePool::connect_lazy(&config.database)?;
                Arc::new(RelationshipRepository::new(db))
            }
            "memory" => {
                info!("Using in-memory relationship directory");
                Arc::new(MemoryRelationshipDirectory::new())
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown relationship provider: '{other}'. Supported: postgres, memory"
                )));
            }
        };

        Ok(Self { inner })
    }
}

#[async_trait]
impl RelationshipDirectory for RelationshipProvider {
    async fn is_blocked(&self, owner: UserId, other: UserId) -> AppResult<bool> {
        self.inner.is_blocked(owner, other).await
    }

    async fn are_friends(&self, owner: UserId, other: UserId) -> AppResult<bool> {
        self.inner.are_friends(owner, other).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use chathub_core::error::ErrorKind;

    use super::*;

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut config = AppConfig::default();
        config.relationships.provider = "ldap".to_string();

        let err = RelationshipProvider::new(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_memory_provider_answers_lookups() {
        let mut config = AppConfig::default();
        config.relationships.provider = "memory".to_string();

        let provider = RelationshipProvider::new(&config).unwrap();
        assert!(!provider.is_blocked(UserId(1), UserId(2)).await.unwrap());
        assert!(provider.health_check().await.unwrap());
    }
}
