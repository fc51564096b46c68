//! Relationship directory configuration.

use serde::{Deserialize, Serialize};

/// Selects where friend/block lookups are answered from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConfig {
    /// Provider type: `"postgres"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
        }
    }
}

fn default_provider() -> String {
    "postgres".to_string()
}
