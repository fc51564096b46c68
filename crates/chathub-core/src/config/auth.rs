//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Credential validation settings.
///
/// Tokens are issued by the auth service; the hub only needs the shared
/// secret and issuer to validate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for JWT signing (HMAC-SHA256).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Expected `iss` claim.
    #[serde(default = "default_issuer")]
    pub jwt_issuer: String,
    /// Token TTL in hours, used when issuing tokens.
    #[serde(default = "default_ttl")]
    pub jwt_ttl_hours: u64,
    /// Allowed clock skew in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_issuer: default_issuer(),
            jwt_ttl_hours: default_ttl(),
            leeway_seconds: default_leeway(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_issuer() -> String {
    "smartChat".to_string()
}

fn default_ttl() -> u64 {
    72
}

fn default_leeway() -> u64 {
    5
}
