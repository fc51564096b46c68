//! JWT token creation.
//!
//! Production tokens come from the auth service; this encoder mints
//! compatible tokens for local tooling and tests.

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};

use chathub_core::config::AuthConfig;
use chathub_core::error::AppError;
use chathub_core::types::UserId;

use super::claims::Claims;

/// Creates signed HS256 tokens in the auth service's format.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// Issuer written into every token.
    issuer: String,
    /// Token TTL in hours.
    ttl_hours: i64,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("issuer", &self.issuer)
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            ttl_hours: config.jwt_ttl_hours as i64,
        }
    }

    /// Generates a token for the given user with the configured TTL.
    pub fn generate_token(&self, user_id: UserId) -> Result<String, AppError> {
        self.generate_token_with_ttl(user_id, chrono::Duration::hours(self.ttl_hours))
    }

    /// Generates a token that expires `ttl` from now.
    pub fn generate_token_with_ttl(
        &self,
        user_id: UserId,
        ttl: chrono::Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))
    }
}
