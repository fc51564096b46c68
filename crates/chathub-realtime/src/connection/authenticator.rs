//! Connection authentication: resolves a bearer token to a user before the
//! connection is admitted to the hub.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use chathub_auth::jwt::JwtDecoder;
use chathub_core::error::AppError;
use chathub_core::types::UserId;

/// Identity established for a connection about to be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedConnection {
    /// User ID.
    pub user_id: UserId,
    /// When the presented credential stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// Authenticates WebSocket connections using JWT tokens.
#[derive(Clone)]
pub struct WsAuthenticator {
    /// JWT decoder.
    decoder: Arc<JwtDecoder>,
}

impl std::fmt::Debug for WsAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsAuthenticator").finish()
    }
}

impl WsAuthenticator {
    /// Creates a new WebSocket authenticator.
    pub fn new(decoder: Arc<JwtDecoder>) -> Self {
        Self { decoder }
    }

    /// Validate a raw token, with or without a `Bearer ` prefix.
    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedConnection, AppError> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(AppError::authentication("Missing credential"));
        }

        let claims = self.decoder.decode(token)?;
        Ok(AuthenticatedConnection {
            user_id: claims.user_id(),
            expires_at: claims.expires_at(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chathub_auth::jwt::JwtEncoder;
    use chathub_core::config::AuthConfig;
    use chathub_core::error::ErrorKind;

    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "hub-test-secret".to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_accepts_bare_and_prefixed_tokens() {
        let token = JwtEncoder::new(&config()).generate_token(UserId(42)).unwrap();
        let auth = WsAuthenticator::new(Arc::new(JwtDecoder::new(&config())));

        assert_eq!(auth.authenticate(&token).unwrap().user_id, UserId(42));
        assert_eq!(
            auth.authenticate(&format!("Bearer {token}")).unwrap().user_id,
            UserId(42)
        );
    }

    #[test]
    fn test_rejects_missing_credential() {
        let auth = WsAuthenticator::new(Arc::new(JwtDecoder::new(&config())));
        let err = auth.authenticate("  ").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }
}
