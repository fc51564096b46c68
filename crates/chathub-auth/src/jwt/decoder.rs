//! JWT token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use chathub_core::config::AuthConfig;
use chathub_core::error::AppError;

use super::claims::Claims;

/// Validates access tokens issued by the auth service.
#[derive(Clone)]
pub struct JwtDecoder {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;
        validation.set_issuer(&[config.jwt_issuer.as_str()]);

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates a token string.
    ///
    /// Checks signature, expiration, and issuer.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::authentication("Token has expired")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        AppError::authentication("Invalid token format")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AppError::authentication("Invalid token signature")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                        AppError::authentication("Invalid token issuer")
                    }
                    _ => AppError::authentication(format!("Token validation failed: {e}")),
                }
            })?;

        tracing::trace!(user_id = %token_data.claims.user_id, "Token validated");
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chathub_core::error::ErrorKind;
    use chathub_core::types::UserId;

    use super::*;
    use crate::jwt::encoder::JwtEncoder;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_valid_token_resolves_user() {
        let cfg = config("secret-a");
        let token = JwtEncoder::new(&cfg).generate_token(UserId(17)).unwrap();

        let claims = JwtDecoder::new(&cfg).decode(&token).unwrap();
        assert_eq!(claims.user_id(), UserId(17));
        assert_eq!(claims.iss, "smartChat");
        assert!(claims.expires_at() > chrono::Utc::now());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = JwtEncoder::new(&config("secret-a"))
            .generate_token(UserId(1))
            .unwrap();

        let err = JwtDecoder::new(&config("secret-b"))
            .decode(&token)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert!(err.message.contains("signature"));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let cfg = config("secret-a");
        let token = JwtEncoder::new(&cfg)
            .generate_token_with_ttl(UserId(1), chrono::Duration::hours(-1))
            .unwrap();

        let err = JwtDecoder::new(&cfg).decode(&token).unwrap_err();
        assert_eq!(err.message, "Token has expired");
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let issuing = AuthConfig {
            jwt_issuer: "someone-else".to_string(),
            ..config("secret-a")
        };
        let token = JwtEncoder::new(&issuing).generate_token(UserId(1)).unwrap();

        let err = JwtDecoder::new(&config("secret-a"))
            .decode(&token)
            .unwrap_err();
        assert_eq!(err.message, "Invalid token issuer");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = JwtDecoder::new(&config("secret-a"))
            .decode("not.a.jwt")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }
}
