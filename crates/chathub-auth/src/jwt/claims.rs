//! JWT claims structure shared with the auth service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chathub_core::types::UserId;

/// Claims payload embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user.
    pub user_id: UserId,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Token issuer.
    pub iss: String,
}

impl Claims {
    /// Returns the user ID claim.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}
