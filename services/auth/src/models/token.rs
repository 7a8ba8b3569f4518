//! Token types and revocation records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

impl TokenType {
    /// Value stored in the `token_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Revocation request written at logout, refresh rotation or explicit revoke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRevocation {
    pub jti: String,
    pub token_type: TokenType,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Stored revocation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokedToken {
    pub jti: String,
    pub token_type: TokenType,
    pub user_id: i64,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RevokedToken {
    /// Stamp a revocation request with the time it was recorded
    pub fn from_request(request: &NewRevocation, revoked_at: DateTime<Utc>) -> Self {
        Self {
            jti: request.jti.clone(),
            token_type: request.token_type,
            user_id: request.user_id,
            revoked_at,
            expires_at: request.expires_at,
        }
    }

    /// Whether the token would be rejected as expired anyway
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
