//! JWT service for token generation and verification
//!
//! Tokens are signed with HS256 (shared secret) or RS256 (PEM key pair).
//! Every token carries a UUID v4 `jti`, which is the key used by the
//! revocation stores. This module only answers "is this token well formed,
//! correctly signed, unexpired and ours"; revocation is checked by the
//! caller afterwards.

use anyhow::Result;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::models::TokenType;

const DEFAULT_ISSUER: &str = "tokenkeep";
const DEFAULT_ACCESS_TOKEN_EXPIRY: u64 = 900;
const DEFAULT_REFRESH_TOKEN_EXPIRY: u64 = 604800;

/// Signing material
#[derive(Clone)]
pub enum JwtKeys {
    /// HS256 shared secret
    Secret(String),
    /// RS256 key pair in PEM format
    Rsa {
        private_key: String,
        public_key: String,
    },
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtKeys::Secret(_) => f.write_str("Secret(..)"),
            JwtKeys::Rsa { .. } => f.write_str("Rsa { .. }"),
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Signing and verification keys
    pub keys: JwtKeys,
    /// Value of the `iss` claim, checked on decode
    pub issuer: String,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// HS256 configuration with default issuer and lifetimes
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            keys: JwtKeys::Secret(secret.into()),
            issuer: DEFAULT_ISSUER.to_string(),
            access_token_expiry: DEFAULT_ACCESS_TOKEN_EXPIRY,
            refresh_token_expiry: DEFAULT_REFRESH_TOKEN_EXPIRY,
        }
    }

    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PRIVATE_KEY` / `JWT_PUBLIC_KEY`: RS256 keys (PEM text or path to a PEM file)
    /// - `JWT_SECRET`: HS256 secret, used when no RSA key pair is configured
    /// - `JWT_ISSUER`: Issuer claim (default: tokenkeep)
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let keys = match (
            std::env::var("JWT_PRIVATE_KEY"),
            std::env::var("JWT_PUBLIC_KEY"),
        ) {
            (Ok(private_key), Ok(public_key)) => JwtKeys::Rsa {
                private_key: read_pem(&private_key)?,
                public_key: read_pem(&public_key)?,
            },
            _ => {
                let secret = std::env::var("JWT_SECRET").map_err(|_| {
                    anyhow::anyhow!("Either JWT_SECRET or JWT_PRIVATE_KEY/JWT_PUBLIC_KEY must be set")
                })?;
                if secret.is_empty() {
                    anyhow::bail!("JWT_SECRET must not be empty");
                }
                JwtKeys::Secret(secret)
            }
        };

        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ACCESS_TOKEN_EXPIRY);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_TOKEN_EXPIRY);

        Ok(JwtConfig {
            keys,
            issuer,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// Accept inline PEM text or a path to a PEM file
fn read_pem(value: &str) -> Result<String> {
    if value.starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }

    std::fs::read_to_string(value)
        .map(|pem| pem.trim().to_string())
        .map_err(|e| anyhow::anyhow!("Failed to read key file {}: {}", value, e))
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: i64,
    /// Unique token identifier, the revocation key
    pub jti: String,
    /// Issuer
    pub iss: String,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

impl Claims {
    /// Expiry as a timestamp, used for revocation rows
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// A signed token together with its claims
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Access and refresh token issued together
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let (encoding_key, decoding_key, algorithm) = match &config.keys {
            JwtKeys::Secret(secret) => (
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
                Algorithm::HS256,
            ),
            JwtKeys::Rsa {
                private_key,
                public_key,
            } => (
                EncodingKey::from_rsa_pem(private_key.as_bytes())?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
                Algorithm::RS256,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(JwtService {
            encoding_key,
            decoding_key,
            algorithm,
            validation,
            config,
        })
    }

    /// Issue a fresh access/refresh pair for a user
    pub fn issue_pair(&self, user_id: i64) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access: self.issue(
                user_id,
                TokenType::Access,
                self.config.access_token_expiry,
            )?,
            refresh: self.issue(
                user_id,
                TokenType::Refresh,
                self.config.refresh_token_expiry,
            )?,
        })
    }

    fn issue(&self, user_id: i64, token_type: TokenType, lifetime: u64) -> AuthResult<IssuedToken> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4().to_string(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now + lifetime as i64,
            token_type,
        };

        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// Sign arbitrary claims with the configured key
    pub fn sign(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify signature, issuer and expiry, returning the claims
    pub fn decode(&self, token: &str) -> AuthResult<Claims> {
        self.decode_with(token, &self.validation)
    }

    /// Verify signature and issuer but accept expired tokens
    ///
    /// Used when revoking a token on behalf of its owner: an expired token
    /// still proves who it belonged to.
    pub fn decode_ignoring_expiry(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = self.validation.clone();
        validation.validate_exp = false;
        self.decode_with(token, &validation)
    }

    fn decode_with(&self, token: &str, validation: &Validation) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                AuthError::InvalidToken
            })
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn service() -> JwtService {
        JwtService::new(JwtConfig::with_secret("unit-test-secret")).unwrap()
    }

    #[test]
    fn test_issue_pair_claims() {
        let jwt = service();
        let pair = jwt.issue_pair(42).unwrap();

        assert_eq!(pair.access.claims.sub, 42);
        assert_eq!(pair.access.claims.token_type, TokenType::Access);
        assert_eq!(pair.refresh.claims.token_type, TokenType::Refresh);
        assert_ne!(pair.access.claims.jti, pair.refresh.claims.jti);
        assert_eq!(
            pair.access.claims.exp - pair.access.claims.iat,
            DEFAULT_ACCESS_TOKEN_EXPIRY as i64
        );
        assert!(Uuid::parse_str(&pair.access.claims.jti).is_ok());

        let decoded = jwt.decode(&pair.access.token).unwrap();
        assert_eq!(decoded, pair.access.claims);
    }

    #[test]
    fn test_tampered_and_foreign_tokens_are_invalid() {
        let jwt = service();
        let pair = jwt.issue_pair(1).unwrap();

        assert!(matches!(jwt.decode("not-a-token"), Err(AuthError::InvalidToken)));

        let other = JwtService::new(JwtConfig::with_secret("another-secret")).unwrap();
        assert!(matches!(
            other.decode(&pair.access.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_issuer_is_invalid() {
        let jwt = service();
        let mut config = JwtConfig::with_secret("unit-test-secret");
        config.issuer = "someone-else".to_string();
        let foreign = JwtService::new(config).unwrap();

        let pair = foreign.issue_pair(1).unwrap();
        assert!(matches!(
            jwt.decode(&pair.access.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token() {
        let jwt = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: 7,
            jti: Uuid::new_v4().to_string(),
            iss: DEFAULT_ISSUER.to_string(),
            iat: now - 120,
            exp: now - 60,
            token_type: TokenType::Access,
        };
        let token = jwt.sign(&claims).unwrap();

        assert!(matches!(jwt.decode(&token), Err(AuthError::InvalidToken)));
        assert_eq!(jwt.decode_ignoring_expiry(&token).unwrap(), claims);
    }

    #[test]
    fn test_expires_at_matches_exp() {
        let pair = service().issue_pair(3).unwrap();
        let claims = pair.refresh.claims;
        assert_eq!(claims.expires_at().timestamp(), claims.exp);
    }

    #[test]
    #[serial]
    fn test_jwt_config_from_env() {
        unsafe {
            std::env::remove_var("JWT_PRIVATE_KEY");
            std::env::remove_var("JWT_PUBLIC_KEY");
            std::env::set_var("JWT_SECRET", "env-secret");
            std::env::set_var("JWT_ACCESS_TOKEN_EXPIRY", "60");
        }

        let config = JwtConfig::from_env().unwrap();
        assert!(matches!(config.keys, JwtKeys::Secret(ref s) if s == "env-secret"));
        assert_eq!(config.access_token_expiry, 60);
        assert_eq!(config.refresh_token_expiry, DEFAULT_REFRESH_TOKEN_EXPIRY);
        assert_eq!(config.issuer, DEFAULT_ISSUER);

        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("JWT_ACCESS_TOKEN_EXPIRY");
        }

        assert!(JwtConfig::from_env().is_err());
    }
}
