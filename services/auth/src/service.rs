//! Token lifecycle: login, validation, logout, refresh rotation, revocation
//!
//! An [`AuthService`] binds one user store and one revocation store to the
//! shared JWT service and audit sink. The server runs two of them side by
//! side, one per backend.
//!
//! Validation order is fixed: signature, issuer and expiry first (no I/O),
//! then token type, then the revocation lookup. Logout and refresh write
//! their revocations before returning, so a token is dead by the time the
//! client sees success.

use std::fmt;
use std::sync::Arc;

use common::error::StoreError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::AuditSink;
use crate::error::{AuthError, AuthResult};
use crate::jwt::{Claims, JwtService, TokenPair};
use crate::models::{AuditAction, NewRevocation, NewUser, RequestContext, TokenType, User};
use crate::repositories::{RevocationStore, UserStore};
use crate::validation::validate_new_user;

/// Which storage path a service instance runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sql,
    Redis,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sql => "sql",
            Backend::Redis => "redis",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful login or refresh
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

/// Authentication flows over one storage backend
#[derive(Clone)]
pub struct AuthService {
    backend: Backend,
    users: Arc<dyn UserStore>,
    revocations: Arc<dyn RevocationStore>,
    jwt: JwtService,
    audit: AuditSink,
}

impl AuthService {
    pub fn new(
        backend: Backend,
        users: Arc<dyn UserStore>,
        revocations: Arc<dyn RevocationStore>,
        jwt: JwtService,
        audit: AuditSink,
    ) -> Self {
        Self {
            backend,
            users,
            revocations,
            jwt,
            audit,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Validate and create a new account
    pub async fn register(&self, new_user: &NewUser) -> AuthResult<User> {
        validate_new_user(new_user).map_err(AuthError::Validation)?;

        let user = self.users.create(new_user).await?;
        info!(backend = %self.backend, user_id = user.id, "Registered user {}", user.username);
        Ok(user)
    }

    /// Check credentials and issue a token pair
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ctx: &RequestContext,
    ) -> AuthResult<Session> {
        let user = match self.users.find_by_username(username).await? {
            Some(user) => user,
            None => {
                crate::password::verify_against_dummy(password);
                warn!(backend = %self.backend, "Login for unknown user: {}", username);
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.users.verify_password(&user, password) {
            warn!(backend = %self.backend, user_id = user.id, "Wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let tokens = self.jwt.issue_pair(user.id)?;
        self.audit.record(
            user.id,
            AuditAction::Login,
            Some(&tokens.access.claims.jti),
            ctx,
        );

        debug!(backend = %self.backend, user_id = user.id, "Login succeeded");
        Ok(Session { user, tokens })
    }

    /// Run the validation protocol for a token of the expected type
    pub async fn authenticate(&self, token: &str, expected: TokenType) -> AuthResult<Claims> {
        let claims = self.jwt.decode(token)?;

        if claims.token_type != expected {
            debug!(
                "Expected {} token, got {} (jti {})",
                expected, claims.token_type, claims.jti
            );
            return Err(AuthError::InvalidToken);
        }

        if self.revocations.is_revoked(&claims.jti).await? {
            debug!(jti = %claims.jti, "Rejected revoked token");
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Revoke the caller's access token, and its refresh token if given
    pub async fn logout(
        &self,
        access: &Claims,
        refresh_token: Option<&str>,
        ctx: &RequestContext,
    ) -> AuthResult<()> {
        // Check the refresh token before revoking anything so a bad request
        // leaves no partial state.
        let refresh = match refresh_token {
            Some(token) => {
                let claims = self.jwt.decode_ignoring_expiry(token)?;
                if claims.token_type != TokenType::Refresh || claims.sub != access.sub {
                    return Err(AuthError::InvalidToken);
                }
                Some(claims)
            }
            None => None,
        };

        self.revoke_claims(access).await?;
        if let Some(claims) = &refresh {
            self.revoke_claims(claims).await?;
        }

        self.audit
            .record(access.sub, AuditAction::Logout, Some(&access.jti), ctx);
        info!(backend = %self.backend, user_id = access.sub, "User logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new pair, revoking the old one
    pub async fn refresh(&self, refresh_token: &str, ctx: &RequestContext) -> AuthResult<Session> {
        let claims = self.authenticate(refresh_token, TokenType::Refresh).await?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        // Two concurrent refreshes with one token: only the first revoke
        // lands, the other caller is treated as replaying a used token.
        if !self.revoke_claims(&claims).await? {
            return Err(AuthError::RevokedToken);
        }

        let tokens = self.jwt.issue_pair(user.id)?;
        self.audit
            .record(user.id, AuditAction::Refresh, Some(&claims.jti), ctx);

        Ok(Session { user, tokens })
    }

    /// Revoke one of the caller's own tokens
    ///
    /// The target must carry a valid signature; expiry is not checked.
    pub async fn revoke(
        &self,
        caller: &Claims,
        token: &str,
        ctx: &RequestContext,
    ) -> AuthResult<Claims> {
        let target = self.jwt.decode_ignoring_expiry(token)?;
        if target.sub != caller.sub {
            warn!(
                user_id = caller.sub,
                owner = target.sub,
                "Refusing to revoke another user's token"
            );
            return Err(AuthError::InvalidToken);
        }

        self.revoke_claims(&target).await?;
        self.audit
            .record(caller.sub, AuditAction::Revoke, Some(&target.jti), ctx);

        Ok(target)
    }

    /// Load the account behind a validated token
    pub async fn profile(&self, claims: &Claims) -> AuthResult<User> {
        self.users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Write the revocation for `claims`
    ///
    /// Returns `false` when the jti was already revoked; that outcome is
    /// not an error.
    async fn revoke_claims(&self, claims: &Claims) -> AuthResult<bool> {
        let revocation = NewRevocation {
            jti: claims.jti.clone(),
            token_type: claims.token_type,
            user_id: claims.sub,
            expires_at: claims.expires_at(),
        };

        match self.revocations.revoke(&revocation).await {
            Ok(()) => Ok(true),
            Err(StoreError::DuplicateKey(_)) => {
                debug!(jti = %claims.jti, "Token already revoked");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
