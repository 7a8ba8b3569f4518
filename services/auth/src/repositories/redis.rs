//! Redis-backed stores
//!
//! [`RedisUserCache`] is a cache-aside layer in front of another user
//! store: reads try `user:{username}` first and fill it on a miss, writes go
//! to the inner store and invalidate. [`RedisRevocationRepository`] keeps
//! one `revoked_token:{jti}` key per revocation, expiring with the token.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::cache::RedisPool;
use common::error::{StoreError, StoreResult};
use common::retry::StorePolicy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{RevocationStore, UserStore};
use crate::models::{NewRevocation, NewUser, RevokedToken, UpdateUser, User};

fn user_key(username: &str) -> String {
    format!("user:{}", username)
}

fn revocation_key(jti: &str) -> String {
    format!("revoked_token:{}", jti)
}

/// Cache-aside user store
#[derive(Clone)]
pub struct RedisUserCache {
    inner: Arc<dyn UserStore>,
    redis: RedisPool,
    ttl_seconds: u64,
    policy: StorePolicy,
}

impl RedisUserCache {
    /// Wrap `inner` with a Redis cache whose entries live `ttl_seconds`
    pub fn new(
        inner: Arc<dyn UserStore>,
        redis: RedisPool,
        ttl_seconds: u64,
        policy: StorePolicy,
    ) -> Self {
        Self {
            inner,
            redis,
            ttl_seconds,
            policy,
        }
    }

    async fn cached(&self, username: &str) -> Option<User> {
        let redis = &self.redis;
        let key = user_key(username);
        let key = key.as_str();

        let raw = match self
            .policy
            .run("get cached user", move || async move { redis.get(key).await })
            .await
        {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("User cache read failed, falling back to database: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn fill(&self, user: &User) {
        let raw = match serde_json::to_string(user) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode user {} for cache: {}", user.id, e);
                return;
            }
        };

        let redis = &self.redis;
        let key = user_key(&user.username);
        let (key, raw, ttl) = (key.as_str(), raw.as_str(), self.ttl_seconds);

        if let Err(e) = self
            .policy
            .run("cache user", move || async move {
                redis.set(key, raw, Some(ttl)).await
            })
            .await
        {
            warn!("Failed to cache user {}: {}", user.id, e);
        }
    }

    async fn invalidate(&self, username: &str) {
        let redis = &self.redis;
        let key = user_key(username);
        let key = key.as_str();

        if let Err(e) = self
            .policy
            .run("invalidate cached user", move || async move {
                redis.delete(key).await
            })
            .await
        {
            // A stale entry survives at most one TTL.
            warn!("Failed to invalidate cached user {}: {}", username, e);
        }
    }
}

#[async_trait]
impl UserStore for RedisUserCache {
    async fn create(&self, new_user: &NewUser) -> StoreResult<User> {
        self.inner.create(new_user).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        if let Some(user) = self.cached(username).await {
            debug!("User cache hit: {}", username);
            return Ok(Some(user));
        }

        let user = self.inner.find_by_username(username).await?;
        if let Some(user) = &user {
            self.fill(user).await;
        }
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn update(&self, id: i64, changes: &UpdateUser) -> StoreResult<User> {
        let previous = self.inner.find_by_id(id).await?.ok_or(StoreError::NotFound)?;
        let updated = self.inner.update(id, changes).await?;

        self.invalidate(&previous.username).await;
        if updated.username != previous.username {
            self.invalidate(&updated.username).await;
        }
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let existing = self.inner.find_by_id(id).await?;
        self.inner.delete(id).await?;

        if let Some(user) = existing {
            self.invalidate(&user.username).await;
        }
        Ok(())
    }
}

/// Value stored under `revoked_token:{jti}`
#[derive(Debug, Serialize, Deserialize)]
struct RevocationValue {
    #[serde(flatten)]
    token: RevokedToken,
    request_id: Uuid,
}

/// Revocation store keeping one expiring key per revoked jti
#[derive(Clone)]
pub struct RedisRevocationRepository {
    redis: RedisPool,
    policy: StorePolicy,
}

impl RedisRevocationRepository {
    /// Create a new Redis revocation repository
    pub fn new(redis: RedisPool, policy: StorePolicy) -> Self {
        Self { redis, policy }
    }

    /// Single SET NX attempt tagged with `request_id`
    ///
    /// When the key already exists, its stored `request_id` decides between
    /// success (an earlier attempt of this call landed) and `DuplicateKey`.
    pub async fn revoke_attempt(
        &self,
        revocation: &NewRevocation,
        request_id: Uuid,
    ) -> StoreResult<()> {
        let now = Utc::now();
        let value = RevocationValue {
            token: RevokedToken::from_request(revocation, now),
            request_id,
        };
        let raw = serde_json::to_string(&value)
            .map_err(|e| StoreError::Internal(format!("Failed to encode revocation: {}", e)))?;

        // Redis refuses a zero TTL; an already expired token still gets a
        // short-lived entry so the write is observable.
        let ttl = (revocation.expires_at - now).num_seconds().max(1) as u64;
        let key = revocation_key(&revocation.jti);

        if self.redis.set_nx(&key, &raw, ttl).await? {
            debug!(jti = %revocation.jti, ttl, "Token revoked in Redis");
            return Ok(());
        }

        let owner = self
            .redis
            .get(&key)
            .await?
            .and_then(|raw| serde_json::from_str::<RevocationValue>(&raw).ok())
            .map(|existing| existing.request_id);

        if owner == Some(request_id) {
            debug!(jti = %revocation.jti, "Revocation already written by this request");
            return Ok(());
        }
        Err(StoreError::DuplicateKey(revocation.jti.clone()))
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationRepository {
    async fn revoke(&self, revocation: &NewRevocation) -> StoreResult<()> {
        // One id for every retry of this call.
        let request_id = Uuid::new_v4();

        self.policy
            .run("revoke token", move || async move {
                self.revoke_attempt(revocation, request_id).await
            })
            .await
    }

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        let redis = &self.redis;
        let key = revocation_key(jti);
        let key = key.as_str();

        self.policy
            .run("check revocation", move || async move { redis.exists(key).await })
            .await
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        // Keys carry the token's remaining lifetime as TTL; Redis drops them.
        Ok(0)
    }
}
