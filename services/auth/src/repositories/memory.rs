//! In-process stores following the database-backed contracts
//!
//! Used by the test suites and handy for running the service logic without
//! PostgreSQL or Redis. The stores are independent of each other, so there
//! is no cascade from users to revocations or audit entries.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::error::{StoreError, StoreResult};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuditStore, RevocationStore, UserStore};
use crate::models::{AuditEntry, NewRevocation, NewUser, RevokedToken, UpdateUser, User};
use crate::password::hash_password;

fn hash(password: &str) -> StoreResult<String> {
    hash_password(password)
        .map_err(|e| StoreError::Internal(format!("Failed to hash password: {}", e)))
}

#[derive(Default)]
struct UserTable {
    next_id: i64,
    rows: HashMap<i64, User>,
}

impl UserTable {
    fn conflict(&self, id: Option<i64>, username: &str, email: &str) -> Option<&'static str> {
        let others = self.rows.values().filter(|u| Some(u.id) != id);
        for user in others {
            if user.username == username {
                return Some("users_username_key");
            }
            if user.email == email {
                return Some("users_email_key");
            }
        }
        None
    }
}

/// In-memory user store
#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<UserTable>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: &NewUser) -> StoreResult<User> {
        let password_hash = hash(&new_user.password)?;
        let mut table = self.table.write().await;

        if let Some(key) = table.conflict(None, &new_user.username, &new_user.email) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }

        table.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: table.next_id,
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let table = self.table.read().await;
        Ok(table.rows.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn update(&self, id: i64, changes: &UpdateUser) -> StoreResult<User> {
        let password_hash = changes.password.as_deref().map(hash).transpose()?;
        let mut table = self.table.write().await;

        let current = table.rows.get(&id).ok_or(StoreError::NotFound)?;
        let username = changes.username.as_ref().unwrap_or(&current.username);
        let email = changes.email.as_ref().unwrap_or(&current.email);
        if let Some(key) = table.conflict(Some(id), username, email) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }

        let user = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(password_hash) = password_hash {
            user.password_hash = password_hash;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    /// Removes the user only; unlike the `ON DELETE CASCADE` schema, the
    /// memory revocation and audit stores keep their entries.
    async fn delete(&self, id: i64) -> StoreResult<()> {
        self.table
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

struct StoredRevocation {
    token: RevokedToken,
    request_id: Uuid,
}

/// In-memory revocation store
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: RwLock<HashMap<String, StoredRevocation>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored revocations, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Single revoke attempt tagged with `request_id`
    ///
    /// An entry already written under the same `request_id` counts as
    /// success, so a retried call never reports its own write as a
    /// duplicate.
    pub async fn revoke_attempt(
        &self,
        revocation: &NewRevocation,
        request_id: Uuid,
    ) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(&revocation.jti) {
            if existing.request_id == request_id {
                return Ok(());
            }
            return Err(StoreError::DuplicateKey(revocation.jti.clone()));
        }
        entries.insert(
            revocation.jti.clone(),
            StoredRevocation {
                token: RevokedToken::from_request(revocation, Utc::now()),
                request_id,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, revocation: &NewRevocation) -> StoreResult<()> {
        self.revoke_attempt(revocation, Uuid::new_v4()).await
    }

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        Ok(self.entries.read().await.contains_key(jti))
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, stored| !stored.token.is_expired_at(now));
        Ok((before - entries.len()) as u64)
    }
}

/// In-memory audit store
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far, oldest first
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }
}
