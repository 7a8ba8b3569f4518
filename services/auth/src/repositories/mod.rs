//! Store abstractions and their implementations
//!
//! Each authentication backend is assembled from one [`UserStore`] and one
//! [`RevocationStore`]. PostgreSQL and Redis implementations back the two
//! HTTP paths; the in-memory ones back the tests.

use async_trait::async_trait;
use common::error::StoreResult;

use crate::models::{AuditEntry, NewRevocation, NewUser, UpdateUser, User};

pub mod audit;
pub mod memory;
pub mod redis;
pub mod revocation;
pub mod user;

pub use audit::PgAuditRepository;
pub use memory::{MemoryAuditStore, MemoryRevocationStore, MemoryUserStore};
pub use redis::{RedisRevocationRepository, RedisUserCache};
pub use revocation::PgRevocationRepository;
pub use user::PgUserRepository;

/// Account records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user, hashing the password; `DuplicateKey` if the username
    /// or email is taken
    async fn create(&self, new_user: &NewUser) -> StoreResult<User>;

    /// Look a user up by exact username
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Look a user up by id
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    /// Apply a profile change; `NotFound` if the user does not exist
    async fn update(&self, id: i64, changes: &UpdateUser) -> StoreResult<User>;

    /// Remove a user together with its revocations and audit trail
    async fn delete(&self, id: i64) -> StoreResult<()>;

    /// Check a candidate password against the user's stored hash
    fn verify_password(&self, user: &User, candidate: &str) -> bool {
        crate::password::verify_password(&user.password_hash, candidate)
    }
}

/// Individually revoked token identifiers
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record a revocation; `DuplicateKey` if the jti is already revoked
    async fn revoke(&self, revocation: &NewRevocation) -> StoreResult<()>;

    /// Whether the jti has been revoked
    async fn is_revoked(&self, jti: &str) -> StoreResult<bool>;

    /// Drop revocations whose token has expired, returning how many went
    async fn purge_expired(&self) -> StoreResult<u64>;
}

/// Destination of the audit writer
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one entry
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()>;
}
