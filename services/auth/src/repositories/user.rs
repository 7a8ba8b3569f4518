//! User repository for database operations

use async_trait::async_trait;
use common::error::{StoreError, StoreResult};
use common::retry::StorePolicy;
use sqlx::PgPool;
use tracing::info;

use super::UserStore;
use crate::models::{NewUser, UpdateUser, User};
use crate::password::hash_password;

/// User repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
    policy: StorePolicy,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool, policy: StorePolicy) -> Self {
        Self { pool, policy }
    }
}

fn hash(password: &str) -> StoreResult<String> {
    hash_password(password)
        .map_err(|e| StoreError::Internal(format!("Failed to hash password: {}", e)))
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn create(&self, new_user: &NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.username);

        let password_hash = hash(&new_user.password)?;
        let pool = &self.pool;
        let password_hash = password_hash.as_str();

        self.policy
            .run("create user", move || async move {
                let user = sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (username, email, password_hash)
                    VALUES ($1, $2, $3)
                    RETURNING id, username, email, password_hash, is_active, created_at, updated_at
                    "#,
                )
                .bind(&new_user.username)
                .bind(&new_user.email)
                .bind(password_hash)
                .fetch_one(pool)
                .await?;
                Ok::<_, StoreError>(user)
            })
            .await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let pool = &self.pool;

        self.policy
            .run("find user by username", move || async move {
                let user = sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, email, password_hash, is_active, created_at, updated_at
                    FROM users
                    WHERE username = $1
                    "#,
                )
                .bind(username)
                .fetch_optional(pool)
                .await?;
                Ok::<_, StoreError>(user)
            })
            .await
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let pool = &self.pool;

        self.policy
            .run("find user by id", move || async move {
                let user = sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, email, password_hash, is_active, created_at, updated_at
                    FROM users
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(pool)
                .await?;
                Ok::<_, StoreError>(user)
            })
            .await
    }

    async fn update(&self, id: i64, changes: &UpdateUser) -> StoreResult<User> {
        info!("Updating user: {}", id);

        let password_hash = changes.password.as_deref().map(hash).transpose()?;
        let pool = &self.pool;
        let password_hash = password_hash.as_deref();

        self.policy
            .run("update user", move || async move {
                sqlx::query_as::<_, User>(
                    r#"
                    UPDATE users
                    SET username = COALESCE($2, username),
                        email = COALESCE($3, email),
                        password_hash = COALESCE($4, password_hash),
                        is_active = COALESCE($5, is_active),
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING id, username, email, password_hash, is_active, created_at, updated_at
                    "#,
                )
                .bind(id)
                .bind(changes.username.as_deref())
                .bind(changes.email.as_deref())
                .bind(password_hash)
                .bind(changes.is_active)
                .fetch_optional(pool)
                .await?
                .ok_or(StoreError::NotFound)
            })
            .await
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        info!("Deleting user: {}", id);

        let pool = &self.pool;

        self.policy
            .run("delete user", move || async move {
                let result = sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound);
                }
                Ok::<_, StoreError>(())
            })
            .await
    }
}
