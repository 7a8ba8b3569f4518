//! Database bootstrap: database creation, tables, indexes and the sample user

use anyhow::{Context, Result};
use common::database::DatabaseConfig;
use common::error::{StoreError, StoreResult};
use sqlx::{Connection, PgConnection, PgPool};
use tracing::info;

use crate::models::NewUser;
use crate::repositories::UserStore;

/// Idempotent DDL, applied in order
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(50) UNIQUE NOT NULL,
        email VARCHAR(100) UNIQUE NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS revoked_tokens (
        id BIGSERIAL PRIMARY KEY,
        jti VARCHAR(36) UNIQUE NOT NULL,
        token_type VARCHAR(16) NOT NULL CHECK (token_type IN ('access', 'refresh')),
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        revoked_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        expires_at TIMESTAMPTZ NOT NULL,
        request_id UUID
    )
    "#,
    "ALTER TABLE revoked_tokens ADD COLUMN IF NOT EXISTS request_id UUID",
    r#"
    CREATE TABLE IF NOT EXISTS token_audit (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        action VARCHAR(16) NOT NULL CHECK (action IN ('login', 'logout', 'refresh', 'revoke')),
        token_jti VARCHAR(36),
        ip_address VARCHAR(45),
        user_agent TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)",
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
    "CREATE INDEX IF NOT EXISTS idx_revoked_tokens_jti ON revoked_tokens(jti)",
    "CREATE INDEX IF NOT EXISTS idx_revoked_tokens_user_id ON revoked_tokens(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_revoked_tokens_expires_at ON revoked_tokens(expires_at)",
    "CREATE INDEX IF NOT EXISTS idx_token_audit_user_id ON token_audit(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_token_audit_created_at ON token_audit(created_at)",
];

/// Quote a PostgreSQL identifier
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Create the application database if it does not exist yet
///
/// Returns `true` when the database was created by this call.
pub async fn ensure_database(config: &DatabaseConfig) -> Result<bool> {
    let mut conn = PgConnection::connect_with(&config.maintenance_options())
        .await
        .context("Failed to connect to the maintenance database")?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&config.name)
            .fetch_one(&mut conn)
            .await?;

    let created = if exists {
        info!("Database {} already exists", config.name);
        false
    } else {
        let statement = format!("CREATE DATABASE {}", quote_identifier(&config.name));
        sqlx::query(&statement)
            .execute(&mut conn)
            .await
            .with_context(|| format!("Failed to create database {}", config.name))?;
        info!("Created database {}", config.name);
        true
    };

    conn.close().await?;
    Ok(created)
}

/// Create tables and indexes
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA_STATEMENTS.iter().copied() {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Schema ready ({} statements applied)", SCHEMA_STATEMENTS.len());
    Ok(())
}

/// Account created by the bootstrap
#[derive(Debug, Clone)]
pub struct SeedUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for SeedUser {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "admin123".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    AlreadyPresent,
}

/// Create the seed user unless one with the same username exists
///
/// An existing account counts as success and is left untouched; its
/// password is not reset.
pub async fn seed_user(store: &dyn UserStore, seed: &SeedUser) -> StoreResult<SeedOutcome> {
    if store.find_by_username(&seed.username).await?.is_some() {
        info!("User '{}' already exists", seed.username);
        return Ok(SeedOutcome::AlreadyPresent);
    }

    let new_user = NewUser {
        username: seed.username.clone(),
        email: seed.email.clone(),
        password: seed.password.clone(),
    };

    match store.create(&new_user).await {
        Ok(user) => {
            info!(user_id = user.id, "Created user '{}'", user.username);
            Ok(SeedOutcome::Created)
        }
        // Lost a race with another bootstrap
        Err(StoreError::DuplicateKey(key)) if key.contains("username") => {
            info!("User '{}' already exists", seed.username);
            Ok(SeedOutcome::AlreadyPresent)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryUserStore;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("jwt_auth"), "\"jwt_auth\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_schema_covers_every_table() {
        for table in ["users", "revoked_tokens", "token_audit"] {
            let create = format!("CREATE TABLE IF NOT EXISTS {} ", table);
            assert!(SCHEMA_STATEMENTS.iter().any(|s| s.contains(&create)), "{}", table);
        }
        assert!(SCHEMA_STATEMENTS.iter().all(|s| s.contains("IF NOT EXISTS")));
    }

    #[test]
    fn test_revocations_carry_request_id() {
        let table = SCHEMA_STATEMENTS
            .iter()
            .position(|s| s.contains("CREATE TABLE IF NOT EXISTS revoked_tokens "))
            .unwrap();
        let alter = SCHEMA_STATEMENTS
            .iter()
            .position(|s| s.contains("ADD COLUMN IF NOT EXISTS request_id"))
            .unwrap();

        assert!(SCHEMA_STATEMENTS[table].contains("request_id UUID"));
        assert!(alter > table);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryUserStore::new();
        let seed = SeedUser::default();

        assert_eq!(seed_user(&store, &seed).await.unwrap(), SeedOutcome::Created);
        assert_eq!(
            seed_user(&store, &seed).await.unwrap(),
            SeedOutcome::AlreadyPresent
        );

        let admin = store.find_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.email, "admin@example.com");
        assert!(store.verify_password(&admin, "admin123"));
    }

    #[tokio::test]
    async fn test_seed_email_conflict_is_an_error() {
        let store = MemoryUserStore::new();
        store
            .create(&NewUser {
                username: "someone".to_string(),
                email: "admin@example.com".to_string(),
                password: "password1".to_string(),
            })
            .await
            .unwrap();

        let result = seed_user(&store, &SeedUser::default()).await;
        assert!(matches!(result, Err(StoreError::DuplicateKey(_))));
    }
}
