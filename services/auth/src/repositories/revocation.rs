//! Revoked token repository backed by the `revoked_tokens` table

use async_trait::async_trait;
use common::error::{StoreError, StoreResult};
use common::retry::StorePolicy;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::RevocationStore;
use crate::models::NewRevocation;

/// Revocation repository
#[derive(Clone)]
pub struct PgRevocationRepository {
    pool: PgPool,
    policy: StorePolicy,
}

impl PgRevocationRepository {
    /// Create a new revocation repository
    pub fn new(pool: PgPool, policy: StorePolicy) -> Self {
        Self { pool, policy }
    }

    /// Single insert attempt tagged with `request_id`
    ///
    /// On a jti conflict the stored `request_id` tells an earlier attempt of
    /// the same call (success) apart from a different revocation
    /// (`DuplicateKey`).
    pub async fn revoke_attempt(
        &self,
        revocation: &NewRevocation,
        request_id: Uuid,
    ) -> StoreResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, token_type, user_id, expires_at, request_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(&revocation.jti)
        .bind(revocation.token_type.as_str())
        .bind(revocation.user_id)
        .bind(revocation.expires_at)
        .bind(request_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(());
        }

        let owner: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT request_id FROM revoked_tokens WHERE jti = $1")
                .bind(&revocation.jti)
                .fetch_optional(&self.pool)
                .await?;

        if owner.flatten() == Some(request_id) {
            debug!(jti = %revocation.jti, "Revocation already written by this request");
            return Ok(());
        }
        Err(StoreError::DuplicateKey(revocation.jti.clone()))
    }
}

#[async_trait]
impl RevocationStore for PgRevocationRepository {
    async fn revoke(&self, revocation: &NewRevocation) -> StoreResult<()> {
        debug!(
            jti = %revocation.jti,
            token_type = %revocation.token_type,
            user_id = revocation.user_id,
            "Revoking token"
        );

        // One id for every retry of this call.
        let request_id = Uuid::new_v4();

        self.policy
            .run("revoke token", move || async move {
                self.revoke_attempt(revocation, request_id).await
            })
            .await
    }

    async fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        let pool = &self.pool;

        self.policy
            .run("check revocation", move || async move {
                let revoked: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)",
                )
                .bind(jti)
                .fetch_one(pool)
                .await?;
                Ok::<_, StoreError>(revoked)
            })
            .await
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let pool = &self.pool;

        let purged = self
            .policy
            .run("purge revocations", move || async move {
                let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
                    .execute(pool)
                    .await?;
                Ok::<_, StoreError>(result.rows_affected())
            })
            .await?;

        info!("Purged {} expired revocations", purged);
        Ok(purged)
    }
}
