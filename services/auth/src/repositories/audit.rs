//! Audit repository writing to the `token_audit` table

use async_trait::async_trait;
use common::error::{StoreError, StoreResult};
use common::retry::StorePolicy;
use sqlx::PgPool;

use super::AuditStore;
use crate::models::AuditEntry;

/// Audit repository
#[derive(Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
    policy: StorePolicy,
}

impl PgAuditRepository {
    /// Create a new audit repository
    pub fn new(pool: PgPool, policy: StorePolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl AuditStore for PgAuditRepository {
    async fn append(&self, entry: &AuditEntry) -> StoreResult<()> {
        let pool = &self.pool;

        self.policy
            .run("append audit entry", move || async move {
                sqlx::query(
                    r#"
                    INSERT INTO token_audit (user_id, action, token_jti, ip_address, user_agent, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(entry.user_id)
                .bind(entry.action.as_str())
                .bind(entry.token_jti.as_deref())
                .bind(entry.ip_address.as_deref())
                .bind(entry.user_agent.as_deref())
                .bind(entry.created_at)
                .execute(pool)
                .await?;
                Ok::<_, StoreError>(())
            })
            .await
    }
}
