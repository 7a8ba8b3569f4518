//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use common::cache::{RedisConfig, RedisPool};
use common::database::{DatabaseConfig, init_lazy_pool};
use tokenkeep::{
    AppState, audit,
    jwt::{JwtConfig, JwtService},
    models::{NewRevocation, NewUser},
    repositories::{
        MemoryAuditStore, MemoryRevocationStore, MemoryUserStore, RevocationStore, UserStore,
    },
    service::{AuthService, Backend},
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn admin() -> NewUser {
    NewUser {
        username: "admin".to_string(),
        email: "admin@example.com".to_string(),
        password: "admin123".to_string(),
    }
}

pub fn jwt() -> JwtService {
    JwtService::new(JwtConfig::with_secret(TEST_SECRET)).unwrap()
}

/// A service over in-memory stores, with handles on every store
pub struct Harness {
    pub service: AuthService,
    pub users: Arc<MemoryUserStore>,
    pub revocations: Arc<MemoryRevocationStore>,
    pub audit: Arc<MemoryAuditStore>,
    pub audit_writer: JoinHandle<u64>,
}

impl Harness {
    pub fn new(backend: Backend) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let revocations = Arc::new(MemoryRevocationStore::new());
        let audit = Arc::new(MemoryAuditStore::new());
        let (sink, audit_writer) = audit::spawn(audit.clone(), 64);

        let service = AuthService::new(backend, users.clone(), revocations.clone(), jwt(), sink);

        Self {
            service,
            users,
            revocations,
            audit,
            audit_writer,
        }
    }

    /// Same as [`Harness::new`] with the sample admin account already created
    pub async fn with_admin(backend: Backend) -> Self {
        let harness = Self::new(backend);
        harness.users.create(&admin()).await.unwrap();
        harness
    }
}

/// Application state over in-memory stores
///
/// The database and Redis handles are never used by the account routes and
/// do not connect until a health check asks them to.
pub async fn app_state() -> (AppState, Harness, Harness) {
    let sql = Harness::with_admin(Backend::Sql).await;
    let redis = Harness::with_admin(Backend::Redis).await;

    let state = AppState {
        db_pool: init_lazy_pool(&DatabaseConfig::default()),
        redis_pool: RedisPool::new(&RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        })
        .await
        .unwrap(),
        sql: sql.service.clone(),
        redis: redis.service.clone(),
    };

    (state, sql, redis)
}

/// Spawn `readers` tasks that wait for `revocation` to be acknowledged by
/// `store`, then assert each of them sees the jti as revoked
pub async fn assert_readers_see_acknowledged_revoke(
    store: Arc<dyn RevocationStore>,
    revocation: NewRevocation,
    readers: usize,
) {
    let (acked_tx, acked_rx) = watch::channel(false);

    let tasks: Vec<JoinHandle<bool>> = (0..readers)
        .map(|_| {
            let store = store.clone();
            let jti = revocation.jti.clone();
            let mut acked = acked_rx.clone();
            tokio::spawn(async move {
                acked.wait_for(|done| *done).await.unwrap();
                store.is_revoked(&jti).await.unwrap()
            })
        })
        .collect();

    store.revoke(&revocation).await.unwrap();
    acked_tx.send(true).unwrap();

    for (reader, task) in tasks.into_iter().enumerate() {
        assert!(task.await.unwrap(), "reader {} missed the revocation", reader);
    }
}
