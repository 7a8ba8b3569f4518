use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::cache::{RedisConfig, RedisPool};
use common::database::{self, DatabaseConfig};
use common::retry::StorePolicy;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tokenkeep::{
    AppState, audit,
    config::ServerConfig,
    jwt::{JwtConfig, JwtService},
    maintenance::{self, PurgeTarget},
    repositories::{
        PgAuditRepository, PgRevocationRepository, PgUserRepository, RedisRevocationRepository,
        RedisUserCache, RevocationStore, UserStore,
    },
    routes,
    service::{AuthService, Backend},
};

/// How long queued audit entries get to reach the database on shutdown
const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting authentication service");

    let server_config = ServerConfig::from_env()?;
    let policy = StorePolicy::from_env();

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Redis connects on first use; a Redis outage only degrades /api-redis
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    if !redis_pool.health_check().await.unwrap_or(false) {
        warn!("Redis is not reachable yet, /api-redis requests will fail until it is");
    }

    // Initialize JWT service
    let jwt_config = JwtConfig::from_env()?;
    let jwt_service = JwtService::new(jwt_config)?;

    let (audit_sink, audit_writer) = audit::spawn(
        Arc::new(PgAuditRepository::new(pool.clone(), policy)),
        server_config.audit_queue_capacity,
    );

    let sql_users: Arc<dyn UserStore> = Arc::new(PgUserRepository::new(pool.clone(), policy));
    let sql_revocations: Arc<dyn RevocationStore> =
        Arc::new(PgRevocationRepository::new(pool.clone(), policy));
    let redis_users: Arc<dyn UserStore> = Arc::new(RedisUserCache::new(
        sql_users.clone(),
        redis_pool.clone(),
        server_config.user_cache_ttl,
        policy,
    ));
    let redis_revocations: Arc<dyn RevocationStore> =
        Arc::new(RedisRevocationRepository::new(redis_pool.clone(), policy));

    let _purge_scheduler = maintenance::start_purge_job(
        &server_config.purge_schedule,
        vec![
            PurgeTarget {
                name: "postgres",
                store: sql_revocations.clone(),
            },
            PurgeTarget {
                name: "redis",
                store: redis_revocations.clone(),
            },
        ],
    )
    .await?;

    let app_state = AppState {
        db_pool: pool,
        redis_pool,
        sql: AuthService::new(
            Backend::Sql,
            sql_users,
            sql_revocations,
            jwt_service.clone(),
            audit_sink.clone(),
        ),
        redis: AuthService::new(
            Backend::Redis,
            redis_users,
            redis_revocations,
            jwt_service,
            audit_sink,
        ),
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(server_config.bind_addr).await?;
    info!(
        "Authentication service listening on {}",
        server_config.bind_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last audit sinks; the writer drains and stops.
    match tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, audit_writer).await {
        Ok(Ok(written)) => info!("Audit writer flushed, {} entries written", written),
        Ok(Err(e)) => error!("Audit writer failed: {}", e),
        Err(_) => warn!("Audit writer did not drain within {:?}", AUDIT_DRAIN_TIMEOUT),
    }

    Ok(())
}
