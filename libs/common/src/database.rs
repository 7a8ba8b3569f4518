//! Database module for handling PostgreSQL connections and operations
//!
//! This module provides connection pooling, configuration, and health checks
//! for the PostgreSQL database. Credentials are read once into a
//! [`DatabaseConfig`] and handed to the pool at startup.

use crate::error::{StoreError, StoreResult};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Pool, Postgres};
use std::env;
use std::time::Duration;
use tracing::{error, info};

/// Database that always exists on a PostgreSQL server
const MAINTENANCE_DATABASE: &str = "postgres";

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database server host
    pub host: String,
    /// Database server port
    pub port: u16,
    /// Login role
    pub user: String,
    /// Login password
    pub password: String,
    /// Name of the application database
    pub name: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "jwt_auth".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout: 30,
        }
    }
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DB_HOST`: Database host (default: localhost)
    /// - `DB_PORT`: Database port (default: 5432)
    /// - `DB_USER`: Database user (default: postgres)
    /// - `DB_PASSWORD`: Database password (default: postgres)
    /// - `DB_NAME`: Database name (default: jwt_auth)
    /// - `DATABASE_MAX_CONNECTIONS`: Maximum number of connections (default: 10)
    /// - `DATABASE_MIN_CONNECTIONS`: Minimum number of connections (default: 1)
    /// - `DATABASE_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 30)
    pub fn from_env() -> StoreResult<Self> {
        let defaults = Self::default();

        let port = match env::var("DB_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| StoreError::Configuration(format!("Invalid DB_PORT: {}", e)))?,
            Err(_) => defaults.port,
        };

        Ok(Self {
            host: env::var("DB_HOST").unwrap_or(defaults.host),
            port,
            user: env::var("DB_USER").unwrap_or(defaults.user),
            password: env::var("DB_PASSWORD").unwrap_or(defaults.password),
            name: env::var("DB_NAME").unwrap_or(defaults.name),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_connections),
            connection_timeout: env::var("DATABASE_CONNECTION_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.connection_timeout),
        })
    }

    /// Connection options for the application database
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }

    /// Connection options for the server's maintenance database, used to
    /// create the application database before it exists
    pub fn maintenance_options(&self) -> PgConnectOptions {
        self.connect_options().database(MAINTENANCE_DATABASE)
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connection_timeout))
    }
}

/// Initialize a PostgreSQL connection pool
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `StoreResult<Pool<Postgres>>` - PostgreSQL connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> StoreResult<Pool<Postgres>> {
    info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        "Initializing database connection pool"
    );

    let pool = config
        .pool_options()
        .connect_with(config.connect_options())
        .await?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Build a pool that opens connections on first use
pub fn init_lazy_pool(config: &DatabaseConfig) -> Pool<Postgres> {
    config
        .pool_options()
        .min_connections(0)
        .connect_lazy_with(config.connect_options())
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - PostgreSQL connection pool
///
/// # Returns
///
/// * `StoreResult<bool>` - True if the database answered, false otherwise
pub async fn health_check(pool: &PgPool) -> StoreResult<bool> {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => Ok(true),
        Err(e) => {
            error!("Database health check failed: {}", e);
            Ok(false)
        }
    }
}
