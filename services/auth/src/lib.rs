//! Token issuance and revocation service
//!
//! Two [`service::AuthService`] instances share one JWT service and one
//! audit queue: one runs on PostgreSQL alone, the other reads users through
//! a Redis cache and keeps revocations in Redis.

pub mod audit;
pub mod config;
pub mod error;
pub mod jwt;
pub mod maintenance;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod schema;
pub mod service;
pub mod validation;

use common::cache::RedisPool;
use sqlx::PgPool;

use crate::service::AuthService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    /// Service mounted under `/api`
    pub sql: AuthService,
    /// Service mounted under `/api-redis`
    pub redis: AuthService,
}
