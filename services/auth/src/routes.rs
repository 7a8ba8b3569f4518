//! Authentication service routes
//!
//! The SQL-backed service is mounted under `/api` and the Redis-backed one
//! under `/api-redis`, with identical routes so the two can be compared
//! request for request.

use std::time::{Duration, Instant};

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    AppState,
    error::{AuthError, AuthResult},
    jwt::Claims,
    middleware::require_access_token,
    models::{LoginCredentials, NewUser, RequestContext, UserProfile},
    service::{AuthService, Backend, Session},
};

/// Upper bound for each health probe
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Response for token generation
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserProfile,
    pub backend: Backend,
    pub response_time_ms: f64,
}

impl TokenResponse {
    fn new(service: &AuthService, session: Session, started: Instant) -> Self {
        Self {
            access_token: session.tokens.access.token,
            refresh_token: session.tokens.refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: service.jwt().access_token_expiry(),
            user: UserProfile::from(&session.user),
            backend: service.backend(),
            response_time_ms: elapsed_ms(started),
        }
    }
}

/// Request for token refresh
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Optional body of a logout request
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

impl LogoutRequest {
    /// Parse a logout body; only an empty body means "no refresh token"
    ///
    /// Anything else must be a well-formed request, so a misspelled field
    /// can't silently leave the refresh token alive.
    pub fn from_body(body: &[u8]) -> AuthResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AuthError::Validation(format!("Invalid logout request: {}", e)))
    }
}

/// Request to revoke one of the caller's tokens
#[derive(Deserialize)]
pub struct RevokeRequest {
    pub token: String,
}

/// Body of `GET /api/health`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub status: String,
    pub database: String,
    pub redis: String,
}

impl HealthReport {
    pub fn new(database_ok: bool, redis_ok: bool) -> Self {
        let label = |ok: bool| if ok { "connected" } else { "disconnected" }.to_string();
        Self {
            status: if database_ok && redis_ok {
                "healthy"
            } else {
                "degraded"
            }
            .to_string(),
            database: label(database_ok),
            redis: label(redis_ok),
        }
    }
}

/// Outcome of one timed login inside the comparison
#[derive(Debug, Serialize, Deserialize)]
pub struct TimedLogin {
    pub success: bool,
    pub response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Timings for both backends
#[derive(Debug, Serialize, Deserialize)]
pub struct Comparison {
    pub sql: TimedLogin,
    pub redis: TimedLogin,
}

/// Which backend won and by how much
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PerformanceAnalysis {
    pub faster_system: String,
    pub redis_advantage: String,
}

impl PerformanceAnalysis {
    pub fn from_comparison(comparison: &Comparison) -> Self {
        let (sql, redis) = (&comparison.sql, &comparison.redis);
        if !sql.success || !redis.success {
            return Self {
                faster_system: "unknown".to_string(),
                redis_advantage: "Comparison unavailable: at least one login failed".to_string(),
            };
        }

        let difference = sql.response_time_ms - redis.response_time_ms;
        let percentage = if sql.response_time_ms > 0.0 {
            difference / sql.response_time_ms * 100.0
        } else {
            0.0
        };

        if difference > 0.0 {
            Self {
                faster_system: Backend::Redis.to_string(),
                redis_advantage: format!(
                    "Redis is {:.2}ms ({:.1}%) faster than SQL",
                    difference, percentage
                ),
            }
        } else {
            Self {
                faster_system: Backend::Sql.to_string(),
                redis_advantage: format!(
                    "SQL is {:.2}ms ({:.1}%) faster than Redis",
                    -difference, -percentage
                ),
            }
        }
    }
}

/// Body of `POST /api/performance/compare`
#[derive(Debug, Serialize, Deserialize)]
pub struct ComparisonResponse {
    pub comparison: Comparison,
    pub performance_analysis: PerformanceAnalysis,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/performance/compare", post(compare_performance))
        .nest("/api", backend_router(state.sql.clone()))
        .nest("/api-redis", backend_router(state.redis.clone()))
        .with_state(state)
}

/// Routes served by a single backend
fn backend_router<S>(service: AuthService) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/revoke", post(revoke))
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            service.clone(),
            require_access_token,
        ));

    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh", post(refresh_token))
        .merge(protected)
        .with_state(service)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = matches!(
        tokio::time::timeout(
            HEALTH_PROBE_TIMEOUT,
            common::database::health_check(&state.db_pool)
        )
        .await,
        Ok(Ok(true))
    );
    let redis_ok = matches!(
        tokio::time::timeout(HEALTH_PROBE_TIMEOUT, state.redis_pool.health_check()).await,
        Ok(Ok(true))
    );

    Json(HealthReport::new(database_ok, redis_ok))
}

/// User login endpoint
pub async fn login(
    State(service): State<AuthService>,
    ctx: RequestContext,
    Json(payload): Json<LoginCredentials>,
) -> AuthResult<impl IntoResponse> {
    info!(backend = %service.backend(), "Login attempt for user: {}", payload.username);

    let started = Instant::now();
    let session = service
        .login(&payload.username, &payload.password, &ctx)
        .await?;

    Ok((
        StatusCode::OK,
        Json(TokenResponse::new(&service, session, started)),
    ))
}

/// Registration endpoint
pub async fn register(
    State(service): State<AuthService>,
    Json(payload): Json<NewUser>,
) -> AuthResult<impl IntoResponse> {
    let user = service.register(&payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "user": UserProfile::from(&user) })),
    ))
}

/// Refresh token endpoint
pub async fn refresh_token(
    State(service): State<AuthService>,
    ctx: RequestContext,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<impl IntoResponse> {
    info!(backend = %service.backend(), "Token refresh request");

    let started = Instant::now();
    let session = service.refresh(&payload.refresh_token, &ctx).await?;

    Ok((
        StatusCode::OK,
        Json(TokenResponse::new(&service, session, started)),
    ))
}

/// Logout endpoint
pub async fn logout(
    State(service): State<AuthService>,
    Extension(claims): Extension<Claims>,
    ctx: RequestContext,
    body: Bytes,
) -> AuthResult<impl IntoResponse> {
    let payload = LogoutRequest::from_body(&body)?;
    service
        .logout(&claims, payload.refresh_token.as_deref(), &ctx)
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}

/// Explicit revocation endpoint
pub async fn revoke(
    State(service): State<AuthService>,
    Extension(claims): Extension<Claims>,
    ctx: RequestContext,
    Json(payload): Json<RevokeRequest>,
) -> AuthResult<impl IntoResponse> {
    let revoked = service.revoke(&claims, &payload.token, &ctx).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Token revoked",
            "jti": revoked.jti,
        })),
    ))
}

/// Current user endpoint
pub async fn me(
    State(service): State<AuthService>,
    Extension(claims): Extension<Claims>,
) -> AuthResult<impl IntoResponse> {
    let user = service.profile(&claims).await?;
    Ok(Json(serde_json::json!({ "user": UserProfile::from(&user) })))
}

async fn timed_login(
    service: &AuthService,
    credentials: &LoginCredentials,
    ctx: &RequestContext,
) -> TimedLogin {
    let started = Instant::now();
    let result = service
        .login(&credentials.username, &credentials.password, ctx)
        .await;
    let response_time_ms = elapsed_ms(started);

    match result {
        Ok(_) => TimedLogin {
            success: true,
            response_time_ms,
            error: None,
        },
        Err(e) => TimedLogin {
            success: false,
            response_time_ms,
            error: Some(e.to_string()),
        },
    }
}

/// Run one login per backend and compare their latency
pub async fn compare_performance(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<LoginCredentials>,
) -> Result<impl IntoResponse, AuthError> {
    let comparison = Comparison {
        sql: timed_login(&state.sql, &payload, &ctx).await,
        redis: timed_login(&state.redis, &payload, &ctx).await,
    };
    let performance_analysis = PerformanceAnalysis::from_comparison(&comparison);

    info!(
        sql_ms = comparison.sql.response_time_ms,
        redis_ms = comparison.redis.response_time_ms,
        "Performance comparison: {}",
        performance_analysis.redis_advantage
    );

    Ok(Json(ComparisonResponse {
        comparison,
        performance_analysis,
    }))
}
