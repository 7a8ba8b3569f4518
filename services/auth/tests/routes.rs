//! HTTP surface tests against in-memory stores

mod support;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tokenkeep::routes::create_router;
use tower::ServiceExt;

async fn app() -> Router {
    let (state, _sql, _redis) = support::app_state().await;
    create_router(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, prefix: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("{}/login", prefix),
        None,
        Some(json!({"username": "admin", "password": "admin123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body
}

#[tokio::test]
async fn login_works_on_both_backends() {
    let app = app().await;

    let sql = login(&app, "/api").await;
    assert_eq!(sql["backend"], "sql");
    assert_eq!(sql["token_type"], "Bearer");
    assert_eq!(sql["expires_in"], 900);
    assert_eq!(sql["user"]["username"], "admin");
    assert!(sql["user"].get("password_hash").is_none());
    assert!(sql["access_token"].as_str().is_some());
    assert!(sql["response_time_ms"].as_f64().is_some());

    let redis = login(&app, "/api-redis").await;
    assert_eq!(redis["backend"], "redis");
    assert_ne!(redis["access_token"], sql["access_token"]);
}

#[tokio::test]
async fn bad_password_is_unauthorized() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"username": "admin", "password": "wrong-password1"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");
}

#[tokio::test]
async fn protected_routes_need_a_bearer_token() {
    let app = app().await;

    let (status, _) = send(&app, Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api-redis/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_access_token() {
    let app = app().await;
    let session = login(&app, "/api").await;
    let access = session["access_token"].as_str().unwrap();

    let (status, body) = send(&app, Method::GET, "/api/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "admin@example.com");

    let (status, body) = send(&app, Method::POST, "/api/logout", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");

    let (status, body) = send(&app, Method::GET, "/api/me", Some(access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token has been revoked");
}

#[tokio::test]
async fn refresh_rotates_tokens() {
    let app = app().await;
    let session = login(&app, "/api-redis").await;
    let refresh = session["refresh_token"].clone();

    let (status, rotated) = send(
        &app,
        Method::POST,
        "/api-redis/refresh",
        None,
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh_token"], refresh);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api-redis/refresh",
        None,
        Some(json!({"refresh_token": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revoke_endpoint_kills_the_refresh_token() {
    let app = app().await;
    let session = login(&app, "/api").await;
    let access = session["access_token"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/revoke",
        Some(access),
        Some(json!({"token": session["refresh_token"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["jti"].as_str().is_some());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/refresh",
        None,
        Some(json!({"refresh_token": session["refresh_token"]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_duplicate() {
    let app = app().await;
    let payload = json!({
        "username": "new_user",
        "email": "new_user@example.com",
        "password": "password1",
    });

    let (status, body) = send(&app, Method::POST, "/api/register", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "new_user");

    let (status, _) = send(&app, Method::POST, "/api/register", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/register",
        None,
        Some(json!({"username": "x", "email": "x@example.com", "password": "password1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn performance_compare_reports_both_backends() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/performance/compare",
        None,
        Some(json!({"username": "admin", "password": "admin123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comparison"]["sql"]["success"], true);
    assert_eq!(body["comparison"]["redis"]["success"], true);
    let faster = body["performance_analysis"]["faster_system"].as_str().unwrap();
    assert!(faster == "sql" || faster == "redis");
}

#[tokio::test]
async fn malformed_logout_body_revokes_nothing() {
    let app = app().await;
    let session = login(&app, "/api").await;
    let access = session["access_token"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/logout",
        Some(access),
        Some(json!({"refreshToken": session["refresh_token"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    // The rejected request left both tokens usable
    let (status, _) = send(&app, Method::GET, "/api/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/logout",
        Some(access),
        Some(json!({"refresh_token": session["refresh_token"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/refresh",
        None,
        Some(json!({"refresh_token": session["refresh_token"]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
