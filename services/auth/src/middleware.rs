//! Middleware for JWT token validation and authentication

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::debug;

use crate::{
    error::AuthError,
    models::{RequestContext, TokenType},
    service::AuthService,
};

/// Require a valid, unrevoked access token
///
/// On success the token's [`Claims`](crate::jwt::Claims) are stored in the
/// request extensions for the handlers.
pub async fn require_access_token(
    State(service): State<AuthService>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        debug!("Missing or malformed Authorization header");
        return Err(AuthError::InvalidToken);
    };

    let claims = service
        .authenticate(bearer.token(), TokenType::Access)
        .await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from_headers(&parts.headers))
    }
}
