//! Bearer token gate for protected routes.

use crate::auth::AuthService;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Pull the token out of `Authorization: Bearer <token>`
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

/// Reject requests without a valid token; store the claims for handlers
pub async fn require_auth(
    State(auth): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Authorization header required".into()))?;

    let token = header_value
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header format".into()))?;

    let claims = auth.validate_token(token).map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        ApiError::from(e)
    })?;

    if !claims.authorized {
        return Err(ApiError::Forbidden("Not authorized".into()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
