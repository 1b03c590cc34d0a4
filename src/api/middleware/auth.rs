//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it against the
//! session store, and injects `UserContext` into request extensions for
//! downstream handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Require a live login session.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `UserContext` for the handler.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?.to_string();

    let session = ctx
        .core
        .read_sessions()?
        .validate(&token)
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(UserContext {
        identity_id: session.identity_id,
        username: session.username,
        role: session.role,
        token,
    });

    Ok(next.run(req).await)
}
