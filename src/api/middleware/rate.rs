//! Per-client rate limiting middleware.
//!
//! Sliding-window limits per client:
//! - 100 requests per minute
//! - 1000 requests per hour
//!
//! A request carrying a live session is counted against its identity.
//! Everything else, including unknown bearer tokens, is counted against the
//! peer IP address.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::middleware::auth::bearer_token;
use crate::api::types::ApiContext;

fn rate_key(req: &Request<axum::body::Body>, ctx: &ApiContext) -> Result<String, ApiError> {
    if let Some(token) = bearer_token(req) {
        if let Some(session) = ctx.core.read_sessions()?.validate(token) {
            return Ok(format!("identity:{}", session.identity_id));
        }
    }
    Ok(match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("peer:{}", addr.ip()),
        None => "peer:unknown".to_string(),
    })
}

/// Returns 429 with `Retry-After` once the client's window is full.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = rate_key(&req, &ctx)?;

    // MutexGuard is !Send; must drop before .await
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        if let Err(retry_after) = limiter.check(&key) {
            tracing::warn!(%key, retry_after, "Rate limit exceeded");
            return Err(ApiError::RateLimited { retry_after });
        }
    }

    Ok(next.run(req).await)
}
