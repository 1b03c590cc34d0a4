//! Audit logging middleware.
//!
//! Records method, path and response status for every request together
//! with the acting identity. Runs innermost, after auth has injected
//! `UserContext`.

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, UserContext};

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers see the path without `/api`; record what the client sent.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let identity_id = req
        .extensions()
        .get::<UserContext>()
        .map(|u| u.identity_id.to_string());

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        tracing::debug!(%method, %path, status, "API access");
        ctx.core
            .log_access(identity_id, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
