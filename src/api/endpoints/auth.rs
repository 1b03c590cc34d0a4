//! Account endpoints.
//!
//! `POST /api/signup` and `POST /api/login` are unprotected;
//! `POST /api/logout` and `GET /api/dashboard` need a session.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::authorization::dashboard_for;
use crate::error::HospitalError;
use crate::identity::{self, SignupRequest};
use crate::models::{Identity, Role};

/// `POST /api/signup`: self-service registration, always as a patient.
pub async fn signup(
    State(ctx): State<ApiContext>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Identity>), ApiError> {
    let created = run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        Ok(identity::signup(&conn, &core.hasher, request)?)
    })
    .await?;

    tracing::info!(identity_id = %created.id, "Patient signed up");
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub identity_id: Uuid,
    pub username: String,
    pub role: Role,
    pub dashboard: &'static str,
}

/// `POST /api/login`: exchange credentials for a bearer token.
///
/// Five consecutive failures lock the username for five minutes; while
/// locked, even a correct password is refused.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = request.username.trim().to_string();

    {
        let mut lockout = ctx.core.lock_lockout()?;
        if let Some(remaining) = lockout.locked_for(&username) {
            return Err(ApiError::LockedOut {
                retry_after: remaining.as_secs().max(1),
            });
        }
    }

    let attempt_name = username.clone();
    let result = run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        identity::authenticate(&conn, &core.hasher, &attempt_name, &request.password)
            .map_err(ApiError::from)
    })
    .await;

    let account = match result {
        Ok(account) => account,
        Err(ApiError::InvalidCredentials) => {
            let locked = ctx.core.lock_lockout()?.record_failure(&username);
            if locked {
                tracing::warn!(%username, "Login locked after repeated failures");
            } else {
                tracing::info!(%username, "Login failed");
            }
            return Err(HospitalError::InvalidCredentials.into());
        }
        Err(other) => return Err(other),
    };

    ctx.core.lock_lockout()?.record_success(&username);
    let token = ctx
        .core
        .write_sessions()?
        .issue(account.id, &account.username, account.role);

    tracing::info!(identity_id = %account.id, role = %account.role, "Login succeeded");
    Ok(Json(LoginResponse {
        token,
        identity_id: account.id,
        username: account.username,
        role: account.role,
        dashboard: dashboard_for(account.role).as_str(),
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// `POST /api/logout`: revoke the presented token.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let logged_out = ctx.core.write_sessions()?.revoke(&user.token);
    tracing::info!(identity_id = %user.identity_id, "Logged out");
    Ok(Json(LogoutResponse { logged_out }))
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub dashboard: &'static str,
    pub username: String,
    pub role: Role,
}

/// `GET /api/dashboard`: which landing view the caller's role gets.
pub async fn dashboard(
    Extension(user): Extension<UserContext>,
) -> Result<Json<DashboardResponse>, ApiError> {
    Ok(Json(DashboardResponse {
        dashboard: dashboard_for(user.role).as_str(),
        username: user.username,
        role: user.role,
    }))
}
