//! Billing endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::billing::{self, NewBilling};
use crate::models::Billing;

#[derive(Serialize)]
pub struct BillingResponse {
    pub billing: Vec<Billing>,
}

/// `GET /api/billing`: the calling patient's bills in creation order.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<BillingResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let billing = billing::list_billing(&conn, &user.actor())?;
    Ok(Json(BillingResponse { billing }))
}

/// `POST /api/billing`: admin issues a bill.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(new): Json<NewBilling>,
) -> Result<(StatusCode, Json<Billing>), ApiError> {
    let conn = ctx.core.open_db()?;
    let bill = billing::create_billing(&conn, &user.actor(), new)?;
    Ok((StatusCode::CREATED, Json(bill)))
}
