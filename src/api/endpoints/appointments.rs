//! Appointment endpoints: booking, lifecycle transitions and payment.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::endpoints::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, UserContext};
use crate::billing::{self, PayRequest, PaymentOutcome};
use crate::models::{Appointment, Payment};
use crate::scheduling::{self, NewAppointment};

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

/// `GET /api/appointments`: own bookings for patients, own schedule for
/// doctors, everything for admins.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointments = scheduling::list_appointments(&conn, &user.actor())?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `POST /api/appointments`: a patient books with a doctor.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(new): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let conn = ctx.core.open_db()?;
    let appointment = scheduling::create_appointment(&conn, &user.actor(), new)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `POST /api/appointments/:id/confirm`
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(scheduling::confirm_appointment(&conn, &user.actor(), &id)?))
}

/// `GET /api/appointments/:id/status`
pub async fn status(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(scheduling::appointment_status(&conn, &user.actor(), &id)?))
}

/// `POST /api/appointments/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(scheduling::cancel_appointment(&conn, &user.actor(), &id)?))
}

/// `POST /api/appointments/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(scheduling::complete_appointment(&conn, &user.actor(), &id)?))
}

/// `POST /api/appointments/:id/delete`: admin removal.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    scheduling::delete_appointment(&conn, &user.actor(), &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/appointments/:id/pay`: charge through the gateway, then
/// record the payment. The gateway call blocks, so the whole workflow runs
/// on the blocking pool.
pub async fn pay(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(request): Json<PayRequest>,
) -> Result<(StatusCode, Json<PaymentOutcome>), ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let actor = user.actor();
    let outcome = run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        let gateway = core.gateway();
        Ok(billing::pay_appointment(&conn, gateway.as_ref(), &actor, &id, request)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Serialize)]
pub struct PaymentsResponse {
    pub payments: Vec<Payment>,
}

/// `GET /api/appointments/:id/payments`
pub async fn payments(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<PaymentsResponse>, ApiError> {
    let id = parse_id(&id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    let payments = billing::list_payments(&conn, &user.actor(), &id)?;
    Ok(Json(PaymentsResponse { payments }))
}
