//! Medical history and prescription endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, UserContext};
use crate::clinical::{self, NewMedicalRecord, NewPrescription};
use crate::models::{MedicalRecord, Prescription};

/// `POST /api/patients/:id/medical-history`: a doctor adds a record.
pub async fn add_record(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(patient_id): Path<String>,
    Json(new): Json<NewMedicalRecord>,
) -> Result<(StatusCode, Json<MedicalRecord>), ApiError> {
    let patient_id = parse_id(&patient_id, "Patient")?;
    let conn = ctx.core.open_db()?;
    let record = clinical::add_medical_record(&conn, &user.actor(), &patient_id, new)?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub records: Vec<MedicalRecord>,
}

/// `GET /api/medical-history/:id`: newest first.
pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<UserContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let patient_id = parse_id(&patient_id, "Patient")?;
    let conn = ctx.core.open_db()?;
    let records = clinical::list_medical_history(&conn, &patient_id)?;
    Ok(Json(HistoryResponse { records }))
}

#[derive(Serialize)]
pub struct PrescriptionsResponse {
    pub prescriptions: Vec<Prescription>,
}

/// `GET /api/prescriptions/:id`: newest first.
pub async fn prescriptions(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<UserContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<PrescriptionsResponse>, ApiError> {
    let patient_id = parse_id(&patient_id, "Patient")?;
    let conn = ctx.core.open_db()?;
    let prescriptions = clinical::list_prescriptions(&conn, &patient_id)?;
    Ok(Json(PrescriptionsResponse { prescriptions }))
}

/// `POST /api/prescribe/:appointment_id`
pub async fn prescribe(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(appointment_id): Path<String>,
    Json(new): Json<NewPrescription>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    let appointment_id = parse_id(&appointment_id, "Appointment")?;
    let conn = ctx.core.open_db()?;
    let prescription = clinical::add_prescription(&conn, &user.actor(), &appointment_id, new)?;
    Ok((StatusCode::CREATED, Json(prescription)))
}
