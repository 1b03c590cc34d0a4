//! Profile endpoints for each role, plus the doctor directory.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, UserContext};
use crate::models::{AdminProfile, DoctorListing, DoctorProfile, PatientProfile};
use crate::profiles::{self, AdminProfileUpdate, DoctorProfileUpdate, PatientProfileUpdate};
use crate::scheduling::{self, AvailableDoctor};

/// `GET /api/patient/profile`
pub async fn patient_profile(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<PatientProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(profiles::get_or_create_patient_profile(&conn, &user.actor())?))
}

/// `PUT /api/patient/profile`
pub async fn update_patient_profile(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(update): Json<PatientProfileUpdate>,
) -> Result<Json<PatientProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(profiles::update_patient(&conn, &user.actor(), update)?))
}

/// `GET /api/doctor/profile`
pub async fn doctor_profile(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<DoctorProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(profiles::get_or_create_doctor_profile(&conn, &user.actor())?))
}

/// `PUT /api/doctor/profile`
pub async fn update_doctor_profile(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(update): Json<DoctorProfileUpdate>,
) -> Result<Json<DoctorProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(profiles::update_doctor(&conn, &user.actor(), update)?))
}

/// `GET /api/admin/profile`
pub async fn admin_profile(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<AdminProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(profiles::get_or_create_admin_profile(&conn, &user.actor())?))
}

/// `PUT /api/admin/profile`
pub async fn update_admin_profile(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(update): Json<AdminProfileUpdate>,
) -> Result<Json<AdminProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(profiles::update_admin(&conn, &user.actor(), update)?))
}

// ═══════════════════════════════════════════════════════════
// Doctor directory
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct DoctorFilter {
    pub specialization: Option<String>,
}

#[derive(Serialize)]
pub struct DoctorsResponse {
    pub doctors: Vec<DoctorListing>,
}

/// `GET /api/doctors?specialization=<id>`
pub async fn doctors(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<UserContext>,
    Query(filter): Query<DoctorFilter>,
) -> Result<Json<DoctorsResponse>, ApiError> {
    let specialization = specialization_filter(filter.specialization.as_deref())?;
    let conn = ctx.core.open_db()?;
    let doctors = profiles::list_doctors(&conn, specialization.as_ref())?;
    Ok(Json(DoctorsResponse { doctors }))
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default)]
    pub date: String,
    pub specialization: Option<String>,
}

#[derive(Serialize)]
pub struct AvailableDoctorsResponse {
    pub date: String,
    pub doctors: Vec<AvailableDoctor>,
}

/// `GET /api/doctors/available?date=YYYY-MM-DD&specialization=<id>`
pub async fn available_doctors(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<UserContext>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailableDoctorsResponse>, ApiError> {
    let specialization = specialization_filter(query.specialization.as_deref())?;
    let conn = ctx.core.open_db()?;
    let doctors = scheduling::available_doctors(&conn, &query.date, specialization.as_ref())?;
    Ok(Json(AvailableDoctorsResponse {
        date: query.date,
        doctors,
    }))
}

/// An empty filter means "all specializations".
fn specialization_filter(raw: Option<&str>) -> Result<Option<uuid::Uuid>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => parse_id(id, "Specialization").map(Some),
        None => Ok(None),
    }
}
