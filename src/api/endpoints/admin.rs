//! Admin console endpoints: doctor accounts, specializations and user lists.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::admin::{self, AddDoctorRequest};
use crate::api::endpoints::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, UserContext};
use crate::identity::{self, PatientDetail};
use crate::models::{DoctorListing, Identity, Role, Specialization};
use crate::specializations;

/// `POST /api/admin/add-doctor`
pub async fn add_doctor(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(request): Json<AddDoctorRequest>,
) -> Result<(StatusCode, Json<DoctorListing>), ApiError> {
    let actor = user.actor();
    let listing = run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        Ok(admin::add_doctor(&conn, &core.hasher, &actor, request)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
    pub sessions_revoked: usize,
}

/// `POST /api/admin/remove-doctor/:id`: also ends the doctor's live sessions.
pub async fn remove_doctor(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let doctor_id = parse_id(&doctor_id, "Doctor")?;
    let conn = ctx.core.open_db()?;
    let identity_id = admin::remove_doctor(&conn, &user.actor(), &doctor_id)?;
    let sessions_revoked = ctx.core.write_sessions()?.revoke_identity(&identity_id);
    Ok(Json(RemovedResponse {
        removed: true,
        sessions_revoked,
    }))
}

// ═══════════════════════════════════════════════════════════
// Specializations
// ═══════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct SpecializationsResponse {
    pub specializations: Vec<Specialization>,
}

/// `GET /api/admin/specializations`
pub async fn specializations(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<SpecializationsResponse>, ApiError> {
    user.actor().require_role(Role::Admin)?;
    let conn = ctx.core.open_db()?;
    let specializations = specializations::list(&conn)?;
    Ok(Json(SpecializationsResponse { specializations }))
}

#[derive(Deserialize)]
pub struct NewSpecialization {
    pub name: String,
}

/// `POST /api/admin/specializations`
pub async fn create_specialization(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(new): Json<NewSpecialization>,
) -> Result<(StatusCode, Json<Specialization>), ApiError> {
    let conn = ctx.core.open_db()?;
    let spec = specializations::create(&conn, &user.actor(), &new.name)?;
    Ok((StatusCode::CREATED, Json(spec)))
}

/// `POST /api/admin/specializations/:id/delete`
pub async fn delete_specialization(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "Specialization")?;
    let conn = ctx.core.open_db()?;
    specializations::delete(&conn, &user.actor(), &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════
// User listings
// ═══════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<Identity>,
}

/// `GET /api/admin/users`
pub async fn users(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<UsersResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let users = identity::list_users(&conn, &user.actor())?;
    Ok(Json(UsersResponse { users }))
}

/// `GET /api/admin/patients`
pub async fn patients(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<UsersResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let users = identity::list_patients(&conn, &user.actor())?;
    Ok(Json(UsersResponse { users }))
}

/// `GET /api/admin/patients/:id`
pub async fn patient_detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<PatientDetail>, ApiError> {
    let patient_id = parse_id(&patient_id, "Patient")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(identity::patient_detail(&conn, &user.actor(), &patient_id)?))
}
