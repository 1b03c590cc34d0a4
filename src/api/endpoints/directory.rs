//! Facility and health-education resource endpoints. Listings are public.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::directory::{self, NewFacility, NewHealthResource};
use crate::models::{Facility, HealthEducationResource};

#[derive(Serialize)]
pub struct FacilitiesResponse {
    pub facilities: Vec<Facility>,
}

/// `GET /api/facilities`
pub async fn facilities(
    State(ctx): State<ApiContext>,
) -> Result<Json<FacilitiesResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let facilities = directory::list_facilities(&conn)?;
    Ok(Json(FacilitiesResponse { facilities }))
}

/// `POST /api/facilities/new`
pub async fn create_facility(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(new): Json<NewFacility>,
) -> Result<(StatusCode, Json<Facility>), ApiError> {
    let conn = ctx.core.open_db()?;
    let facility = directory::create_facility(&conn, &user.actor(), new)?;
    Ok((StatusCode::CREATED, Json(facility)))
}

#[derive(Serialize)]
pub struct ResourcesResponse {
    pub resources: Vec<HealthEducationResource>,
}

/// `GET /api/resources`
pub async fn resources(
    State(ctx): State<ApiContext>,
) -> Result<Json<ResourcesResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let resources = directory::list_resources(&conn)?;
    Ok(Json(ResourcesResponse { resources }))
}

/// `POST /api/resources/new`
pub async fn create_resource(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(new): Json<NewHealthResource>,
) -> Result<(StatusCode, Json<HealthEducationResource>), ApiError> {
    let conn = ctx.core.open_db()?;
    let resource = directory::create_resource(&conn, &user.actor(), new)?;
    Ok((StatusCode::CREATED, Json(resource)))
}
