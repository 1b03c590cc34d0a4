//! Facility inventory and health-education resources. Plain listings and
//! validated creates; no links to other entities.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::db::repository::{
    insert_facility, insert_health_resource, list_facilities as list_facility_rows,
    list_health_resources,
};
use crate::error::{HospitalError, HospitalResult};
use crate::models::{Facility, HealthEducationResource, Role};

fn required(field: &str, value: &str) -> HospitalResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HospitalError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFacility {
    pub name: String,
    pub location: String,
    pub department: String,
    pub resources: Option<String>,
    #[serde(default)]
    pub resource_quantity: Option<i64>,
    #[serde(default = "default_true")]
    pub resource_available: bool,
}

pub fn list_facilities(conn: &Connection) -> HospitalResult<Vec<Facility>> {
    Ok(list_facility_rows(conn)?)
}

pub fn create_facility(conn: &Connection, actor: &Actor, new: NewFacility) -> HospitalResult<Facility> {
    actor.require_role(Role::Admin)?;
    let resource_quantity = match new.resource_quantity {
        None => 1,
        Some(q) => u32::try_from(q)
            .map_err(|_| HospitalError::validation("resource quantity must be zero or more"))?,
    };

    let facility = Facility {
        id: Uuid::new_v4(),
        name: required("name", &new.name)?,
        location: required("location", &new.location)?,
        department: required("department", &new.department)?,
        resources: new.resources.filter(|r| !r.trim().is_empty()),
        resource_quantity,
        resource_available: new.resource_available,
    };
    insert_facility(conn, &facility)?;
    tracing::info!(facility_id = %facility.id, "Facility created");
    Ok(facility)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHealthResource {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
}

fn check_link(link: Option<String>) -> HospitalResult<Option<String>> {
    let Some(link) = link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
        return Ok(None);
    };
    match reqwest::Url::parse(&link) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(Some(link)),
        _ => Err(HospitalError::validation("link must be an http(s) URL")),
    }
}

pub fn list_resources(conn: &Connection) -> HospitalResult<Vec<HealthEducationResource>> {
    Ok(list_health_resources(conn)?)
}

/// Admins and doctors may publish resources.
pub fn create_resource(
    conn: &Connection,
    actor: &Actor,
    new: NewHealthResource,
) -> HospitalResult<HealthEducationResource> {
    actor.require_any(&[Role::Admin, Role::Doctor])?;
    let resource = HealthEducationResource {
        id: Uuid::new_v4(),
        title: required("title", &new.title)?,
        description: required("description", &new.description)?,
        link: check_link(new.link)?,
    };
    insert_health_resource(conn, &resource)?;
    tracing::info!(resource_id = %resource.id, "Health resource published");
    Ok(resource)
}
