//! Admin-initiated doctor onboarding and removal.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::crypto::PasswordHasher;
use crate::db::repository::{
    count_appointments_for_doctor, delete_identity, get_doctor_profile, get_specialization,
    insert_doctor_profile_if_absent, list_doctor_listings,
};
use crate::error::{HospitalError, HospitalResult};
use crate::identity::create_identity;
use crate::models::{DoctorListing, DoctorProfile, Role};
use crate::profiles::parse_availability;

#[derive(Debug, Clone, Deserialize)]
pub struct AddDoctorRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization_id: Option<Uuid>,
    #[serde(default)]
    pub availability: std::collections::BTreeMap<String, String>,
}

/// Create a doctor account and its profile in one transaction. The role is
/// fixed to doctor here and nowhere else.
pub fn add_doctor(
    conn: &Connection,
    hasher: &PasswordHasher,
    actor: &Actor,
    req: AddDoctorRequest,
) -> HospitalResult<DoctorListing> {
    actor.require_role(Role::Admin)?;
    let availability = parse_availability(req.availability)?;
    if let Some(spec_id) = &req.specialization_id {
        get_specialization(conn, spec_id)?.ok_or(HospitalError::NotFound("Specialization"))?;
    }

    let tx = conn.unchecked_transaction()?;
    let identity = create_identity(
        &tx,
        hasher,
        req.username.trim(),
        req.email.clone(),
        &req.password,
        Role::Doctor,
    )?;
    let profile = DoctorProfile {
        id: Uuid::new_v4(),
        identity_id: identity.id,
        name: req.name.filter(|n| !n.trim().is_empty()),
        email: identity.email.clone(),
        phone: req.phone.filter(|p| !p.trim().is_empty()),
        specialization_id: req.specialization_id,
        availability,
    };
    insert_doctor_profile_if_absent(&tx, &profile)?;
    tx.commit()?;

    tracing::info!(doctor_id = %profile.id, "Doctor added");
    list_doctor_listings(conn, None)?
        .into_iter()
        .find(|d| d.profile.id == profile.id)
        .ok_or(HospitalError::NotFound("Doctor"))
}

/// Remove a doctor's identity (the profile goes with it). Refused while any
/// appointment still references the doctor, since appointments are only ever
/// removed explicitly. Returns the deleted identity id.
pub fn remove_doctor(conn: &Connection, actor: &Actor, doctor_id: &Uuid) -> HospitalResult<Uuid> {
    actor.require_role(Role::Admin)?;
    let doctor = get_doctor_profile(conn, doctor_id)?.ok_or(HospitalError::NotFound("Doctor"))?;

    let booked = count_appointments_for_doctor(conn, doctor_id)?;
    if booked > 0 {
        return Err(HospitalError::validation(format!(
            "doctor still has {booked} appointment(s); delete or reassign them first"
        )));
    }

    delete_identity(conn, &doctor.identity_id)?;
    tracing::info!(doctor_id = %doctor_id, "Doctor removed");
    Ok(doctor.identity_id)
}
