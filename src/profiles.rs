//! Per-role profile registry. Each identity owns at most one profile of
//! its role's kind, created empty on first access.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::db::repository::{
    get_admin_profile_by_identity, get_doctor_profile_by_identity, get_identity,
    get_patient_profile_by_identity, get_specialization, insert_admin_profile_if_absent,
    insert_doctor_profile_if_absent, insert_patient_profile_if_absent, list_doctor_listings,
    update_admin_profile, update_doctor_profile, update_patient_profile,
};
use crate::error::{HospitalError, HospitalResult};
use crate::models::{
    AdminProfile, DoctorListing, DoctorProfile, PatientProfile, Role, WeeklyAvailability,
};

pub const MAX_AGE: i64 = 150;
pub const MAX_PHONE_LENGTH: usize = 15;
pub const MAX_NAME_LENGTH: usize = 100;

fn ensure_identity(conn: &Connection, actor: &Actor) -> HospitalResult<()> {
    get_identity(conn, &actor.identity_id)?
        .map(|_| ())
        .ok_or(HospitalError::NotFound("Identity"))
}

fn check_phone(phone: &Option<String>) -> HospitalResult<()> {
    match phone {
        Some(p) if p.chars().count() > MAX_PHONE_LENGTH => Err(HospitalError::validation(format!(
            "phone must be at most {MAX_PHONE_LENGTH} characters"
        ))),
        _ => Ok(()),
    }
}

fn check_name(name: &Option<String>) -> HospitalResult<()> {
    match name {
        Some(n) if n.chars().count() > MAX_NAME_LENGTH => Err(HospitalError::validation(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        ))),
        _ => Ok(()),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ═══════════════════════════════════════════
// Patient
// ═══════════════════════════════════════════

/// Idempotent: the first call creates an empty profile, later calls return
/// the same row untouched.
pub fn get_or_create_patient_profile(conn: &Connection, actor: &Actor) -> HospitalResult<PatientProfile> {
    actor.require_role(Role::Patient)?;
    ensure_identity(conn, actor)?;

    let fresh = PatientProfile {
        id: Uuid::new_v4(),
        identity_id: actor.identity_id,
        ..Default::default()
    };
    if insert_patient_profile_if_absent(conn, &fresh)? {
        tracing::debug!(identity_id = %actor.identity_id, "Created empty patient profile");
    }
    get_patient_profile_by_identity(conn, &actor.identity_id)?
        .ok_or(HospitalError::NotFound("PatientProfile"))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientProfileUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub medical_history: String,
    #[serde(default)]
    pub treatment_plans: String,
}

impl PatientProfileUpdate {
    fn validate(&self) -> HospitalResult<Option<u32>> {
        check_name(&self.name)?;
        check_phone(&self.phone)?;
        match self.age {
            None => Ok(None),
            Some(age) if (0..=MAX_AGE).contains(&age) => Ok(Some(age as u32)),
            Some(_) => Err(HospitalError::validation(format!("age must be between 0 and {MAX_AGE}"))),
        }
    }
}

/// Whole-record replace. Nothing is written unless every field validates.
pub fn update_patient(
    conn: &Connection,
    actor: &Actor,
    update: PatientProfileUpdate,
) -> HospitalResult<PatientProfile> {
    let age = update.validate()?;
    let current = get_or_create_patient_profile(conn, actor)?;

    let profile = PatientProfile {
        id: current.id,
        identity_id: current.identity_id,
        name: blank_to_none(update.name),
        age,
        phone: blank_to_none(update.phone),
        address: blank_to_none(update.address),
        medications: update.medications,
        medical_history: update.medical_history,
        treatment_plans: update.treatment_plans,
    };
    update_patient_profile(conn, &profile)?;
    Ok(profile)
}

// ═══════════════════════════════════════════
// Doctor
// ═══════════════════════════════════════════

pub fn get_or_create_doctor_profile(conn: &Connection, actor: &Actor) -> HospitalResult<DoctorProfile> {
    actor.require_role(Role::Doctor)?;
    ensure_identity(conn, actor)?;

    let fresh = DoctorProfile {
        id: Uuid::new_v4(),
        identity_id: actor.identity_id,
        name: None,
        email: None,
        phone: None,
        specialization_id: None,
        availability: WeeklyAvailability::default(),
    };
    if insert_doctor_profile_if_absent(conn, &fresh)? {
        tracing::debug!(identity_id = %actor.identity_id, "Created empty doctor profile");
    }
    get_doctor_profile_by_identity(conn, &actor.identity_id)?
        .ok_or(HospitalError::NotFound("DoctorProfile"))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization_id: Option<Uuid>,
    #[serde(default)]
    pub availability: BTreeMap<String, String>,
}

/// Parse a weekday → slot map, rejecting keys that are not weekdays.
pub fn parse_availability(entries: BTreeMap<String, String>) -> HospitalResult<WeeklyAvailability> {
    WeeklyAvailability::from_entries(entries)
        .map_err(|bad| HospitalError::validation(format!("unknown weekday in availability: {bad}")))
}

pub fn update_doctor(
    conn: &Connection,
    actor: &Actor,
    update: DoctorProfileUpdate,
) -> HospitalResult<DoctorProfile> {
    check_name(&update.name)?;
    check_phone(&update.phone)?;
    let availability = parse_availability(update.availability)?;
    if let Some(spec_id) = &update.specialization_id {
        get_specialization(conn, spec_id)?.ok_or(HospitalError::NotFound("Specialization"))?;
    }

    let current = get_or_create_doctor_profile(conn, actor)?;
    let profile = DoctorProfile {
        id: current.id,
        identity_id: current.identity_id,
        name: blank_to_none(update.name),
        email: blank_to_none(update.email),
        phone: blank_to_none(update.phone),
        specialization_id: update.specialization_id,
        availability,
    };
    update_doctor_profile(conn, &profile)?;
    Ok(profile)
}

/// All doctor profiles with login names and specialization names, optionally
/// narrowed to one specialization.
pub fn list_doctors(conn: &Connection, specialization_id: Option<&Uuid>) -> HospitalResult<Vec<DoctorListing>> {
    Ok(list_doctor_listings(conn, specialization_id)?)
}

// ═══════════════════════════════════════════
// Admin
// ═══════════════════════════════════════════

pub fn get_or_create_admin_profile(conn: &Connection, actor: &Actor) -> HospitalResult<AdminProfile> {
    actor.require_role(Role::Admin)?;
    ensure_identity(conn, actor)?;

    let fresh = AdminProfile {
        id: Uuid::new_v4(),
        identity_id: actor.identity_id,
        ..Default::default()
    };
    if insert_admin_profile_if_absent(conn, &fresh)? {
        tracing::debug!(identity_id = %actor.identity_id, "Created empty admin profile");
    }
    get_admin_profile_by_identity(conn, &actor.identity_id)?
        .ok_or(HospitalError::NotFound("AdminProfile"))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminProfileUpdate {
    pub department: String,
    pub name: String,
    pub position: Option<String>,
    pub employee_id: Option<String>,
    pub address: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Approval status is kept from the stored row; admins cannot approve themselves.
pub fn update_admin(
    conn: &Connection,
    actor: &Actor,
    update: AdminProfileUpdate,
) -> HospitalResult<AdminProfile> {
    let department = update.department.trim().to_string();
    let name = update.name.trim().to_string();
    if department.is_empty() || name.is_empty() {
        return Err(HospitalError::validation("department and name are required"));
    }
    check_name(&Some(name.clone()))?;

    let current = get_or_create_admin_profile(conn, actor)?;
    let profile = AdminProfile {
        id: current.id,
        identity_id: current.identity_id,
        department,
        name,
        position: blank_to_none(update.position),
        employee_id: blank_to_none(update.employee_id),
        address: blank_to_none(update.address),
        state: blank_to_none(update.state),
        postal_code: blank_to_none(update.postal_code),
        country: blank_to_none(update.country),
        is_approved: current.is_approved,
    };
    update_admin_profile(conn, &profile).map_err(|e| {
        if e.is_unique_violation() {
            HospitalError::validation("employee id already in use")
        } else {
            e.into()
        }
    })?;
    Ok(profile)
}
