//! Role gates shared by every workflow entry point.
//!
//! The acting identity arrives as an [`Actor`]. Role checks fail with
//! `Forbidden`; lookups of another user's rows fail with `NotFound` so that
//! existence is not leaked.

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{get_doctor_profile_by_identity, get_identity};
use crate::error::{HospitalError, HospitalResult};
use crate::models::{DoctorProfile, Identity, Role};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The authenticated identity performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub identity_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(identity_id: Uuid, role: Role) -> Self {
        Self { identity_id, role }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// Fail with `Forbidden` unless the actor holds `role`.
    pub fn require_role(&self, role: Role) -> HospitalResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(HospitalError::forbidden(format!("{role} role required")))
        }
    }

    /// Fail with `Forbidden` unless the actor holds one of `roles`.
    pub fn require_any(&self, roles: &[Role]) -> HospitalResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
            Err(HospitalError::forbidden(format!(
                "one of [{}] roles required",
                names.join(", ")
            )))
        }
    }
}

/// Landing view for each role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dashboard {
    PatientDashboard,
    DoctorDashboard,
    AdminDashboard,
}

impl Dashboard {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PatientDashboard => "patient_dashboard",
            Self::DoctorDashboard => "doctor_dashboard",
            Self::AdminDashboard => "admin_dashboard",
        }
    }
}

pub fn dashboard_for(role: Role) -> Dashboard {
    match role {
        Role::Patient => Dashboard::PatientDashboard,
        Role::Doctor => Dashboard::DoctorDashboard,
        Role::Admin => Dashboard::AdminDashboard,
    }
}

// ═══════════════════════════════════════════════════════════
// Store-backed checks
// ═══════════════════════════════════════════════════════════

/// The actor's doctor profile. Having one is what makes an identity a
/// practising doctor, so its absence is `Forbidden` rather than `NotFound`.
pub fn require_doctor_profile(conn: &Connection, actor: &Actor) -> HospitalResult<DoctorProfile> {
    get_doctor_profile_by_identity(conn, &actor.identity_id)?
        .ok_or_else(|| HospitalError::forbidden("doctor profile required"))
}

/// Resolve an identity that must be a patient. Anything else reads as absent.
pub fn require_patient(conn: &Connection, identity_id: &Uuid) -> HospitalResult<Identity> {
    match get_identity(conn, identity_id)? {
        Some(identity) if identity.role == Role::Patient => Ok(identity),
        _ => Err(HospitalError::NotFound("Patient")),
    }
}
