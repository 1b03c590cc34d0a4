//! Admin-managed catalog of doctor specializations.

use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::db::repository::{delete_specialization, insert_specialization, list_specializations};
use crate::error::{HospitalError, HospitalResult};
use crate::models::{Role, Specialization};

pub const MAX_SPECIALIZATION_NAME_LENGTH: usize = 100;

pub fn list(conn: &Connection) -> HospitalResult<Vec<Specialization>> {
    Ok(list_specializations(conn)?)
}

pub fn create(conn: &Connection, actor: &Actor, name: &str) -> HospitalResult<Specialization> {
    actor.require_role(Role::Admin)?;
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_SPECIALIZATION_NAME_LENGTH {
        return Err(HospitalError::validation(format!(
            "specialization name must be 1-{MAX_SPECIALIZATION_NAME_LENGTH} characters"
        )));
    }

    let spec = Specialization {
        id: Uuid::new_v4(),
        name: name.to_string(),
    };
    insert_specialization(conn, &spec).map_err(|e| {
        if e.is_unique_violation() {
            HospitalError::validation(format!("specialization '{name}' already exists"))
        } else {
            e.into()
        }
    })?;
    tracing::info!(specialization_id = %spec.id, "Specialization created");
    Ok(spec)
}

/// Doctors keep their profiles; their specialization reference is cleared.
pub fn delete(conn: &Connection, actor: &Actor, id: &Uuid) -> HospitalResult<()> {
    actor.require_role(Role::Admin)?;
    if !delete_specialization(conn, id)? {
        return Err(HospitalError::NotFound("Specialization"));
    }
    tracing::info!(specialization_id = %id, "Specialization deleted");
    Ok(())
}
