use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{parse_opt_uuid, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

struct DoctorProfileRow {
    id: String,
    identity_id: String,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    specialization_id: Option<String>,
    availability: String,
}

const DOCTOR_COLUMNS: &str =
    "d.id, d.identity_id, d.name, d.email, d.phone, d.specialization_id, d.availability";

fn doctor_profile_row(row: &Row<'_>) -> rusqlite::Result<DoctorProfileRow> {
    Ok(DoctorProfileRow {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        specialization_id: row.get(5)?,
        availability: row.get(6)?,
    })
}

fn doctor_profile_from_row(row: DoctorProfileRow) -> Result<DoctorProfile, DatabaseError> {
    let availability: WeeklyAvailability =
        serde_json::from_str(&row.availability).map_err(|_| DatabaseError::InvalidValue {
            field: "doctor_profiles.availability".into(),
            value: row.availability.clone(),
        })?;
    Ok(DoctorProfile {
        id: parse_uuid("doctor_profiles.id", &row.id)?,
        identity_id: parse_uuid("doctor_profiles.identity_id", &row.identity_id)?,
        name: row.name,
        email: row.email,
        phone: row.phone,
        specialization_id: parse_opt_uuid("doctor_profiles.specialization_id", row.specialization_id)?,
        availability,
    })
}

fn availability_json(availability: &WeeklyAvailability) -> Result<String, DatabaseError> {
    serde_json::to_string(availability)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("availability not serializable: {e}")))
}

/// Insert unless the identity already has a doctor profile. Returns whether a row was written.
pub fn insert_doctor_profile_if_absent(
    conn: &Connection,
    profile: &DoctorProfile,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO doctor_profiles (id, identity_id, name, email, phone, specialization_id, availability)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            profile.id.to_string(),
            profile.identity_id.to_string(),
            profile.name,
            profile.email,
            profile.phone,
            profile.specialization_id.map(|id| id.to_string()),
            availability_json(&profile.availability)?,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn get_doctor_profile(conn: &Connection, id: &Uuid) -> Result<Option<DoctorProfile>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {DOCTOR_COLUMNS} FROM doctor_profiles d WHERE d.id = ?1"),
        params![id.to_string()],
        doctor_profile_row,
    );
    match result {
        Ok(row) => Ok(Some(doctor_profile_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_doctor_profile_by_identity(
    conn: &Connection,
    identity_id: &Uuid,
) -> Result<Option<DoctorProfile>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {DOCTOR_COLUMNS} FROM doctor_profiles d WHERE d.identity_id = ?1"),
        params![identity_id.to_string()],
        doctor_profile_row,
    );
    match result {
        Ok(row) => Ok(Some(doctor_profile_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Doctors with login and specialization names, in creation order.
/// `specialization_id` narrows the list to one catalog entry.
pub fn list_doctor_listings(
    conn: &Connection,
    specialization_id: Option<&Uuid>,
) -> Result<Vec<DoctorListing>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS}, i.username, s.name
         FROM doctor_profiles d
         JOIN identities i ON i.id = d.identity_id
         LEFT JOIN specializations s ON s.id = d.specialization_id
         WHERE ?1 IS NULL OR d.specialization_id = ?1
         ORDER BY d.rowid"
    ))?;
    let rows = stmt.query_map(params![specialization_id.map(|id| id.to_string())], |row| {
        Ok((
            doctor_profile_row(row)?,
            row.get::<_, String>(7)?,
            row.get::<_, Option<String>>(8)?,
        ))
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let (profile_row, username, specialization) = row?;
        listings.push(DoctorListing {
            profile: doctor_profile_from_row(profile_row)?,
            username,
            specialization,
        });
    }
    Ok(listings)
}

pub fn update_doctor_profile(conn: &Connection, profile: &DoctorProfile) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE doctor_profiles SET name = ?2, email = ?3, phone = ?4, specialization_id = ?5,
         availability = ?6
         WHERE id = ?1",
        params![
            profile.id.to_string(),
            profile.name,
            profile.email,
            profile.phone,
            profile.specialization_id.map(|id| id.to_string()),
            availability_json(&profile.availability)?,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "DoctorProfile".into(),
            id: profile.id.to_string(),
        });
    }
    Ok(())
}
