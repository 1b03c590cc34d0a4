use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

struct PatientProfileRow {
    id: String,
    identity_id: String,
    name: Option<String>,
    age: Option<u32>,
    phone: Option<String>,
    address: Option<String>,
    medications: String,
    medical_history: String,
    treatment_plans: String,
}

fn patient_profile_row(row: &Row<'_>) -> rusqlite::Result<PatientProfileRow> {
    Ok(PatientProfileRow {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        name: row.get(2)?,
        age: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        medications: row.get(6)?,
        medical_history: row.get(7)?,
        treatment_plans: row.get(8)?,
    })
}

fn patient_profile_from_row(row: PatientProfileRow) -> Result<PatientProfile, DatabaseError> {
    Ok(PatientProfile {
        id: parse_uuid("patient_profiles.id", &row.id)?,
        identity_id: parse_uuid("patient_profiles.identity_id", &row.identity_id)?,
        name: row.name,
        age: row.age,
        phone: row.phone,
        address: row.address,
        medications: row.medications,
        medical_history: row.medical_history,
        treatment_plans: row.treatment_plans,
    })
}

/// Insert unless the identity already has a profile. Returns whether a row was written.
pub fn insert_patient_profile_if_absent(
    conn: &Connection,
    profile: &PatientProfile,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO patient_profiles (id, identity_id, name, age, phone, address,
         medications, medical_history, treatment_plans)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            profile.id.to_string(),
            profile.identity_id.to_string(),
            profile.name,
            profile.age,
            profile.phone,
            profile.address,
            profile.medications,
            profile.medical_history,
            profile.treatment_plans,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn get_patient_profile_by_identity(
    conn: &Connection,
    identity_id: &Uuid,
) -> Result<Option<PatientProfile>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, identity_id, name, age, phone, address, medications, medical_history, treatment_plans
         FROM patient_profiles WHERE identity_id = ?1",
        params![identity_id.to_string()],
        patient_profile_row,
    );
    match result {
        Ok(row) => Ok(Some(patient_profile_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Whole-record replace of the editable fields, keyed by profile id.
pub fn update_patient_profile(conn: &Connection, profile: &PatientProfile) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE patient_profiles SET name = ?2, age = ?3, phone = ?4, address = ?5,
         medications = ?6, medical_history = ?7, treatment_plans = ?8
         WHERE id = ?1",
        params![
            profile.id.to_string(),
            profile.name,
            profile.age,
            profile.phone,
            profile.address,
            profile.medications,
            profile.medical_history,
            profile.treatment_plans,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "PatientProfile".into(),
            id: profile.id.to_string(),
        });
    }
    Ok(())
}
