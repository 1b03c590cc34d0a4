use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

struct AdminProfileRow {
    id: String,
    identity_id: String,
    department: String,
    name: String,
    position: Option<String>,
    employee_id: Option<String>,
    address: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
    is_approved: bool,
}

fn admin_profile_row(row: &Row<'_>) -> rusqlite::Result<AdminProfileRow> {
    Ok(AdminProfileRow {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        department: row.get(2)?,
        name: row.get(3)?,
        position: row.get(4)?,
        employee_id: row.get(5)?,
        address: row.get(6)?,
        state: row.get(7)?,
        postal_code: row.get(8)?,
        country: row.get(9)?,
        is_approved: row.get(10)?,
    })
}

fn admin_profile_from_row(row: AdminProfileRow) -> Result<AdminProfile, DatabaseError> {
    Ok(AdminProfile {
        id: parse_uuid("admin_profiles.id", &row.id)?,
        identity_id: parse_uuid("admin_profiles.identity_id", &row.identity_id)?,
        department: row.department,
        name: row.name,
        position: row.position,
        employee_id: row.employee_id,
        address: row.address,
        state: row.state,
        postal_code: row.postal_code,
        country: row.country,
        is_approved: row.is_approved,
    })
}

pub fn insert_admin_profile_if_absent(
    conn: &Connection,
    profile: &AdminProfile,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO admin_profiles (id, identity_id, department, name, position,
         employee_id, address, state, postal_code, country, is_approved)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            profile.id.to_string(),
            profile.identity_id.to_string(),
            profile.department,
            profile.name,
            profile.position,
            profile.employee_id,
            profile.address,
            profile.state,
            profile.postal_code,
            profile.country,
            profile.is_approved as i32,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn get_admin_profile_by_identity(
    conn: &Connection,
    identity_id: &Uuid,
) -> Result<Option<AdminProfile>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, identity_id, department, name, position, employee_id, address, state,
         postal_code, country, is_approved
         FROM admin_profiles WHERE identity_id = ?1",
        params![identity_id.to_string()],
        admin_profile_row,
    );
    match result {
        Ok(row) => Ok(Some(admin_profile_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_admin_profile(conn: &Connection, profile: &AdminProfile) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE admin_profiles SET department = ?2, name = ?3, position = ?4, employee_id = ?5,
         address = ?6, state = ?7, postal_code = ?8, country = ?9, is_approved = ?10
         WHERE id = ?1",
        params![
            profile.id.to_string(),
            profile.department,
            profile.name,
            profile.position,
            profile.employee_id,
            profile.address,
            profile.state,
            profile.postal_code,
            profile.country,
            profile.is_approved as i32,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "AdminProfile".into(),
            id: profile.id.to_string(),
        });
    }
    Ok(())
}
