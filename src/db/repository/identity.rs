use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const IDENTITY_COLUMNS: &str = "id, username, password_hash, email, role, created_at";

struct IdentityRow {
    id: String,
    username: String,
    password_hash: String,
    email: Option<String>,
    role: String,
    created_at: String,
}

fn identity_row(row: &Row<'_>) -> rusqlite::Result<IdentityRow> {
    Ok(IdentityRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn identity_from_row(row: IdentityRow) -> Result<Identity, DatabaseError> {
    Ok(Identity {
        id: parse_uuid("identities.id", &row.id)?,
        username: row.username,
        password_hash: row.password_hash,
        email: row.email,
        role: Role::from_str(&row.role)?,
        created_at: parse_timestamp("identities.created_at", &row.created_at)?,
    })
}

pub fn insert_identity(conn: &Connection, identity: &Identity) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO identities (id, username, password_hash, email, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            identity.id.to_string(),
            identity.username,
            identity.password_hash,
            identity.email,
            identity.role.as_str(),
            format_timestamp(&identity.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_identity(conn: &Connection, id: &Uuid) -> Result<Option<Identity>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = ?1"),
        params![id.to_string()],
        identity_row,
    );
    match result {
        Ok(row) => Ok(Some(identity_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_identity_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<Identity>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE username = ?1"),
        params![username],
        identity_row,
    );
    match result {
        Ok(row) => Ok(Some(identity_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All identities in creation order, optionally restricted to one role.
pub fn list_identities(conn: &Connection, role: Option<Role>) -> Result<Vec<Identity>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {IDENTITY_COLUMNS} FROM identities
         WHERE ?1 IS NULL OR role = ?1
         ORDER BY rowid"
    ))?;
    let rows = stmt.query_map(params![role.map(|r| r.as_str())], identity_row)?;

    let mut identities = Vec::new();
    for row in rows {
        identities.push(identity_from_row(row?)?);
    }
    Ok(identities)
}

/// Hard delete. Role profiles cascade.
pub fn delete_identity(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM identities WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}
