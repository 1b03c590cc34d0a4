use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_specialization(conn: &Connection, spec: &Specialization) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO specializations (id, name) VALUES (?1, ?2)",
        params![spec.id.to_string(), spec.name],
    )?;
    Ok(())
}

pub fn get_specialization(conn: &Connection, id: &Uuid) -> Result<Option<Specialization>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name FROM specializations WHERE id = ?1",
        params![id.to_string()],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    );
    match result {
        Ok((id, name)) => Ok(Some(Specialization {
            id: parse_uuid("specializations.id", &id)?,
            name,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_specializations(conn: &Connection) -> Result<Vec<Specialization>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name FROM specializations ORDER BY name COLLATE NOCASE")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut specs = Vec::new();
    for row in rows {
        let (id, name) = row?;
        specs.push(Specialization {
            id: parse_uuid("specializations.id", &id)?,
            name,
        });
    }
    Ok(specs)
}

/// Delete a catalog entry. Doctor references are nulled by the foreign key.
pub fn delete_specialization(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM specializations WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}
