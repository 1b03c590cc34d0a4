use rusqlite::{params, Connection};

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_facility(conn: &Connection, facility: &Facility) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO facilities (id, name, location, department, resources, resource_quantity, resource_available)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            facility.id.to_string(),
            facility.name,
            facility.location,
            facility.department,
            facility.resources,
            facility.resource_quantity,
            facility.resource_available as i32,
        ],
    )?;
    Ok(())
}

pub fn list_facilities(conn: &Connection) -> Result<Vec<Facility>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, location, department, resources, resource_quantity, resource_available
         FROM facilities ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, u32>(5)?,
            row.get::<_, bool>(6)?,
        ))
    })?;

    let mut facilities = Vec::new();
    for row in rows {
        let (id, name, location, department, resources, resource_quantity, resource_available) = row?;
        facilities.push(Facility {
            id: parse_uuid("facilities.id", &id)?,
            name,
            location,
            department,
            resources,
            resource_quantity,
            resource_available,
        });
    }
    Ok(facilities)
}

pub fn insert_health_resource(
    conn: &Connection,
    resource: &HealthEducationResource,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_resources (id, title, description, link) VALUES (?1, ?2, ?3, ?4)",
        params![resource.id.to_string(), resource.title, resource.description, resource.link],
    )?;
    Ok(())
}

pub fn list_health_resources(conn: &Connection) -> Result<Vec<HealthEducationResource>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT id, title, description, link FROM health_resources ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut resources = Vec::new();
    for row in rows {
        let (id, title, description, link) = row?;
        resources.push(HealthEducationResource {
            id: parse_uuid("health_resources.id", &id)?,
            title,
            description,
            link,
        });
    }
    Ok(resources)
}
