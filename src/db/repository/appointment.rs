use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_date, parse_time, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, date, time, duration_minutes, status,
     is_virtual, location, notes, created_at";

struct AppointmentRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    date: String,
    time: String,
    duration_minutes: u32,
    status: String,
    is_virtual: bool,
    location: Option<String>,
    notes: String,
    created_at: String,
}

fn appointment_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        duration_minutes: row.get(5)?,
        status: row.get(6)?,
        is_virtual: row.get(7)?,
        location: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid("appointments.id", &row.id)?,
        patient_id: parse_uuid("appointments.patient_id", &row.patient_id)?,
        doctor_id: parse_uuid("appointments.doctor_id", &row.doctor_id)?,
        date: parse_date("appointments.date", &row.date)?,
        time: parse_time("appointments.time", &row.time)?,
        duration_minutes: row.duration_minutes,
        status: AppointmentStatus::from_str(&row.status)?,
        is_virtual: row.is_virtual,
        location: row.location,
        notes: row.notes,
        created_at: parse_timestamp("appointments.created_at", &row.created_at)?,
    })
}

fn collect_appointments(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, appointment_row)?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(appointment_from_row(row?)?);
    }
    Ok(appointments)
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, date, time, duration_minutes, status,
         is_virtual, location, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.date.to_string(),
            appt.time.format("%H:%M:%S").to_string(),
            appt.duration_minutes,
            appt.status.as_str(),
            appt.is_virtual as i32,
            appt.location,
            appt.notes,
            format_timestamp(&appt.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id.to_string()],
        appointment_row,
    );
    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Lookup scoped to one patient. Another patient's appointment reads as absent.
pub fn get_appointment_for_patient(
    conn: &Connection,
    id: &Uuid,
    patient_id: &Uuid,
) -> Result<Option<Appointment>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1 AND patient_id = ?2"),
        params![id.to_string(), patient_id.to_string()],
        appointment_row,
    );
    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Patient's appointments in storage (creation) order.
pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    collect_appointments(
        conn,
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE patient_id = ?1 ORDER BY rowid"),
        params![patient_id.to_string()],
    )
}

/// Doctor's appointments in storage (creation) order.
pub fn list_appointments_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    collect_appointments(
        conn,
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE doctor_id = ?1 ORDER BY rowid"),
        params![doctor_id.to_string()],
    )
}

pub fn list_all_appointments(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    collect_appointments(
        conn,
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY rowid"),
        [],
    )
}

/// Compare-and-set on status. Returns false when the row was not in `from`.
pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE appointments SET status = ?3 WHERE id = ?1 AND status = ?2",
        params![id.to_string(), from.as_str(), to.as_str()],
    )?;
    Ok(updated > 0)
}

pub fn delete_appointment(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

/// Any appointment at all (any status, any time) for the doctor on that date.
pub fn doctor_has_appointment_on(
    conn: &Connection,
    doctor_id: &Uuid,
    date: NaiveDate,
) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM appointments WHERE doctor_id = ?1 AND date = ?2)",
        params![doctor_id.to_string(), date.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn count_appointments_for_doctor(conn: &Connection, doctor_id: &Uuid) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE doctor_id = ?1",
        params![doctor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}
