use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_opt_uuid, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

// ═══════════════════════════════════════════
// Medical records
// ═══════════════════════════════════════════

struct MedicalRecordRow {
    id: String,
    patient_id: String,
    doctor_id: Option<String>,
    diagnosis: String,
    treatment_plan: String,
    medications: String,
    allergies: String,
    created_at: String,
}

fn medical_record_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecordRow> {
    Ok(MedicalRecordRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        diagnosis: row.get(3)?,
        treatment_plan: row.get(4)?,
        medications: row.get(5)?,
        allergies: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn medical_record_from_row(row: MedicalRecordRow) -> Result<MedicalRecord, DatabaseError> {
    Ok(MedicalRecord {
        id: parse_uuid("medical_records.id", &row.id)?,
        patient_id: parse_uuid("medical_records.patient_id", &row.patient_id)?,
        doctor_id: parse_opt_uuid("medical_records.doctor_id", row.doctor_id)?,
        diagnosis: row.diagnosis,
        treatment_plan: row.treatment_plan,
        medications: row.medications,
        allergies: row.allergies,
        created_at: parse_timestamp("medical_records.created_at", &row.created_at)?,
    })
}

pub fn insert_medical_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records (id, patient_id, doctor_id, diagnosis, treatment_plan,
         medications, allergies, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.doctor_id.map(|id| id.to_string()),
            record.diagnosis,
            record.treatment_plan,
            record.medications,
            record.allergies,
            format_timestamp(&record.created_at),
        ],
    )?;
    Ok(())
}

/// Newest first; rows written in the same microsecond fall back to insertion order, newest first.
pub fn list_medical_records_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, diagnosis, treatment_plan, medications, allergies, created_at
         FROM medical_records WHERE patient_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], medical_record_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(medical_record_from_row(row?)?);
    }
    Ok(records)
}

// ═══════════════════════════════════════════
// Prescriptions
// ═══════════════════════════════════════════

struct PrescriptionRow {
    id: String,
    patient_id: String,
    doctor_id: Option<String>,
    appointment_id: Option<String>,
    medication_name: String,
    dosage_instructions: String,
    medicines: Option<String>,
    created_at: String,
}

fn prescription_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        appointment_id: row.get(3)?,
        medication_name: row.get(4)?,
        dosage_instructions: row.get(5)?,
        medicines: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn prescription_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    Ok(Prescription {
        id: parse_uuid("prescriptions.id", &row.id)?,
        patient_id: parse_uuid("prescriptions.patient_id", &row.patient_id)?,
        doctor_id: parse_opt_uuid("prescriptions.doctor_id", row.doctor_id)?,
        appointment_id: parse_opt_uuid("prescriptions.appointment_id", row.appointment_id)?,
        medication_name: row.medication_name,
        dosage_instructions: row.dosage_instructions,
        medicines: row.medicines,
        created_at: parse_timestamp("prescriptions.created_at", &row.created_at)?,
    })
}

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, patient_id, doctor_id, appointment_id, medication_name,
         dosage_instructions, medicines, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            rx.id.to_string(),
            rx.patient_id.to_string(),
            rx.doctor_id.map(|id| id.to_string()),
            rx.appointment_id.map(|id| id.to_string()),
            rx.medication_name,
            rx.dosage_instructions,
            rx.medicines,
            format_timestamp(&rx.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_prescriptions_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, appointment_id, medication_name, dosage_instructions,
         medicines, created_at
         FROM prescriptions WHERE patient_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], prescription_row)?;

    let mut prescriptions = Vec::new();
    for row in rows {
        prescriptions.push(prescription_from_row(row?)?);
    }
    Ok(prescriptions)
}
