//! Medical records and prescriptions. Append-only; listings newest first.
//!
//! A medical record names only a patient. A prescription always hangs off an
//! appointment, and its patient comes from that appointment.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{require_doctor_profile, require_patient, Actor};
use crate::db::repository::{
    get_appointment, insert_medical_record, insert_prescription, list_medical_records_for_patient,
    list_prescriptions_for_patient, now_timestamp,
};
use crate::error::{HospitalError, HospitalResult};
use crate::models::{MedicalRecord, Prescription};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMedicalRecord {
    pub diagnosis: String,
    pub treatment_plan: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub allergies: String,
}

pub fn add_medical_record(
    conn: &Connection,
    actor: &Actor,
    patient_id: &Uuid,
    new: NewMedicalRecord,
) -> HospitalResult<MedicalRecord> {
    let doctor = require_doctor_profile(conn, actor)?;
    require_patient(conn, patient_id)?;
    if new.diagnosis.trim().is_empty() || new.treatment_plan.trim().is_empty() {
        return Err(HospitalError::validation("diagnosis and treatment plan are required"));
    }

    let record = MedicalRecord {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        doctor_id: Some(doctor.id),
        diagnosis: new.diagnosis,
        treatment_plan: new.treatment_plan,
        medications: new.medications,
        allergies: new.allergies,
        created_at: now_timestamp(),
    };
    insert_medical_record(conn, &record)?;
    tracing::info!(record_id = %record.id, doctor_id = %doctor.id, "Medical record added");
    Ok(record)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPrescription {
    pub medication_name: String,
    pub dosage_instructions: String,
    pub medicines: Option<String>,
    /// Accepted for form compatibility and ignored; the appointment decides.
    #[serde(default)]
    pub patient_id: Option<Uuid>,
}

/// Prescribe against an appointment. Only that appointment's doctor may do so.
pub fn add_prescription(
    conn: &Connection,
    actor: &Actor,
    appointment_id: &Uuid,
    new: NewPrescription,
) -> HospitalResult<Prescription> {
    let doctor = require_doctor_profile(conn, actor)?;
    let appointment =
        get_appointment(conn, appointment_id)?.ok_or(HospitalError::NotFound("Appointment"))?;
    if appointment.doctor_id != doctor.id {
        return Err(HospitalError::forbidden("not the doctor of this appointment"));
    }
    if new.medication_name.trim().is_empty() || new.dosage_instructions.trim().is_empty() {
        return Err(HospitalError::validation(
            "medication name and dosage instructions are required",
        ));
    }
    if let Some(supplied) = new.patient_id.filter(|p| *p != appointment.patient_id) {
        tracing::warn!(
            appointment_id = %appointment.id,
            supplied_patient = %supplied,
            "Ignoring patient id that does not match the appointment"
        );
    }

    let prescription = Prescription {
        id: Uuid::new_v4(),
        patient_id: appointment.patient_id,
        doctor_id: Some(doctor.id),
        appointment_id: Some(appointment.id),
        medication_name: new.medication_name,
        dosage_instructions: new.dosage_instructions,
        medicines: new.medicines.filter(|m| !m.trim().is_empty()),
        created_at: now_timestamp(),
    };
    insert_prescription(conn, &prescription)?;
    tracing::info!(prescription_id = %prescription.id, appointment_id = %appointment.id, "Prescription added");
    Ok(prescription)
}

pub fn list_medical_history(conn: &Connection, patient_id: &Uuid) -> HospitalResult<Vec<MedicalRecord>> {
    require_patient(conn, patient_id)?;
    Ok(list_medical_records_for_patient(conn, patient_id)?)
}

pub fn list_prescriptions(conn: &Connection, patient_id: &Uuid) -> HospitalResult<Vec<Prescription>> {
    require_patient(conn, patient_id)?;
    Ok(list_prescriptions_for_patient(conn, patient_id)?)
}
