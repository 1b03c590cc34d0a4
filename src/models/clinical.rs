use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only diagnosis entry written by a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// `None` once the authoring doctor has been removed.
    pub doctor_id: Option<Uuid>,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub medications: String,
    pub allergies: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub medication_name: String,
    pub dosage_instructions: String,
    pub medicines: Option<String>,
    pub created_at: NaiveDateTime,
}
