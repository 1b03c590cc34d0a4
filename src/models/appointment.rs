use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// Default slot length when the booking form leaves it out.
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// Patient identity. Immutable after creation.
    pub patient_id: Uuid,
    /// Doctor profile. Immutable after creation.
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub is_virtual: bool,
    pub location: Option<String>,
    pub notes: String,
    pub created_at: NaiveDateTime,
}
