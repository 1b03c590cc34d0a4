use std::collections::BTreeMap;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub name: Option<String>,
    pub age: Option<u32>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medications: String,
    pub medical_history: String,
    pub treatment_plans: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization_id: Option<Uuid>,
    pub availability: WeeklyAvailability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub department: String,
    pub name: String,
    pub position: Option<String>,
    pub employee_id: Option<String>,
    pub address: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub is_approved: bool,
}

/// Doctor profile joined with its login name and specialization name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorListing {
    #[serde(flatten)]
    pub profile: DoctorProfile,
    pub username: String,
    pub specialization: Option<String>,
}

/// Weekday name → free-text slot description, e.g. `"Monday" → "9 AM - 5 PM"`.
///
/// Keys are canonical English weekday names. Only used to filter the
/// available-doctors lookup; bookings are never rejected on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyAvailability(BTreeMap<String, String>);

impl WeeklyAvailability {
    /// Build from raw entries, canonicalising weekday keys ("mon", "MONDAY" → "Monday").
    /// Returns the first key that is not a weekday.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut slots = BTreeMap::new();
        for (key, value) in entries {
            let day: Weekday = key
                .as_ref()
                .trim()
                .parse()
                .map_err(|_| key.as_ref().to_string())?;
            slots.insert(weekday_name(day).to_string(), value.into());
        }
        Ok(Self(slots))
    }

    /// Slot description for the given weekday, if the doctor works that day.
    pub fn slot_for(&self, day: Weekday) -> Option<&str> {
        self.0.get(weekday_name(day)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Full English weekday name (chrono's `Display` only gives "Mon").
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
