//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per table
//! family. Rows are read as raw SQLite values first, then converted into
//! model structs so that malformed stored values surface as `DatabaseError`
//! instead of panics.

mod admin_profile;
mod appointment;
mod audit;
mod billing;
mod clinical;
mod doctor_profile;
mod facility;
mod identity;
mod patient_profile;
mod specialization;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use super::DatabaseError;

pub use admin_profile::*;
pub use appointment::*;
pub use audit::*;
pub use billing::*;
pub use clinical::*;
pub use doctor_profile::*;
pub use facility::*;
pub use identity::*;
pub use patient_profile::*;
pub use specialization::*;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Storage format for timestamps. Fixed precision keeps text ordering chronological.
pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(field: &str, s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map_err(|_| invalid(field, s))
}

pub(crate) fn parse_uuid(field: &str, s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|_| invalid(field, s))
}

pub(crate) fn parse_opt_uuid(field: &str, s: Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    s.map(|v| parse_uuid(field, &v)).transpose()
}

pub(crate) fn parse_date(field: &str, s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid(field, s))
}

pub(crate) fn parse_time(field: &str, s: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").map_err(|_| invalid(field, s))
}

fn invalid(field: &str, value: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Current UTC time truncated to microseconds, matching the stored precision.
pub fn now_timestamp() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    parse_timestamp("now", &format_timestamp(&now)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip_keeps_microseconds() {
        let ts = NaiveDateTime::parse_from_str("2024-05-01 10:00:00.123456", "%Y-%m-%d %H:%M:%S%.f")
            .unwrap();
        let stored = format_timestamp(&ts);
        assert_eq!(stored, "2024-05-01 10:00:00.123456");
        assert_eq!(parse_timestamp("created_at", &stored).unwrap(), ts);
    }

    #[test]
    fn stored_timestamps_sort_chronologically() {
        let earlier = NaiveDateTime::parse_from_str("2024-05-01 09:59:59.9", "%Y-%m-%d %H:%M:%S%.f")
            .unwrap();
        let later = NaiveDateTime::parse_from_str("2024-05-01 10:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
    }

    #[test]
    fn malformed_uuid_is_reported() {
        let err = parse_uuid("patient_id", "not-a-uuid").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidValue { .. }));
    }
}
