//! Shared fixtures for workflow and router tests.

use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::crypto::PasswordHasher;
use crate::db::repository::{
    insert_doctor_profile_if_absent, insert_identity, insert_specialization, now_timestamp,
};
use crate::models::{DoctorProfile, Identity, Role, Specialization, WeeklyAvailability};

/// Low iteration count keeps hashing out of test wall time.
pub fn hasher() -> PasswordHasher {
    PasswordHasher::new(1_000)
}

pub fn seed_identity(conn: &Connection, username: &str, role: Role) -> Actor {
    let identity = Identity {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash: hasher().hash("password1"),
        email: None,
        role,
        created_at: now_timestamp(),
    };
    insert_identity(conn, &identity).unwrap();
    Actor::new(identity.id, role)
}

pub fn seed_specialization(conn: &Connection, name: &str) -> Specialization {
    let spec = Specialization {
        id: Uuid::new_v4(),
        name: name.to_string(),
    };
    insert_specialization(conn, &spec).unwrap();
    spec
}

/// Doctor identity plus profile with the given weekly slots.
pub fn seed_doctor(
    conn: &Connection,
    username: &str,
    specialization: Option<&Specialization>,
    days: &[(&str, &str)],
) -> (Actor, DoctorProfile) {
    let actor = seed_identity(conn, username, Role::Doctor);
    let profile = DoctorProfile {
        id: Uuid::new_v4(),
        identity_id: actor.identity_id,
        name: Some(format!("Dr. {username}")),
        email: None,
        phone: None,
        specialization_id: specialization.map(|s| s.id),
        availability: WeeklyAvailability::from_entries(days.iter().copied()).unwrap(),
    };
    insert_doctor_profile_if_absent(conn, &profile).unwrap();
    (actor, profile)
}
