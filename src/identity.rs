//! Accounts and credentials: signup, login, bootstrap admin, admin listings.

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::Actor;
use crate::config::BootstrapAdmin;
use crate::crypto::PasswordHasher;
use crate::db::repository::{
    get_identity, get_identity_by_username, get_patient_profile_by_identity, insert_identity,
    list_identities, now_timestamp,
};
use crate::error::{HospitalError, HospitalResult};
use crate::models::{Identity, PatientProfile, Role};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_USERNAME_LENGTH: usize = 150;

static USERNAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+\-]+$").unwrap());

pub fn validate_username(username: &str) -> HospitalResult<()> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(HospitalError::validation(format!(
            "username must be 1-{MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !USERNAME_PATTERN.is_match(username) {
        return Err(HospitalError::validation(
            "username may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> HospitalResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(HospitalError::validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn normalize_email(email: Option<String>) -> HospitalResult<Option<String>> {
    match email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        Some(e) if !e.contains('@') => Err(HospitalError::validation("email address is invalid")),
        other => Ok(other),
    }
}

/// Create an account with a fixed role. The password is hashed before it
/// touches the store.
pub fn create_identity(
    conn: &Connection,
    hasher: &PasswordHasher,
    username: &str,
    email: Option<String>,
    password: &str,
    role: Role,
) -> HospitalResult<Identity> {
    validate_username(username)?;
    validate_password(password)?;
    let email = normalize_email(email)?;

    if get_identity_by_username(conn, username)?.is_some() {
        return Err(HospitalError::DuplicateUsername(username.to_string()));
    }

    let identity = Identity {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash: hasher.hash(password),
        email,
        role,
        created_at: now_timestamp(),
    };

    // A concurrent signup can still win between the check and the insert.
    insert_identity(conn, &identity).map_err(|e| {
        if e.is_unique_violation() {
            HospitalError::DuplicateUsername(username.to_string())
        } else {
            e.into()
        }
    })?;

    tracing::info!(identity_id = %identity.id, role = %role, "Identity created");
    Ok(identity)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    pub password_confirm: String,
}

/// Self-service signup. Always produces a patient.
pub fn signup(conn: &Connection, hasher: &PasswordHasher, req: SignupRequest) -> HospitalResult<Identity> {
    if req.password != req.password_confirm {
        return Err(HospitalError::validation("passwords do not match"));
    }
    create_identity(conn, hasher, req.username.trim(), req.email, &req.password, Role::Patient)
}

/// Check credentials. Unknown username and wrong password are the same error.
pub fn authenticate(
    conn: &Connection,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> HospitalResult<Identity> {
    let Some(identity) = get_identity_by_username(conn, username.trim())? else {
        return Err(HospitalError::InvalidCredentials);
    };

    match hasher.verify(password, &identity.password_hash) {
        Ok(true) => Ok(identity),
        Ok(false) => Err(HospitalError::InvalidCredentials),
        Err(e) => {
            tracing::error!(identity_id = %identity.id, error = %e, "Stored password hash unreadable");
            Err(HospitalError::InvalidCredentials)
        }
    }
}

/// Create the configured admin account unless the username is already taken.
/// Returns true when a new account was created.
pub fn ensure_bootstrap_admin(
    conn: &Connection,
    hasher: &PasswordHasher,
    admin: &BootstrapAdmin,
) -> HospitalResult<bool> {
    if let Some(existing) = get_identity_by_username(conn, &admin.username)? {
        if existing.role != Role::Admin {
            tracing::warn!(
                username = %admin.username,
                "Bootstrap admin username belongs to a non-admin account; skipping"
            );
        }
        return Ok(false);
    }
    create_identity(conn, hasher, &admin.username, None, &admin.password, Role::Admin)?;
    Ok(true)
}

// ═══════════════════════════════════════════════════════════
// Admin listings
// ═══════════════════════════════════════════════════════════

pub fn list_users(conn: &Connection, actor: &Actor) -> HospitalResult<Vec<Identity>> {
    actor.require_role(Role::Admin)?;
    Ok(list_identities(conn, None)?)
}

pub fn list_patients(conn: &Connection, actor: &Actor) -> HospitalResult<Vec<Identity>> {
    actor.require_role(Role::Admin)?;
    Ok(list_identities(conn, Some(Role::Patient))?)
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDetail {
    pub identity: Identity,
    pub profile: Option<PatientProfile>,
}

pub fn patient_detail(conn: &Connection, actor: &Actor, patient_id: &Uuid) -> HospitalResult<PatientDetail> {
    actor.require_role(Role::Admin)?;
    let identity = get_identity(conn, patient_id)?
        .filter(|i| i.role == Role::Patient)
        .ok_or(HospitalError::NotFound("Patient"))?;
    let profile = get_patient_profile_by_identity(conn, patient_id)?;
    Ok(PatientDetail { identity, profile })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::test_support::hasher;

    fn signup_req(username: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.into(),
            email: Some(format!("{username}@example.com")),
            password: password.into(),
            password_confirm: password.into(),
        }
    }

    #[test]
    fn signup_creates_patient_and_authenticates() {
        let conn = open_memory_database().unwrap();
        let created = signup(&conn, &hasher(), signup_req("alice", "wonderland1")).unwrap();
        assert_eq!(created.role, Role::Patient);
        assert_ne!(created.password_hash, "wonderland1");

        let logged_in = authenticate(&conn, &hasher(), "alice", "wonderland1").unwrap();
        assert_eq!(logged_in.id, created.id);
        assert_eq!(logged_in.role, Role::Patient);
    }

    #[test]
    fn role_survives_authentication_for_every_role() {
        let conn = open_memory_database().unwrap();
        for (name, role) in [("pat", Role::Patient), ("doc", Role::Doctor), ("adm", Role::Admin)] {
            create_identity(&conn, &hasher(), name, None, "password1", role).unwrap();
            assert_eq!(authenticate(&conn, &hasher(), name, "password1").unwrap().role, role);
        }
    }

    #[test]
    fn duplicate_username_rejected() {
        let conn = open_memory_database().unwrap();
        signup(&conn, &hasher(), signup_req("alice", "wonderland1")).unwrap();
        let err = signup(&conn, &hasher(), signup_req("alice", "different1")).unwrap_err();
        assert!(matches!(err, HospitalError::DuplicateUsername(name) if name == "alice"));
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() {
        let conn = open_memory_database().unwrap();
        signup(&conn, &hasher(), signup_req("alice", "wonderland1")).unwrap();
        assert!(matches!(
            authenticate(&conn, &hasher(), "alice", "nope-nope"),
            Err(HospitalError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&conn, &hasher(), "mallory", "wonderland1"),
            Err(HospitalError::InvalidCredentials)
        ));
    }

    #[test]
    fn signup_validation() {
        let conn = open_memory_database().unwrap();
        let mut mismatch = signup_req("bob", "password1");
        mismatch.password_confirm = "password2".into();
        assert!(matches!(signup(&conn, &hasher(), mismatch), Err(HospitalError::Validation(_))));
        assert!(matches!(
            signup(&conn, &hasher(), signup_req("bob", "short")),
            Err(HospitalError::Validation(_))
        ));
        assert!(matches!(
            signup(&conn, &hasher(), signup_req("bob smith", "password1")),
            Err(HospitalError::Validation(_))
        ));
        assert!(matches!(
            signup(&conn, &hasher(), signup_req(&"x".repeat(151), "password1")),
            Err(HospitalError::Validation(_))
        ));
    }

    #[test]
    fn username_charset() {
        assert!(validate_username("dr.bob+clinic@north_wing-2").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("semi;colon").is_err());
    }

    #[test]
    fn bootstrap_admin_is_created_once() {
        let conn = open_memory_database().unwrap();
        let admin = BootstrapAdmin {
            username: "root".into(),
            password: "rootpass1".into(),
        };
        assert!(ensure_bootstrap_admin(&conn, &hasher(), &admin).unwrap());
        assert!(!ensure_bootstrap_admin(&conn, &hasher(), &admin).unwrap());
        assert_eq!(authenticate(&conn, &hasher(), "root", "rootpass1").unwrap().role, Role::Admin);
    }

    #[test]
    fn admin_listings_are_admin_only() {
        let conn = open_memory_database().unwrap();
        let admin = create_identity(&conn, &hasher(), "root", None, "rootpass1", Role::Admin).unwrap();
        let alice = signup(&conn, &hasher(), signup_req("alice", "wonderland1")).unwrap();
        create_identity(&conn, &hasher(), "drbob", None, "password1", Role::Doctor).unwrap();

        let admin_actor = Actor::new(admin.id, Role::Admin);
        assert_eq!(list_users(&conn, &admin_actor).unwrap().len(), 3);
        let patients = list_patients(&conn, &admin_actor).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].id, alice.id);

        let detail = patient_detail(&conn, &admin_actor, &alice.id).unwrap();
        assert_eq!(detail.identity.username, "alice");
        assert!(detail.profile.is_none());

        let patient_actor = Actor::new(alice.id, Role::Patient);
        assert!(matches!(list_users(&conn, &patient_actor), Err(HospitalError::Forbidden(_))));
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let conn = open_memory_database().unwrap();
        let created = signup(&conn, &hasher(), signup_req("alice", "wonderland1")).unwrap();
        let json = serde_json::to_string(&created).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("pbkdf2"));
    }
}
