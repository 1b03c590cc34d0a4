//! Workflow error taxonomy shared by identity, scheduling, clinical,
//! billing and directory operations.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum HospitalError {
    /// Missing entity, or one the caller does not own. The two are
    /// deliberately indistinguishable.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Appointment already confirmed")]
    AlreadyConfirmed,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Carries the gateway's message verbatim.
    #[error("{0}")]
    PaymentGateway(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl HospitalError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for HospitalError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}

pub type HospitalResult<T> = Result<T, HospitalError>;
