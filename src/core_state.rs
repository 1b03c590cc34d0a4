//! Transport-agnostic application state.
//!
//! `CoreState` is built once at startup and shared behind an `Arc` by the
//! HTTP layer. It owns configuration, the login session store, the audit
//! buffer and the payment gateway; every request opens its own SQLite
//! connection through [`CoreState::open_db`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::AppConfig;
use crate::crypto::PasswordHasher;
use crate::db;
use crate::payment_gateway::{PaymentGateway, StripeGateway};
use crate::sessions::{LoginLockout, SessionStore};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
pub const AUDIT_RETENTION_DAYS: i64 = 90;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    pub hasher: PasswordHasher,
    /// Live bearer-token sessions. Validation takes the read lock; only
    /// login, logout and revocation write.
    sessions: RwLock<SessionStore>,
    lockout: Mutex<LoginLockout>,
    audit: AuditLogger,
    gateway: Arc<dyn PaymentGateway>,
}

impl CoreState {
    /// Build state with the HTTP payment gateway configured from `config`.
    pub fn new(config: AppConfig) -> Self {
        let gateway = Arc::new(StripeGateway::new(config.payment.clone()));
        Self::with_gateway(config, gateway)
    }

    /// Build state around an explicit gateway implementation.
    pub fn with_gateway(config: AppConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            hasher: PasswordHasher::new(config.password_iterations),
            sessions: RwLock::new(SessionStore::new(config.session_ttl)),
            lockout: Mutex::new(LoginLockout::new()),
            audit: AuditLogger::new(),
            gateway,
            config,
        }
    }

    /// Open a database connection, creating the file and applying migrations
    /// as needed.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.config.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.db_path.clone()
    }

    pub fn gateway(&self) -> Arc<dyn PaymentGateway> {
        Arc::clone(&self.gateway)
    }

    // ── Sessions ────────────────────────────────────────────

    pub fn read_sessions(&self) -> Result<RwLockReadGuard<'_, SessionStore>, CoreError> {
        self.sessions.read().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn write_sessions(&self) -> Result<RwLockWriteGuard<'_, SessionStore>, CoreError> {
        self.sessions.write().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn lock_lockout(&self) -> Result<MutexGuard<'_, LoginLockout>, CoreError> {
        self.lockout.lock().map_err(|_| CoreError::LockPoisoned)
    }

    // ── Audit logging ───────────────────────────────────────

    /// Log an access event. Auto-flushes to DB when buffer is full.
    pub fn log_access(&self, identity_id: Option<String>, action: &str, entity: &str) {
        let needs_flush = self.audit.log(identity_id, action, entity);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Get the current audit buffer contents (for testing/flush).
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush audit buffer to DB and prune old entries.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        self.audit.flush_to_db(&conn)?;
        if let Err(e) = crate::db::repository::prune_audit_log(&conn, AUDIT_RETENTION_DAYS) {
            tracing::warn!("Audit prune failed: {e}");
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit buffer, flushed to the `audit_log` table in batches.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub identity_id: Option<String>,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Log an access event to the in-memory buffer.
    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, identity_id: Option<String>, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: chrono::Utc::now(),
                identity_id,
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Write buffered entries to SQLite. Timestamps use SQLite's
    /// `datetime()` text form so retention pruning compares correctly.
    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let tuples: Vec<(String, Option<String>, String, String)> = entries
            .iter()
            .map(|e| {
                (
                    e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    e.identity_id.clone(),
                    e.action.clone(),
                    e.entity.clone(),
                )
            })
            .collect();

        let count = tuples.len();
        crate::db::repository::insert_audit_entries(conn, &tuples)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;
    use crate::payment_gateway::mock::MockGateway;

    fn test_state(dir: &tempfile::TempDir) -> CoreState {
        let db_path = dir.path().join("hospital.db").to_string_lossy().to_string();
        let config = AppConfig::from_lookup(|key| match key {
            "EHOSPITAL_DB_PATH" => Some(db_path.clone()),
            "EHOSPITAL_PASSWORD_ITERATIONS" => Some("1000".into()),
            _ => None,
        })
        .unwrap();
        CoreState::with_gateway(config, Arc::new(MockGateway::succeeding("ch_test")))
    }

    #[test]
    fn open_db_creates_and_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let conn = state.open_db().unwrap();
        assert!(db::count_tables(&conn).unwrap() >= 14);
        assert!(state.db_path().exists());
    }

    #[test]
    fn hasher_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(test_state(&dir).hasher.iterations(), 1_000);
    }

    #[test]
    fn sessions_shared_through_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let id = uuid::Uuid::new_v4();
        let token = state.write_sessions().unwrap().issue(id, "alice", Role::Patient);
        let session = state.read_sessions().unwrap().validate(&token).unwrap();
        assert_eq!(session.identity_id, id);
        assert_eq!(state.read_sessions().unwrap().len(), 1);
    }

    #[test]
    fn audit_logger_buffers_entries() {
        let logger = AuditLogger::new();
        assert_eq!(logger.buffer_len(), 0);

        logger.log(Some("id-1".into()), "GET /api/billing", "status:200");
        logger.log(None, "POST /api/login", "status:401");
        assert_eq!(logger.buffer_len(), 2);

        let entries = logger.entries();
        assert_eq!(entries[0].identity_id.as_deref(), Some("id-1"));
        assert!(entries[1].identity_id.is_none());
    }

    #[test]
    fn audit_logger_signals_flush_at_capacity() {
        let logger = AuditLogger::new();
        for i in 0..(AUDIT_BUFFER_CAPACITY - 1) {
            assert!(!logger.log(None, &format!("action_{i}"), "entity"));
        }
        assert!(logger.log(None, "last", "entity"));
    }

    #[test]
    fn flush_writes_rows_and_empties_buffer() {
        let conn = open_memory_database().unwrap();
        let logger = AuditLogger::new();
        assert_eq!(logger.flush_to_db(&conn).unwrap(), 0);

        logger.log(Some("id-1".into()), "GET /api/appointments", "status:200");
        logger.log(Some("id-1".into()), "POST /api/appointments", "status:201");
        assert_eq!(logger.flush_to_db(&conn).unwrap(), 2);
        assert_eq!(logger.buffer_len(), 0);

        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
        // Fresh rows survive retention pruning.
        assert_eq!(crate::db::repository::prune_audit_log(&conn, AUDIT_RETENTION_DAYS).unwrap(), 0);
    }

    #[test]
    fn state_flush_goes_to_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        state.log_access(Some("id-1".into()), "GET /api/dashboard", "status:200");
        state.flush_and_prune_audit().unwrap();
        assert!(state.audit_entries().is_empty());

        let conn = state.open_db().unwrap();
        let recent = crate::db::repository::query_audit_by_identity(&conn, "id-1", 1).unwrap();
        assert_eq!(recent.len(), 1);
    }
}
