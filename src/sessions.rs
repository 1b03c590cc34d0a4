//! In-memory login sessions and failed-login lockout.
//!
//! Bearer tokens are never stored; only their SHA-256 digest is kept as the
//! map key. Sessions expire after a fixed TTL and are dropped on logout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::models::Role;

/// Consecutive failures before a username is locked.
pub const MAX_FAILED_LOGINS: u32 = 5;
/// Lock duration once the threshold is hit.
pub const LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

// ═══════════════════════════════════════════════════════════
// SessionStore
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Session {
    pub identity_id: Uuid,
    pub username: String,
    pub role: Role,
    expires_at: Instant,
}

pub struct SessionStore {
    sessions: HashMap<[u8; 32], Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Open a session and return the bearer token. The token itself is not kept.
    pub fn issue(&mut self, identity_id: Uuid, username: &str, role: Role) -> String {
        if self.sessions.len() > 1000 {
            self.prune_expired();
        }

        let token = generate_token();
        self.sessions.insert(
            hash_token(&token),
            Session {
                identity_id,
                username: username.to_string(),
                role,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Resolve a token to its live session. Expired entries are left for
    /// [`SessionStore::prune_expired`].
    pub fn validate(&self, token: &str) -> Option<Session> {
        self.sessions
            .get(&hash_token(token))
            .filter(|session| Instant::now() < session.expires_at)
            .cloned()
    }

    /// Returns true if a session was removed.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(&hash_token(token)).is_some()
    }

    /// Drop every session belonging to an identity (e.g. account removed).
    pub fn revoke_identity(&mut self, identity_id: &Uuid) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| &s.identity_id != identity_id);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn prune_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now < s.expires_at);
        before - self.sessions.len()
    }
}

// ═══════════════════════════════════════════════════════════
// LoginLockout
// ═══════════════════════════════════════════════════════════

struct FailureRecord {
    count: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

impl FailureRecord {
    /// Stale once a lock has run out, or an unlocked streak has been quiet
    /// for a whole lock window.
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.locked_until {
            Some(until) => now >= until,
            None => now.duration_since(self.last_failure) >= window,
        }
    }
}

/// Per-username failed-login counter.
pub struct LoginLockout {
    failures: HashMap<String, FailureRecord>,
    max_failures: u32,
    lock_for: Duration,
}

impl LoginLockout {
    pub fn new() -> Self {
        Self::with_limits(MAX_FAILED_LOGINS, LOCKOUT_DURATION)
    }

    pub fn with_limits(max_failures: u32, lock_for: Duration) -> Self {
        Self {
            failures: HashMap::new(),
            max_failures,
            lock_for,
        }
    }

    /// Remaining lock time for a username, if locked.
    pub fn locked_for(&mut self, username: &str) -> Option<Duration> {
        let now = Instant::now();
        let locked_until = self.failures.get(username)?.locked_until;
        match locked_until {
            Some(until) if now < until => Some(until - now),
            Some(_) => {
                self.failures.remove(username);
                None
            }
            None => None,
        }
    }

    /// Count a failure. Returns true when this failure triggered a lock.
    pub fn record_failure(&mut self, username: &str) -> bool {
        let now = Instant::now();
        let window = self.lock_for;
        self.failures.retain(|_, r| !r.is_stale(now, window));

        let record = self
            .failures
            .entry(username.to_string())
            .or_insert(FailureRecord {
                count: 0,
                last_failure: now,
                locked_until: None,
            });
        record.count += 1;
        record.last_failure = now;
        if record.count >= self.max_failures && record.locked_until.is_none() {
            record.locked_until = Some(now + window);
            return true;
        }
        false
    }

    pub fn record_success(&mut self, username: &str) {
        self.failures.remove(username);
    }

    /// Usernames with a live failure record.
    pub fn tracked(&self) -> usize {
        self.failures.len()
    }
}

impl Default for LoginLockout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_and_revokes() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        let token = store.issue(id, "alice", Role::Patient);

        let session = store.validate(&token).unwrap();
        assert_eq!(session.identity_id, id);
        assert_eq!(session.role, Role::Patient);

        assert!(store.revoke(&token));
        assert!(store.validate(&token).is_none());
        assert!(!store.revoke(&token));
    }

    #[test]
    fn expired_session_is_rejected_then_pruned() {
        let mut store = SessionStore::new(Duration::ZERO);
        let token = store.issue(Uuid::new_v4(), "alice", Role::Patient);
        assert!(store.validate(&token).is_none());
        assert_eq!(store.len(), 1);

        assert_eq!(store.prune_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_token_rejected() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        store.issue(Uuid::new_v4(), "alice", Role::Patient);
        assert!(store.validate("forged").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn revoke_identity_drops_all_sessions() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        store.issue(id, "drbob", Role::Doctor);
        store.issue(id, "drbob", Role::Doctor);
        store.issue(Uuid::new_v4(), "alice", Role::Patient);
        assert_eq!(store.revoke_identity(&id), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn lockout_after_threshold() {
        let mut lockout = LoginLockout::with_limits(3, Duration::from_secs(60));
        assert!(!lockout.record_failure("alice"));
        assert!(!lockout.record_failure("alice"));
        assert!(lockout.locked_for("alice").is_none());
        assert!(lockout.record_failure("alice"));
        assert!(lockout.locked_for("alice").is_some());
        assert!(lockout.locked_for("bob").is_none());
    }

    #[test]
    fn success_resets_counter_and_lock_expires() {
        let mut lockout = LoginLockout::with_limits(2, Duration::from_secs(60));
        lockout.record_failure("alice");
        lockout.record_success("alice");
        assert!(!lockout.record_failure("alice"));
        assert!(lockout.record_failure("alice"));
        assert!(lockout.locked_for("alice").is_some());

        let mut lockout = LoginLockout::with_limits(1, Duration::ZERO);
        assert!(lockout.record_failure("alice"));
        assert!(lockout.locked_for("alice").is_none());
    }

    #[test]
    fn quiet_failure_records_are_evicted() {
        let mut lockout = LoginLockout::with_limits(5, Duration::ZERO);
        for name in ["typo1", "typo2", "typo3"] {
            lockout.record_failure(name);
        }
        // Each call sweeps records whose window has passed.
        assert_eq!(lockout.tracked(), 1);

        let mut lockout = LoginLockout::with_limits(5, Duration::from_secs(60));
        lockout.record_failure("typo1");
        lockout.record_failure("typo2");
        assert_eq!(lockout.tracked(), 2);
    }
}
