//! Shared API state and request-scoped types.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::authorization::Actor;
use crate::core_state::CoreState;
use crate::models::Role;

/// State shared by every handler and middleware layer.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// User context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// The identity behind a validated bearer token.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub identity_id: Uuid,
    pub username: String,
    pub role: Role,
    /// Raw bearer token, kept so logout can revoke it.
    pub token: String,
}

impl UserContext {
    pub fn actor(&self) -> Actor {
        Actor::new(self.identity_id, self.role)
    }
}

/// Parse a path segment as an entity id. Malformed ids read as missing.
pub fn parse_id(raw: &str, entity: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("{entity} not found")))
}

// ═══════════════════════════════════════════════════════════
// Rate limiter
// ═══════════════════════════════════════════════════════════

/// Once this many clients are tracked, idle windows are swept on the next check.
const PRUNE_THRESHOLD: usize = 1024;

/// Sliding-window limiter keyed by client (session identity or peer address).
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// `Ok(())` when the request may proceed, otherwise the number of
    /// seconds the client should wait.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        if self.windows.len() >= PRUNE_THRESHOLD {
            self.prune(now);
        }
        let entries = self.windows.entry(key.to_string()).or_default();

        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }
        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Drop clients with no request in the last hour.
    fn prune(&mut self, now: Instant) {
        self.windows.retain(|_, entries| {
            entries
                .last()
                .is_some_and(|ts| now.duration_since(*ts) < Duration::from_secs(3600))
        });
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
