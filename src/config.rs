use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::crypto::PBKDF2_ITERATIONS;

/// Application-level constants
pub const APP_NAME: &str = "EHospital";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 8 * 60 * 60;
pub const DEFAULT_PAYMENT_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_PAYMENT_CURRENCY: &str = "usd";
pub const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Cannot determine home directory; set EHOSPITAL_DB_PATH")]
    NoHomeDir,
}

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "ehospital=info,ehospital_lib=info,tower_http=warn"
}

/// Get the application data directory
/// ~/EHospital/ on all platforms
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Payment gateway settings, handed to the gateway client when it is built.
#[derive(Clone)]
pub struct PaymentConfig {
    pub api_base: String,
    pub secret_key: String,
    pub currency: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &"<redacted>")
            .field("currency", &self.currency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_PAYMENT_API_BASE.to_string(),
            secret_key: String::new(),
            currency: DEFAULT_PAYMENT_CURRENCY.to_string(),
            timeout: Duration::from_secs(DEFAULT_PAYMENT_TIMEOUT_SECS),
        }
    }
}

/// Bootstrap admin account, created at startup if the username is free.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub session_ttl: Duration,
    pub password_iterations: u32,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset keys fall back
    /// to defaults; set-but-unparseable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("EHOSPITAL_BIND_ADDR") {
            Some(v) => parse_value("EHOSPITAL_BIND_ADDR", &v)?,
            None => parse_value("EHOSPITAL_BIND_ADDR", DEFAULT_BIND_ADDR)?,
        };

        let db_path = match get("EHOSPITAL_DB_PATH") {
            Some(v) => PathBuf::from(v),
            None => app_data_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join("hospital.db"),
        };

        let session_ttl = Duration::from_secs(match get("EHOSPITAL_SESSION_TTL_SECS") {
            Some(v) => parse_value("EHOSPITAL_SESSION_TTL_SECS", &v)?,
            None => DEFAULT_SESSION_TTL_SECS,
        });

        let password_iterations = match get("EHOSPITAL_PASSWORD_ITERATIONS") {
            Some(v) => {
                let n: u32 = parse_value("EHOSPITAL_PASSWORD_ITERATIONS", &v)?;
                if n == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "EHOSPITAL_PASSWORD_ITERATIONS",
                        value: v,
                    });
                }
                n
            }
            None => PBKDF2_ITERATIONS,
        };

        let bootstrap_admin = match (get("EHOSPITAL_ADMIN_USERNAME"), get("EHOSPITAL_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            _ => None,
        };

        let payment = PaymentConfig {
            api_base: get("PAYMENT_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_BASE.to_string()),
            secret_key: get("PAYMENT_SECRET_KEY").unwrap_or_default(),
            currency: get("PAYMENT_CURRENCY")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| DEFAULT_PAYMENT_CURRENCY.to_string()),
            timeout: Duration::from_secs(match get("PAYMENT_TIMEOUT_SECS") {
                Some(v) => parse_value("PAYMENT_TIMEOUT_SECS", &v)?,
                None => DEFAULT_PAYMENT_TIMEOUT_SECS,
            }),
        };

        Ok(Self {
            bind_addr,
            db_path,
            session_ttl,
            password_iterations,
            bootstrap_admin,
            payment,
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
