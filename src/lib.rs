pub mod admin;
pub mod api;
pub mod authorization;
pub mod billing;
pub mod clinical;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod directory;
pub mod error;
pub mod identity;
pub mod models;
pub mod payment_gateway;
pub mod profiles;
pub mod scheduling;
pub mod sessions;
pub mod specializations;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError};
use crate::core_state::{CoreError, CoreState};
use crate::error::HospitalError;

/// Fatal errors during startup or serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Cannot create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Hospital(#[from] HospitalError),
    #[error("Async runtime error: {0}")]
    Runtime(std::io::Error),
    #[error("{0}")]
    Server(String),
}

/// Start the service and block until Ctrl-C.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StartupError::DataDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    if config.payment.secret_key.is_empty() {
        tracing::warn!("PAYMENT_SECRET_KEY is not set; payments will be refused");
    }

    let core = Arc::new(CoreState::new(config));
    prepare_database(&core)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    runtime.block_on(serve(Arc::clone(&core)))?;

    if let Err(e) = core.flush_and_prune_audit() {
        tracing::warn!("Final audit flush failed: {e}");
    }
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}

/// Apply migrations and create the bootstrap admin if one is configured.
fn prepare_database(core: &CoreState) -> Result<(), StartupError> {
    let conn = core.open_db()?;
    tracing::info!(db_path = %core.db_path().display(), "Database ready");

    if let Some(admin) = &core.config.bootstrap_admin {
        if identity::ensure_bootstrap_admin(&conn, &core.hasher, admin)? {
            tracing::info!(username = %admin.username, "Bootstrap admin created");
        }
    }
    Ok(())
}

async fn serve(core: Arc<CoreState>) -> Result<(), StartupError> {
    let addr = core.config.bind_addr;
    let server = api::start_api_server(core, addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.info.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {e}");
    }
    tracing::info!("Shutting down");
    server.stop().await;
    Ok(())
}
