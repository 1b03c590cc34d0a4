//! API endpoint handlers.
//!
//! Handlers are thin: they open a connection, build the acting `Actor`
//! from `UserContext`, and delegate to the workflow modules.

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod billing;
pub mod clinical;
pub mod directory;
pub mod health;
pub mod profiles;

use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Run CPU-heavy or network-bound work (password hashing, gateway calls)
/// off the async workers.
pub(crate) async fn run_blocking<T, F>(ctx: &ApiContext, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&CoreState) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let core = Arc::clone(&ctx.core);
    tokio::task::spawn_blocking(move || work(&core))
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
