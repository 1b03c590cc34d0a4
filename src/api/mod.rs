//! JSON HTTP API.
//!
//! Routes are nested under `/api/`. Public routes (signup, login, directory
//! listings, health) are rate limited only; everything else passes through
//! Rate Limit → Auth → Audit → Handler.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerInfo};
pub use types::ApiContext;
