//! Middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter: reject early, save resources
//! 2. Auth validator: bearer token → `UserContext`
//! 3. Audit logger: logs after auth, has the acting identity

pub mod audit;
pub mod auth;
pub mod rate;
