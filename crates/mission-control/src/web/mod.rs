//! # HTTP API
//!
//! Axum router for the inbound HTTP surface. Every route except `/health`
//! is guarded by bearer-token verification.

mod error;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
