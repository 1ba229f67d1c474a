//! # Authentication
//!
//! Inbound bearer-token verification. Verification is tiered in decreasing
//! preference: a local check against the configured public key, then the
//! security service's verify endpoint. Either tier yields the same
//! contract: verified claims, or failure.

mod middleware;
mod verifier;

pub use middleware::require_auth;
pub use verifier::{CompositeVerifier, LocalVerifier, RemoteVerifier};
