//! Mission Control orchestrator.
//!
//! Owns the lifecycle of long-running, multi-agent missions, coordinates
//! their execution through the Traffic Manager, and streams consolidated
//! progress telemetry back to subscribed clients via the PostOffice.
//!
//! # Modules
//!
//! - [`auth`] — Bearer-token verification (local key, remote fallback) and middleware
//! - [`bootstrap`] — Process assembly: HTTP server, queue consumer, telemetry ticker
//! - [`clients`] — Authenticated HTTP clients for every collaborator service
//! - [`context`] — Shared system context handed to every component
//! - [`dispatch`] — Envelope → command normalization shared by both ingress paths
//! - [`lifecycle`] — Mission state machine and command handlers
//! - [`queue`] — Broker queue ingress with correlated replies
//! - [`reflection`] — Quiescence-driven REFLECT invocation and interpretation
//! - [`registry`] — In-memory mission table, subscription index, pending inputs
//! - [`telemetry`] — Periodic aggregation and per-client fan-out
//! - [`web`] — Axum HTTP API

pub mod auth;
pub mod bootstrap;
pub mod clients;
pub mod context;
pub mod dispatch;
pub mod lifecycle;
pub mod queue;
pub mod reflection;
pub mod registry;
pub mod telemetry;
pub mod web;
