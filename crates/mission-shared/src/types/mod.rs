//! # Domain Types
//!
//! Wire and in-memory types shared across the orchestrator. Everything that
//! crosses a service boundary serializes as camelCase JSON to match the
//! collaborators.

pub mod envelope;
pub mod mission;
pub mod security;
pub mod telemetry;

pub use envelope::{MessageEnvelope, MessageType};
pub use mission::{FileRef, Mission, MissionStatus, MissionSummary};
pub use security::{SecurityContext, ServiceClaims, VerificationSource};
pub use telemetry::{AgentStat, AgentStep, EngineerStatistics, PendingInput, TelemetrySample};
