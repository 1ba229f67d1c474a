//! # Error Taxonomy
//!
//! Process-wide error type for Mission Control. Every fallible operation in
//! the orchestrator returns [`MissionResult`], and the web layer maps each
//! variant to exactly one HTTP status.
//!
//! The split between `CollaboratorUnavailable` and `CollaboratorContract`
//! matters for propagation: unavailability is transient and retried by the
//! external client, while a contract violation (malformed collaborator
//! response) is normalized defensively and logged, never retried.

use thiserror::Error;

/// Result alias used throughout the workspace
pub type MissionResult<T> = Result<T, MissionControlError>;

/// Unified error type for Mission Control operations
#[derive(Debug, Error)]
pub enum MissionControlError {
    /// Malformed envelope, unknown command, or bad identifier
    #[error("validation error: {0}")]
    Validation(String),

    /// Mission or pending-input lookup failed
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller identity does not match the resource owner
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Bearer token missing, expired, or failed verification
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Collaborator unreachable after bounded retries
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// Collaborator responded with a shape that violates its contract
    #[error("collaborator contract violation: {0}")]
    CollaboratorContract(String),

    /// Broker connectivity or publish/consume failure
    #[error("messaging error: {0}")]
    Messaging(String),

    /// Librarian persistence failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure; state is left consistent
    #[error("internal error: {0}")]
    Internal(String),
}

impl MissionControlError {
    /// Whether the retry policy should attempt the operation again.
    ///
    /// Only unavailability and messaging faults are transient; everything
    /// else either reflects caller input or a non-recoverable condition.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MissionControlError::CollaboratorUnavailable(_) | MissionControlError::Messaging(_)
        )
    }

    /// Short machine-readable tag for structured logs and error replies
    pub fn kind(&self) -> &'static str {
        match self {
            MissionControlError::Validation(_) => "validation",
            MissionControlError::NotFound(_) => "not_found",
            MissionControlError::AccessDenied(_) => "access_denied",
            MissionControlError::Unauthorized(_) => "unauthorized",
            MissionControlError::CollaboratorUnavailable(_) => "collaborator_unavailable",
            MissionControlError::CollaboratorContract(_) => "collaborator_contract",
            MissionControlError::Messaging(_) => "messaging",
            MissionControlError::Storage(_) => "storage",
            MissionControlError::Configuration(_) => "configuration",
            MissionControlError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for MissionControlError {
    fn from(e: config::ConfigError) -> Self {
        MissionControlError::Configuration(e.to_string())
    }
}

impl From<lapin::Error> for MissionControlError {
    fn from(e: lapin::Error) -> Self {
        MissionControlError::Messaging(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MissionControlError::CollaboratorUnavailable("brain".into()).is_transient());
        assert!(MissionControlError::Messaging("broker gone".into()).is_transient());
        assert!(!MissionControlError::Validation("bad envelope".into()).is_transient());
        assert!(!MissionControlError::NotFound("m1".into()).is_transient());
        assert!(!MissionControlError::AccessDenied("u2".into()).is_transient());
        assert!(!MissionControlError::CollaboratorContract("steps".into()).is_transient());
    }

    #[test]
    fn test_display_includes_context() {
        let err = MissionControlError::NotFound("mission 42".into());
        assert_eq!(err.to_string(), "not found: mission 42");

        let err = MissionControlError::AccessDenied("userId mismatch".into());
        assert!(err.to_string().contains("userId mismatch"));
    }

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(MissionControlError::Validation(String::new()).kind(), "validation");
        assert_eq!(MissionControlError::NotFound(String::new()).kind(), "not_found");
        assert_eq!(
            MissionControlError::CollaboratorUnavailable(String::new()).kind(),
            "collaborator_unavailable"
        );
        assert_eq!(MissionControlError::Internal(String::new()).kind(), "internal");
    }
}
