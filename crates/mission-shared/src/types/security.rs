//! # Security Types
//!
//! Claims extracted from a verified bearer token and the per-request
//! security context cached by the auth middleware.

use serde::{Deserialize, Serialize};

/// JWT claims issued by the security service.
///
/// `sub` carries the caller identity (a user id for UI sessions, a component
/// id for services).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub iss: Option<String>,
    pub exp: u64,
}

/// Which verification tier accepted the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationSource {
    /// Verified locally against the configured public key
    LocalKey,
    /// Verified by the security service's verify endpoint
    RemoteService,
}

/// Validated caller identity, attached to the request after authentication
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityContext {
    pub subject: String,
    pub component_type: Option<String>,
    pub roles: Vec<String>,
    pub source: VerificationSource,
}

impl SecurityContext {
    pub fn from_claims(claims: ServiceClaims, source: VerificationSource) -> Self {
        Self {
            subject: claims.sub,
            component_type: claims.component_type,
            roles: claims.roles,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_parse_with_minimal_fields() {
        let claims: ServiceClaims = serde_json::from_value(json!({
            "sub": "u1",
            "exp": 4102444800u64
        }))
        .unwrap();
        assert_eq!(claims.sub, "u1");
        assert!(claims.roles.is_empty());
        assert!(claims.component_type.is_none());
    }

    #[test]
    fn test_context_from_claims() {
        let claims: ServiceClaims = serde_json::from_value(json!({
            "sub": "MissionControl",
            "componentType": "service",
            "roles": ["orchestrator"],
            "exp": 4102444800u64
        }))
        .unwrap();
        let ctx = SecurityContext::from_claims(claims, VerificationSource::LocalKey);
        assert_eq!(ctx.subject, "MissionControl");
        assert_eq!(ctx.component_type.as_deref(), Some("service"));
        assert_eq!(ctx.roles, vec!["orchestrator"]);
        assert_eq!(ctx.source, VerificationSource::LocalKey);
    }
}
