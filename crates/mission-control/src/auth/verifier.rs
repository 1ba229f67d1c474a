//! Token verification tiers.

use std::path::Path;
use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mission_shared::types::{SecurityContext, ServiceClaims, VerificationSource};
use mission_shared::{MissionControlError, MissionResult};

use crate::clients::ServiceClient;

/// Local RS256 verification against a PEM public key read at startup
#[derive(Clone)]
pub struct LocalVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for LocalVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalVerifier").finish_non_exhaustive()
    }
}

impl LocalVerifier {
    pub fn from_pem_file(path: &Path) -> MissionResult<Self> {
        let pem = std::fs::read(path).map_err(|e| {
            MissionControlError::Configuration(format!(
                "public key file {}: {e}",
                path.display()
            ))
        })?;
        let key = DecodingKey::from_rsa_pem(&pem).map_err(|e| {
            MissionControlError::Configuration(format!(
                "public key file {} is not a valid RSA PEM: {e}",
                path.display()
            ))
        })?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> MissionResult<ServiceClaims> {
        decode::<ServiceClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| MissionControlError::Unauthorized(format!("token rejected: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    claims: Option<ServiceClaims>,
}

/// Fallback verification through the security service
#[derive(Debug, Clone)]
pub struct RemoteVerifier {
    client: Arc<ServiceClient>,
    verify_url: String,
}

impl RemoteVerifier {
    pub fn new(client: Arc<ServiceClient>, security_base_url: &str) -> Self {
        Self {
            client,
            verify_url: format!("{security_base_url}/verify"),
        }
    }

    pub async fn verify(&self, token: &str) -> MissionResult<ServiceClaims> {
        let response: VerifyResponse = self
            .client
            .post_json(&self.verify_url, &VerifyRequest { token })
            .await
            .map_err(|e| MissionControlError::Unauthorized(format!("verify call failed: {e}")))?;

        match response {
            VerifyResponse {
                valid: true,
                claims: Some(claims),
            } => Ok(claims),
            _ => Err(MissionControlError::Unauthorized(
                "token rejected by security service".to_string(),
            )),
        }
    }
}

/// Tiered verifier: local key first when configured, remote otherwise.
///
/// The contract is single: verify and yield claims, or fail.
#[derive(Debug)]
pub struct CompositeVerifier {
    local: Option<LocalVerifier>,
    remote: RemoteVerifier,
}

impl CompositeVerifier {
    pub fn new(local: Option<LocalVerifier>, remote: RemoteVerifier) -> Self {
        Self { local, remote }
    }

    /// Build from configuration: a configured-but-unreadable key file is
    /// logged and skipped so the process still starts with remote-only
    /// verification.
    pub fn from_config(
        config: &mission_shared::config::MissionControlConfig,
        client: Arc<ServiceClient>,
    ) -> Self {
        let local = config.security.public_key_path.as_ref().and_then(|path| {
            match LocalVerifier::from_pem_file(path) {
                Ok(v) => {
                    debug!(path = %path.display(), "Local token verification enabled");
                    Some(v)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Local verification unavailable, using remote only");
                    None
                }
            }
        });
        let remote = RemoteVerifier::new(client, &config.collaborators.security_manager_url);
        Self::new(local, remote)
    }

    pub async fn verify(&self, token: &str) -> MissionResult<SecurityContext> {
        if let Some(local) = &self.local {
            match local.verify(token) {
                Ok(claims) => {
                    return Ok(SecurityContext::from_claims(
                        claims,
                        VerificationSource::LocalKey,
                    ))
                }
                Err(e) => {
                    debug!(error = %e, "Local verification failed, falling back to security service");
                }
            }
        }

        let claims = self.remote.verify(token).await?;
        Ok(SecurityContext::from_claims(
            claims,
            VerificationSource::RemoteService,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_local_verifier_missing_file_is_configuration_error() {
        let err = LocalVerifier::from_pem_file(Path::new("/nonexistent/key.pem")).unwrap_err();
        assert!(matches!(err, MissionControlError::Configuration(_)));
    }

    #[test]
    fn test_local_verifier_rejects_garbage_pem() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a pem at all").unwrap();
        let err = LocalVerifier::from_pem_file(file.path()).unwrap_err();
        assert!(matches!(err, MissionControlError::Configuration(_)));
    }

    #[test]
    fn test_verify_response_parsing() {
        let resp: VerifyResponse = serde_json::from_str(
            r#"{"valid": true, "claims": {"sub": "u1", "exp": 4102444800}}"#,
        )
        .unwrap();
        assert!(resp.valid);
        assert_eq!(resp.claims.unwrap().sub, "u1");

        let resp: VerifyResponse = serde_json::from_str(r#"{"valid": false}"#).unwrap();
        assert!(!resp.valid);
        assert!(resp.claims.is_none());
    }
}
