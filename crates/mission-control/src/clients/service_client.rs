//! # Service Client
//!
//! Thin wrapper around `reqwest` shared by every collaborator client. It
//! attaches the service bearer token (requested from the security service
//! and cached until shortly before expiry) and retries transient failures
//! with the configured jittered backoff.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use mission_shared::config::MissionControlConfig;
use mission_shared::resilience::RetryPolicy;
use mission_shared::{MissionControlError, MissionResult};

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Authenticated HTTP client with bounded retries
#[derive(Debug)]
pub struct ServiceClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_margin: Duration,
    retry: RetryPolicy,
    token: RwLock<Option<CachedToken>>,
}

impl ServiceClient {
    pub fn new(config: &MissionControlConfig) -> MissionResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http.request_timeout_ms))
            .build()
            .map_err(|e| MissionControlError::Configuration(format!("http client: {e}")))?;

        let retry = RetryPolicy::new(
            config.http.retry_max_attempts,
            Duration::from_millis(config.http.retry_base_delay_ms),
            Duration::from_millis(config.http.retry_max_delay_ms),
        );

        Ok(Self {
            http,
            token_url: format!(
                "{}/auth/service",
                config.collaborators.security_manager_url
            ),
            client_id: config.security.client_id.clone(),
            client_secret: config.security.client_secret.clone(),
            refresh_margin: Duration::from_secs(config.security.token_refresh_margin_secs),
            retry,
            token: RwLock::new(None),
        })
    }

    /// The cached service token, refreshed when within the expiry margin
    async fn bearer_token(&self) -> MissionResult<String> {
        let margin = chrono::Duration::from_std(self.refresh_margin)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));

        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at - margin > Utc::now() {
                return Ok(cached.token.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Another writer may have refreshed while we waited for the lock
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at - margin > Utc::now() {
                return Ok(cached.token.clone());
            }
        }

        let request = TokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
        };
        let request = &request;
        let response: TokenResponse = self
            .retry
            .execute("authenticate_service", || async move {
                let resp = self
                    .http
                    .post(&self.token_url)
                    .json(request)
                    .send()
                    .await
                    .map_err(classify_reqwest_error)?;
                read_json(resp).await
            })
            .await?;

        debug!(expires_in = response.expires_in, "Service token refreshed");

        let cached = CachedToken {
            token: response.token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(response.expires_in as i64),
        };
        *guard = Some(cached);
        Ok(response.token)
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> MissionResult<T> {
        self.retry
            .execute(url, || async move {
                let token = self.bearer_token().await?;
                let resp = self
                    .http
                    .post(url)
                    .bearer_auth(token)
                    .json(body)
                    .send()
                    .await
                    .map_err(classify_reqwest_error)?;
                read_json(resp).await
            })
            .await
    }

    /// POST a JSON body where only the status matters
    pub async fn post_ack<B: Serialize>(&self, url: &str, body: &B) -> MissionResult<()> {
        self.retry
            .execute(url, || async move {
                let token = self.bearer_token().await?;
                let resp = self
                    .http
                    .post(url)
                    .bearer_auth(token)
                    .json(body)
                    .send()
                    .await
                    .map_err(classify_reqwest_error)?;
                require_success(resp).await.map(|_| ())
            })
            .await
    }

    /// GET and decode a JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> MissionResult<T> {
        self.retry
            .execute(url, || async move {
                let token = self.bearer_token().await?;
                let resp = self
                    .http
                    .get(url)
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(classify_reqwest_error)?;
                read_json(resp).await
            })
            .await
    }

    /// DELETE where only the status matters
    pub async fn delete(&self, url: &str) -> MissionResult<()> {
        self.retry
            .execute(url, || async move {
                let token = self.bearer_token().await?;
                let resp = self
                    .http
                    .delete(url)
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(classify_reqwest_error)?;
                require_success(resp).await.map(|_| ())
            })
            .await
    }
}

/// Map transport-level failures: timeouts and connection errors are
/// transient, everything else is internal.
fn classify_reqwest_error(e: reqwest::Error) -> MissionControlError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        MissionControlError::CollaboratorUnavailable(e.to_string())
    } else {
        MissionControlError::Internal(e.to_string())
    }
}

/// Map an HTTP status to the error taxonomy. 5xx is transient; 4xx reflects
/// the request and is never retried.
async fn require_success(resp: reqwest::Response) -> MissionResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    let detail = format!("{url} returned {status}: {body}");

    Err(match status {
        StatusCode::NOT_FOUND => MissionControlError::NotFound(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            MissionControlError::AccessDenied(detail)
        }
        s if s.is_server_error() => MissionControlError::CollaboratorUnavailable(detail),
        _ => MissionControlError::CollaboratorContract(detail),
    })
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> MissionResult<T> {
    let resp = require_success(resp).await?;
    let url = resp.url().to_string();
    resp.json::<T>().await.map_err(|e| {
        warn!(url = %url, error = %e, "Collaborator returned undecodable body");
        MissionControlError::CollaboratorContract(format!("{url}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_wire_shape() {
        let req = TokenRequest {
            client_id: "MissionControl",
            client_secret: "s3cret",
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["clientId"], "MissionControl");
        assert_eq!(v["clientSecret"], "s3cret");
    }

    #[test]
    fn test_token_response_defaults_expiry() {
        let resp: TokenResponse = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(resp.token, "abc");
        assert_eq!(resp.expires_in, 3600);

        let resp: TokenResponse =
            serde_json::from_str(r#"{"token":"abc","expiresIn":120}"#).unwrap();
        assert_eq!(resp.expires_in, 120);
    }

    #[test]
    fn test_client_builds_from_default_config() {
        let config = MissionControlConfig::default();
        let client = ServiceClient::new(&config).unwrap();
        assert!(client.token_url.ends_with("/auth/service"));
    }
}
