//! Capabilities Manager client. Mission Control only ever executes one
//! capability itself: `REFLECT`, at mission quiescence.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mission_shared::MissionResult;

use super::ServiceClient;

/// Capability-execution request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteActionRequest {
    pub action_verb: String,
    pub inputs: HashMap<String, Value>,
}

/// One result produced by an executed capability
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginResult {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub result_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct CapabilitiesClient {
    client: Arc<ServiceClient>,
    base_url: String,
}

impl CapabilitiesClient {
    pub fn new(client: Arc<ServiceClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn execute_action(
        &self,
        request: &ExecuteActionRequest,
    ) -> MissionResult<Vec<PluginResult>> {
        self.client
            .post_json(&format!("{}/executeAction", self.base_url), request)
            .await
    }
}
