//! Engineer client: plugin-creation statistics for telemetry.

use std::sync::Arc;

use mission_shared::types::EngineerStatistics;
use mission_shared::MissionResult;

use super::ServiceClient;

#[derive(Debug, Clone)]
pub struct EngineerClient {
    client: Arc<ServiceClient>,
    base_url: String,
}

impl EngineerClient {
    pub fn new(client: Arc<ServiceClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn statistics(&self) -> MissionResult<EngineerStatistics> {
        self.client
            .get_json(&format!("{}/statistics", self.base_url))
            .await
    }
}
