//! PostOffice client: the single egress for everything Mission Control
//! publishes toward clients (status updates, telemetry samples, and
//! pass-through of unrecognized envelopes).

use std::sync::Arc;

use mission_shared::types::MessageEnvelope;
use mission_shared::MissionResult;

use super::ServiceClient;

#[derive(Debug, Clone)]
pub struct PostOfficeClient {
    client: Arc<ServiceClient>,
    base_url: String,
}

impl PostOfficeClient {
    pub fn new(client: Arc<ServiceClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn send_message(&self, envelope: &MessageEnvelope) -> MissionResult<()> {
        self.client
            .post_ack(&format!("{}/message", self.base_url), envelope)
            .await
    }
}
