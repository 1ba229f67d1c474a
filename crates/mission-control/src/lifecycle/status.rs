//! Status fan-out: every externally visible state mutation is emitted as a
//! `STATUS_UPDATE` to each client subscribed to the mission, via the
//! PostOffice. Publish failures are logged and never fail the mutation.

use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use mission_shared::types::{MessageEnvelope, MessageType, MissionStatus};

use crate::context::SystemContext;

/// Content of a STATUS_UPDATE envelope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateContent {
    pub mission_id: Uuid,
    pub status: MissionStatus,
    pub message: String,
}

/// Publish a status update to every subscriber of the mission
pub async fn publish_status(
    context: &SystemContext,
    mission_id: Uuid,
    status: MissionStatus,
    message: impl Into<String>,
) {
    let content = StatusUpdateContent {
        mission_id,
        status,
        message: message.into(),
    };
    let subscribers = context.registry.subscribers_of(&mission_id);
    for client_id in subscribers {
        let envelope = MessageEnvelope::outbound(
            MessageType::StatusUpdate,
            json!(&content),
        )
        .with_recipient("user")
        .with_client_id(client_id.clone());

        if let Err(e) = context.post_office.send_message(&envelope).await {
            warn!(
                mission_id = %mission_id,
                client_id = %client_id,
                error = %e,
                "Failed to publish status update"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_content_wire_shape() {
        let content = StatusUpdateContent {
            mission_id: Uuid::nil(),
            status: MissionStatus::Aborted,
            message: "Mission aborted".to_string(),
        };
        let v = serde_json::to_value(&content).unwrap();
        assert_eq!(v["status"], "Aborted");
        assert_eq!(v["message"], "Mission aborted");
        assert!(v.get("missionId").is_some());
    }
}
