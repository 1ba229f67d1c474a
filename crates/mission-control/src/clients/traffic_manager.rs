//! Traffic Manager client: agent lifecycle commands, per-mission agent
//! statistics, and message distribution to running agents.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use mission_shared::types::MessageEnvelope;
use mission_shared::MissionResult;

use super::ServiceClient;

/// Agent-creation request posted when a mission starts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub action_verb: String,
    pub inputs: HashMap<String, Value>,
    pub mission_id: Uuid,
    pub dependencies: Vec<String>,
}

impl CreateAgentRequest {
    /// The ACCOMPLISH request for a new mission's root agent
    pub fn accomplish(mission_id: Uuid, goal: &str, mission_context: Option<&str>) -> Self {
        let mut inputs = HashMap::new();
        inputs.insert("goal".to_string(), Value::String(goal.to_string()));
        if let Some(ctx) = mission_context {
            inputs.insert(
                "missionContext".to_string(),
                Value::String(ctx.to_string()),
            );
        }
        Self {
            action_verb: "ACCOMPLISH".to_string(),
            inputs,
            mission_id,
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MissionScope {
    mission_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TrafficManagerClient {
    client: Arc<ServiceClient>,
    base_url: String,
}

impl TrafficManagerClient {
    pub fn new(client: Arc<ServiceClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn create_agent(&self, request: &CreateAgentRequest) -> MissionResult<Value> {
        self.client
            .post_json(&format!("{}/createAgent", self.base_url), request)
            .await
    }

    pub async fn pause_agents(&self, mission_id: Uuid) -> MissionResult<()> {
        self.client
            .post_ack(
                &format!("{}/pauseAgents", self.base_url),
                &MissionScope { mission_id },
            )
            .await
    }

    pub async fn resume_agents(&self, mission_id: Uuid) -> MissionResult<()> {
        self.client
            .post_ack(
                &format!("{}/resumeAgents", self.base_url),
                &MissionScope { mission_id },
            )
            .await
    }

    pub async fn abort_agents(&self, mission_id: Uuid) -> MissionResult<()> {
        self.client
            .post_ack(
                &format!("{}/abortAgents", self.base_url),
                &MissionScope { mission_id },
            )
            .await
    }

    pub async fn save_agents(&self, mission_id: Uuid) -> MissionResult<()> {
        self.client
            .post_ack(
                &format!("{}/saveAgents", self.base_url),
                &MissionScope { mission_id },
            )
            .await
    }

    pub async fn load_agents(&self, mission_id: Uuid) -> MissionResult<()> {
        self.client
            .post_ack(
                &format!("{}/loadAgents", self.base_url),
                &MissionScope { mission_id },
            )
            .await
    }

    /// Raw per-agent statistics for one mission. The shape is untrusted and
    /// normalized by the telemetry aggregator.
    pub async fn get_agent_statistics(&self, mission_id: Uuid) -> MissionResult<Value> {
        self.client
            .get_json(&format!(
                "{}/getAgentStatistics/{mission_id}",
                self.base_url
            ))
            .await
    }

    /// Broadcast a user message to a mission's agents
    pub async fn distribute_user_message(
        &self,
        envelope: &MessageEnvelope,
    ) -> MissionResult<()> {
        self.client
            .post_ack(&format!("{}/distributeUserMessage", self.base_url), envelope)
            .await
    }

    /// Route an envelope to a specific agent (human-input responses)
    pub async fn send_message(&self, envelope: &MessageEnvelope) -> MissionResult<()> {
        self.client
            .post_ack(&format!("{}/message", self.base_url), envelope)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accomplish_request_shape() {
        let mission_id = Uuid::new_v4();
        let request = CreateAgentRequest::accomplish(mission_id, "G", Some("ctx"));
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["actionVerb"], "ACCOMPLISH");
        assert_eq!(v["inputs"]["goal"], "G");
        assert_eq!(v["inputs"]["missionContext"], "ctx");
        assert_eq!(v["missionId"], mission_id.to_string());
        assert_eq!(v["dependencies"], serde_json::json!([]));
    }

    #[test]
    fn test_accomplish_omits_absent_context() {
        let request = CreateAgentRequest::accomplish(Uuid::new_v4(), "G", None);
        assert!(!request.inputs.contains_key("missionContext"));
        assert_eq!(request.inputs.len(), 1);
    }
}
