//! # Telemetry Types
//!
//! Per-tick aggregate shapes pushed to subscribed clients, plus the
//! pending-input correlation record. Telemetry samples are ephemeral: they
//! are produced on a tick, published, and discarded — never persisted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single unit of agent work as reported by the Traffic Manager.
///
/// The incoming shape is untrusted; defaults keep a partially-populated step
/// usable after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    #[serde(default)]
    pub id: String,
    /// Wire name `actionVerb`
    #[serde(default, rename = "actionVerb")]
    pub verb: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub input_references: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Per-agent statistics with the agent's ordered step graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStat {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub steps: Vec<AgentStep>,
}

/// Engineer service counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineerStatistics {
    #[serde(default)]
    pub new_plugins: Vec<String>,
}

/// Per-mission, per-tick aggregate forwarded to each subscribed client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub llm_calls: u64,
    #[serde(rename = "activeLLMCalls")]
    pub active_llm_calls: u64,
    pub agent_count_by_status: HashMap<String, u64>,
    /// Status category → agents in that category
    pub per_agent_stats: HashMap<String, Vec<AgentStat>>,
    pub engineer_stats: EngineerStatistics,
}

impl TelemetrySample {
    /// Number of agents currently reported as RUNNING; zero means the
    /// mission is quiescent for reflection purposes.
    pub fn running_agent_count(&self) -> u64 {
        self.agent_count_by_status
            .get("RUNNING")
            .copied()
            .unwrap_or(0)
    }
}

/// Correlation record for an outstanding human-input request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInput {
    pub request_id: String,
    pub mission_id: Uuid,
    pub step_id: String,
    pub agent_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_step_parses_wire_shape() {
        let step: AgentStep = serde_json::from_value(json!({
            "id": "s1",
            "actionVerb": "SEARCH",
            "status": "completed",
            "dependencies": ["s0"],
            "inputReferences": {"query": {"value": "rust"}},
            "result": [{"name": "answer", "result": "ok"}]
        }))
        .unwrap();

        assert_eq!(step.id, "s1");
        assert_eq!(step.verb, "SEARCH");
        assert_eq!(step.dependencies, vec!["s0"]);
        assert!(step.input_references.contains_key("query"));
        assert!(step.result.is_some());
    }

    #[test]
    fn test_agent_step_tolerates_missing_fields() {
        let step: AgentStep = serde_json::from_value(json!({"id": "s1"})).unwrap();
        assert_eq!(step.id, "s1");
        assert!(step.verb.is_empty());
        assert!(step.dependencies.is_empty());
        assert!(step.result.is_none());
    }

    #[test]
    fn test_sample_running_agent_count() {
        let mut sample = TelemetrySample::default();
        assert_eq!(sample.running_agent_count(), 0);
        sample.agent_count_by_status.insert("RUNNING".into(), 3);
        sample.agent_count_by_status.insert("COMPLETED".into(), 5);
        assert_eq!(sample.running_agent_count(), 3);
    }

    #[test]
    fn test_sample_wire_field_names() {
        let sample = TelemetrySample {
            llm_calls: 7,
            active_llm_calls: 2,
            ..Default::default()
        };
        let v = serde_json::to_value(&sample).unwrap();
        assert_eq!(v["llmCalls"], 7);
        assert_eq!(v["activeLLMCalls"], 2);
        assert!(v.get("perAgentStats").is_some());
        assert!(v.get("agentCountByStatus").is_some());
        assert!(v.get("engineerStats").is_some());
    }

    #[test]
    fn test_pending_input_roundtrip() {
        let input = PendingInput {
            request_id: "r1".to_string(),
            mission_id: Uuid::new_v4(),
            step_id: "s1".to_string(),
            agent_id: "a1".to_string(),
        };
        let v = serde_json::to_value(&input).unwrap();
        assert_eq!(v["requestId"], "r1");
        let back: PendingInput = serde_json::from_value(v).unwrap();
        assert_eq!(back, input);
    }
}
