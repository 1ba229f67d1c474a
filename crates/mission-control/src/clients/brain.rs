//! Brain client: LLM call counters for telemetry.

use std::sync::Arc;

use serde::Deserialize;

use mission_shared::MissionResult;

use super::ServiceClient;

/// Counters returned by the Brain's `getLLMCalls` endpoint
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmCallCounters {
    #[serde(default)]
    pub llm_calls: u64,
    #[serde(default, rename = "activeLLMCalls")]
    pub active_llm_calls: u64,
}

#[derive(Debug, Clone)]
pub struct BrainClient {
    client: Arc<ServiceClient>,
    base_url: String,
}

impl BrainClient {
    pub fn new(client: Arc<ServiceClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn get_llm_calls(&self) -> MissionResult<LlmCallCounters> {
        self.client
            .get_json(&format!("{}/getLLMCalls", self.base_url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_parse_wire_shape() {
        let counters: LlmCallCounters =
            serde_json::from_str(r#"{"llmCalls": 12, "activeLLMCalls": 3}"#).unwrap();
        assert_eq!(counters.llm_calls, 12);
        assert_eq!(counters.active_llm_calls, 3);
    }

    #[test]
    fn test_counters_default_to_zero() {
        let counters: LlmCallCounters = serde_json::from_str("{}").unwrap();
        assert_eq!(counters.llm_calls, 0);
        assert_eq!(counters.active_llm_calls, 0);
    }
}
