//! # Reflection Coordinator
//!
//! When a mission goes quiescent, Mission Control asks the `REFLECT`
//! capability whether the mission is accomplished. The coordinator
//! assembles a plan-history view from the latest telemetry sample, invokes
//! the Capabilities Manager, and interprets the first result:
//!
//! - `plan` — more work was planned; the mission returns to Running.
//!   Applying the plan to execution is the Traffic Manager's job.
//! - `answer` — the mission is done; the answer is surfaced and the
//!   mission completes.
//!
//! Any failure during reflection moves the mission to Error.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use mission_shared::types::{Mission, MissionStatus, TelemetrySample};
use mission_shared::{MissionControlError, MissionResult};

use crate::clients::ExecuteActionRequest;
use crate::context::SystemContext;
use crate::lifecycle::publish_status;

const REFLECT_QUESTION: &str = "Given the original mission goal and the work completed, \
     is the mission fully accomplished? If not, what is the next logical step?";

/// One plan-history entry per agent step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanHistoryEntry {
    step_number: usize,
    action_verb: String,
    description: String,
    inputs: HashMap<String, Value>,
    outputs: HashMap<String, Value>,
}

#[derive(Debug)]
pub struct ReflectionCoordinator {
    context: Arc<SystemContext>,
}

impl ReflectionCoordinator {
    pub fn new(context: Arc<SystemContext>) -> Arc<Self> {
        Arc::new(Self { context })
    }

    /// Run one reflection for a mission already transitioned to Reflecting.
    ///
    /// Never returns an error: every outcome resolves to a terminal
    /// transition plus a status update.
    #[instrument(skip(self, mission, sample), fields(mission_id = %mission.id))]
    pub async fn reflect(
        &self,
        mission: Mission,
        prior_status: MissionStatus,
        sample: &TelemetrySample,
    ) {
        let mission_id = mission.id;
        match self.run_reflection(&mission, prior_status, sample).await {
            Ok(ReflectionDecision::PlanExtended) => {
                info!(mission_id = %mission_id, "Reflection produced a new plan; mission continues");
                self.finish(mission_id, MissionStatus::Running, "A new plan was generated to continue the mission.".to_string())
                    .await;
            }
            Ok(ReflectionDecision::Answered(answer)) => {
                info!(mission_id = %mission_id, "Reflection answered; mission complete");
                self.finish(
                    mission_id,
                    MissionStatus::Completed,
                    format!("Mission accomplished: {answer}"),
                )
                .await;
            }
            Err(e) => {
                warn!(mission_id = %mission_id, error = %e, "Reflection failed");
                self.finish(
                    mission_id,
                    MissionStatus::Error,
                    "Reflection process failed.".to_string(),
                )
                .await;
            }
        }
    }

    async fn run_reflection(
        &self,
        mission: &Mission,
        prior_status: MissionStatus,
        sample: &TelemetrySample,
    ) -> MissionResult<ReflectionDecision> {
        let plan_history = build_plan_history(sample);
        let work_products = format!(
            "Mission Goal: {}. Current Status: {}.",
            mission.goal, prior_status
        );

        let mut inputs = HashMap::new();
        inputs.insert("missionId".to_string(), json!(mission.id));
        inputs.insert("plan_history".to_string(), json!(plan_history));
        inputs.insert("work_products".to_string(), json!(work_products));
        inputs.insert("question".to_string(), json!(REFLECT_QUESTION));

        let results = self
            .context
            .capabilities
            .execute_action(&ExecuteActionRequest {
                action_verb: "REFLECT".to_string(),
                inputs,
            })
            .await?;

        let first = results.into_iter().next().ok_or_else(|| {
            MissionControlError::CollaboratorContract(
                "REFLECT returned no results".to_string(),
            )
        })?;

        match first.name.as_str() {
            "plan" => Ok(ReflectionDecision::PlanExtended),
            "answer" => {
                let answer = match first.result {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Ok(ReflectionDecision::Answered(answer))
            }
            other => Err(MissionControlError::CollaboratorContract(format!(
                "unexpected REFLECT result name: {other}"
            ))),
        }
    }

    /// Apply the post-reflection transition and emit its status update
    async fn finish(&self, mission_id: Uuid, next: MissionStatus, message: String) {
        match self.context.registry.transition(&mission_id, next) {
            Ok(_) => publish_status(&self.context, mission_id, next, message).await,
            Err(e) => {
                // The mission may have been aborted mid-reflection
                warn!(mission_id = %mission_id, error = %e, "Could not apply post-reflection transition");
            }
        }
    }
}

#[derive(Debug)]
enum ReflectionDecision {
    PlanExtended,
    Answered(String),
}

/// Flatten the sample's per-agent step graphs into numbered history
/// entries. Categories and agents are visited in sorted order so the
/// numbering is stable across runs.
fn build_plan_history(sample: &TelemetrySample) -> Vec<PlanHistoryEntry> {
    let mut entries = Vec::new();
    let mut step_number = 0;

    let mut categories: Vec<_> = sample.per_agent_stats.keys().collect();
    categories.sort();

    for category in categories {
        let mut agents = sample.per_agent_stats[category].clone();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        for agent in agents {
            for step in agent.steps {
                step_number += 1;
                let mut outputs = HashMap::new();
                outputs.insert(
                    "result".to_string(),
                    Value::String(
                        step.result
                            .as_ref()
                            .map(|r| r.to_string())
                            .unwrap_or_default(),
                    ),
                );
                entries.push(PlanHistoryEntry {
                    step_number,
                    action_verb: step.verb,
                    description: step.description.unwrap_or_default(),
                    inputs: HashMap::new(),
                    outputs,
                });
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use mission_shared::types::{AgentStat, AgentStep};

    fn sample_with_steps() -> TelemetrySample {
        let mut sample = TelemetrySample::default();
        sample.per_agent_stats.insert(
            "COMPLETED".to_string(),
            vec![AgentStat {
                agent_id: "a1".to_string(),
                color: String::new(),
                steps: vec![
                    AgentStep {
                        id: "s1".to_string(),
                        verb: "SEARCH".to_string(),
                        status: "completed".to_string(),
                        description: Some("find sources".to_string()),
                        result: Some(json!({"hits": 3})),
                        ..Default::default()
                    },
                    AgentStep {
                        id: "s2".to_string(),
                        verb: "SUMMARIZE".to_string(),
                        status: "completed".to_string(),
                        ..Default::default()
                    },
                ],
            }],
        );
        sample
    }

    use serde_json::json;

    #[test]
    fn test_plan_history_numbers_steps_in_order() {
        let history = build_plan_history(&sample_with_steps());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].step_number, 1);
        assert_eq!(history[0].action_verb, "SEARCH");
        assert_eq!(history[0].description, "find sources");
        assert_eq!(history[1].step_number, 2);
        assert_eq!(history[1].action_verb, "SUMMARIZE");
    }

    #[test]
    fn test_plan_history_serializes_result_as_string() {
        let history = build_plan_history(&sample_with_steps());
        assert_eq!(history[0].outputs["result"], json!("{\"hits\":3}"));
        // Steps with no result carry an empty serialization
        assert_eq!(history[1].outputs["result"], json!(""));
    }

    #[test]
    fn test_plan_history_entry_wire_shape() {
        let history = build_plan_history(&sample_with_steps());
        let v = serde_json::to_value(&history[0]).unwrap();
        assert_eq!(v["stepNumber"], 1);
        assert_eq!(v["actionVerb"], "SEARCH");
        assert!(v.get("inputs").is_some());
        assert!(v["outputs"].get("result").is_some());
    }

    #[test]
    fn test_plan_history_empty_sample() {
        assert!(build_plan_history(&TelemetrySample::default()).is_empty());
    }

    #[test]
    fn test_reflect_question_text() {
        assert!(REFLECT_QUESTION.contains("fully accomplished"));
        assert!(REFLECT_QUESTION.contains("next logical step"));
    }
}
