//! Defensive shape-normalization for agent statistics.
//!
//! The Traffic Manager's per-mission statistics cross a serialization
//! boundary and arrive in "live" shapes: native maps may be encoded with a
//! `_type: "Map"` marker and an `entries` array, and an agent's `steps`
//! sequence may arrive as an index-keyed object. The incoming structure is
//! untrusted; everything is rebuilt into native shapes here, and the
//! collaborator's serialization format never reaches the domain model.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use mission_shared::types::{AgentStat, AgentStep};

/// Normalized view of the Traffic Manager statistics payload
#[derive(Debug, Default)]
pub struct NormalizedAgentStats {
    pub agent_count_by_status: HashMap<String, u64>,
    pub per_agent_stats: HashMap<String, Vec<AgentStat>>,
}

/// Recursively expand `{_type: "Map", entries: [[k, v], ...]}` markers into
/// plain JSON objects.
pub fn expand_map_markers(value: Value) -> Value {
    match value {
        Value::Object(obj) => {
            if is_map_marker(&obj) {
                let entries = obj.get("entries").and_then(Value::as_array);
                let mut expanded = Map::new();
                if let Some(entries) = entries {
                    for entry in entries {
                        if let Some([key, val]) = entry.as_array().and_then(|a| {
                            (a.len() == 2).then(|| [a[0].clone(), a[1].clone()])
                        }) {
                            if let Some(key) = key.as_str() {
                                expanded.insert(key.to_string(), expand_map_markers(val));
                            }
                        }
                    }
                }
                Value::Object(expanded)
            } else {
                Value::Object(
                    obj.into_iter()
                        .map(|(k, v)| (k, expand_map_markers(v)))
                        .collect(),
                )
            }
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(expand_map_markers).collect())
        }
        other => other,
    }
}

fn is_map_marker(obj: &Map<String, Value>) -> bool {
    obj.get("_type").and_then(Value::as_str) == Some("Map") && obj.contains_key("entries")
}

/// Rebuild an agent's step collection into an ordered sequence.
///
/// A mapping from index to step is reconstructed by taking its values in
/// numeric key order; a missing or unrecognizable collection yields an
/// empty sequence. Both degradations log a warning.
pub fn normalize_steps(agent_id: &str, steps: Option<Value>) -> Vec<AgentStep> {
    match steps {
        Some(Value::Array(items)) => parse_steps(agent_id, items),
        Some(Value::Object(map)) => {
            warn!(
                agent_id = %agent_id,
                "Agent steps arrived as a mapping; reconstructing ordered sequence"
            );
            let mut keyed: Vec<(String, Value)> = map.into_iter().collect();
            keyed.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => a.cmp(b),
            });
            parse_steps(agent_id, keyed.into_iter().map(|(_, v)| v).collect())
        }
        Some(other) => {
            warn!(
                agent_id = %agent_id,
                step_type = %json_type_name(&other),
                "Agent steps are neither sequence nor mapping; substituting empty"
            );
            Vec::new()
        }
        None => {
            warn!(agent_id = %agent_id, "Agent steps missing; substituting empty");
            Vec::new()
        }
    }
}

fn parse_steps(agent_id: &str, items: Vec<Value>) -> Vec<AgentStep> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<AgentStep>(item) {
            Ok(step) => Some(step),
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Dropping undecodable step");
                None
            }
        })
        .collect()
}

/// Normalize the full Traffic Manager statistics payload.
///
/// Expected (after marker expansion): `agentStatisticsByType` mapping a
/// status category to a sequence of agents, and optionally
/// `agentCountByStatus`. Missing counts are derived from the per-category
/// agent totals.
pub fn normalize_agent_statistics(raw: Value) -> NormalizedAgentStats {
    let raw = expand_map_markers(raw);
    let mut normalized = NormalizedAgentStats::default();

    let by_type = raw
        .get("agentStatisticsByType")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    for (status, agents) in by_type {
        let agents = match agents {
            Value::Array(items) => items,
            other => {
                warn!(
                    status = %status,
                    value_type = %json_type_name(&other),
                    "Agent category is not a sequence; skipping"
                );
                continue;
            }
        };

        let mut stats = Vec::with_capacity(agents.len());
        for agent in agents {
            let Value::Object(mut fields) = agent else {
                warn!(status = %status, "Dropping non-object agent entry");
                continue;
            };
            let agent_id = fields
                .get("agentId")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let color = fields
                .get("color")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let steps = normalize_steps(&agent_id, fields.remove("steps"));
            stats.push(AgentStat {
                agent_id,
                color,
                steps,
            });
        }
        normalized.per_agent_stats.insert(status, stats);
    }

    match raw.get("agentCountByStatus").and_then(Value::as_object) {
        Some(counts) => {
            for (status, count) in counts {
                normalized
                    .agent_count_by_status
                    .insert(status.clone(), count.as_u64().unwrap_or(0));
            }
        }
        None => {
            for (status, agents) in &normalized.per_agent_stats {
                normalized
                    .agent_count_by_status
                    .insert(status.clone(), agents.len() as u64);
            }
        }
    }

    normalized
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
