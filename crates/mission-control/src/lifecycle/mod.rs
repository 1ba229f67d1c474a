//! # Mission Lifecycle Engine
//!
//! Command handlers for the mission state machine. Every handler follows
//! the same discipline: check legality under the registry entry lock,
//! call the Traffic Manager, apply the transition, persist a snapshot
//! outside the lock, then emit a status update.
//!
//! Errors propagate to the caller; only best-effort side work (action-plan
//! cache clearing, persistence of snapshots that are pure backups, status
//! publishes) is logged-and-swallowed.

mod status;

pub use status::{publish_status, StatusUpdateContent};

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use mission_shared::types::{
    FileRef, MessageEnvelope, MessageType, Mission, MissionStatus, MissionSummary, PendingInput,
};
use mission_shared::{MissionControlError, MissionResult};

use crate::clients::CreateAgentRequest;
use crate::context::SystemContext;

/// Result of a successful mission creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMissionOutcome {
    pub mission_id: Uuid,
    pub status: MissionStatus,
}

#[derive(Debug, Clone)]
pub struct MissionLifecycle {
    context: Arc<SystemContext>,
}

impl MissionLifecycle {
    pub fn new(context: Arc<SystemContext>) -> Self {
        Self { context }
    }

    /// Create a mission and start its root agent.
    ///
    /// The mission is inserted as Initializing, the client subscribed, and
    /// an ACCOMPLISH agent requested from the Traffic Manager. Success
    /// transitions to Running; failure transitions to Error and surfaces
    /// the cause.
    #[instrument(skip(self, goal, mission_context), fields(user_id = %user_id))]
    pub async fn create_mission(
        &self,
        goal: String,
        name: Option<String>,
        mission_context: Option<String>,
        client_id: Option<&str>,
        user_id: &str,
    ) -> MissionResult<CreateMissionOutcome> {
        if goal.trim().is_empty() {
            return Err(MissionControlError::Validation(
                "mission goal must not be empty".to_string(),
            ));
        }

        // Stale cached plans would poison the new mission's planning
        if let Err(e) = self.context.librarian.clear_action_plans().await {
            warn!(error = %e, "Failed to clear action-plan cache, continuing");
        }

        let mission = Mission::new(user_id, goal, name, mission_context);
        let mission_id = mission.id;

        self.context.registry.insert(mission.clone());
        if let Some(client_id) = client_id {
            self.context.registry.subscribe(client_id, mission_id);
        }
        self.persist_snapshot(&mission).await;

        let request = CreateAgentRequest::accomplish(
            mission_id,
            &mission.goal,
            mission.mission_context.as_deref(),
        );

        match self.context.traffic_manager.create_agent(&request).await {
            Ok(_) => {
                let running = self
                    .context
                    .registry
                    .transition(&mission_id, MissionStatus::Running)?;
                self.persist_snapshot(&running).await;
                info!(mission_id = %mission_id, "Mission started");
                publish_status(
                    &self.context,
                    mission_id,
                    MissionStatus::Running,
                    "Mission started",
                )
                .await;
                Ok(CreateMissionOutcome {
                    mission_id,
                    status: MissionStatus::Running,
                })
            }
            Err(e) => {
                warn!(mission_id = %mission_id, error = %e, "Agent creation failed");
                if let Ok(errored) = self
                    .context
                    .registry
                    .transition(&mission_id, MissionStatus::Error)
                {
                    self.persist_snapshot(&errored).await;
                }
                publish_status(
                    &self.context,
                    mission_id,
                    MissionStatus::Error,
                    "Failed to start mission",
                )
                .await;
                Err(e)
            }
        }
    }

    /// Pause a Running mission
    #[instrument(skip(self))]
    pub async fn pause_mission(&self, mission_id: Uuid) -> MissionResult<()> {
        self.require_status(mission_id, MissionStatus::Running, "pause")?;
        self.context.traffic_manager.pause_agents(mission_id).await?;
        let mission = self
            .context
            .registry
            .transition(&mission_id, MissionStatus::Paused)?;
        publish_status(&self.context, mission_id, mission.status, "Mission paused").await;
        Ok(())
    }

    /// Resume a Paused mission
    #[instrument(skip(self))]
    pub async fn resume_mission(&self, mission_id: Uuid) -> MissionResult<()> {
        self.require_status(mission_id, MissionStatus::Paused, "resume")?;
        self.context
            .traffic_manager
            .resume_agents(mission_id)
            .await?;
        let mission = self
            .context
            .registry
            .transition(&mission_id, MissionStatus::Running)?;
        publish_status(&self.context, mission_id, mission.status, "Mission resumed").await;
        Ok(())
    }

    /// Abort a mission: stop its agents, emit one Aborted status, then
    /// remove it from memory and from every subscription set. The persisted
    /// copy is kept for history.
    #[instrument(skip(self))]
    pub async fn abort_mission(&self, mission_id: Uuid) -> MissionResult<()> {
        self.context.traffic_manager.abort_agents(mission_id).await?;

        let aborted = self
            .context
            .registry
            .transition(&mission_id, MissionStatus::Aborted)?;

        // Emit before removal so every subscriber sees the final status
        publish_status(
            &self.context,
            mission_id,
            MissionStatus::Aborted,
            "Mission aborted",
        )
        .await;

        self.persist_snapshot(&aborted).await;
        self.context.registry.remove(&mission_id);
        self.context.pending_inputs.remove_for_mission(&mission_id);
        info!(mission_id = %mission_id, "Mission aborted and removed from memory");
        Ok(())
    }

    /// Persist a mission, optionally renaming it first. Idempotent.
    #[instrument(skip(self, mission_name))]
    pub async fn save_mission(
        &self,
        mission_id: Uuid,
        mission_name: Option<String>,
    ) -> MissionResult<()> {
        let snapshot = self
            .context
            .registry
            .with_mission_mut(&mission_id, |mission| {
                match mission_name {
                    Some(name) if !name.trim().is_empty() => {
                        if mission.name != name {
                            mission.name = name;
                            mission.touch();
                        }
                    }
                    _ => {
                        if mission.name.trim().is_empty() {
                            mission.name =
                                mission_shared::types::mission::default_mission_name(
                                    chrono::Utc::now(),
                                );
                            mission.touch();
                        }
                    }
                }
            })
            .map(|(_, snapshot)| snapshot)
            .ok_or_else(|| unknown_mission(mission_id))?;

        self.context.librarian.store_mission(&snapshot).await?;
        self.context.traffic_manager.save_agents(mission_id).await?;
        publish_status(&self.context, mission_id, snapshot.status, "Mission saved").await;
        Ok(())
    }

    /// Load a persisted mission into memory for `user_id`
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn load_mission(
        &self,
        mission_id: Uuid,
        client_id: Option<&str>,
        user_id: &str,
    ) -> MissionResult<MissionSummary> {
        let stored = self.context.librarian.load_mission(mission_id).await?;
        if stored.user_id != user_id {
            return Err(MissionControlError::AccessDenied(format!(
                "mission {mission_id} does not belong to caller"
            )));
        }

        // An in-memory copy wins over the persisted one
        self.context.registry.insert_if_absent(stored);
        self.context.traffic_manager.load_agents(mission_id).await?;
        if let Some(client_id) = client_id {
            self.context.registry.subscribe(client_id, mission_id);
        }

        let summary = self
            .context
            .registry
            .get(&mission_id)
            .map(|m| m.summary())
            .ok_or_else(|| unknown_mission(mission_id))?;
        publish_status(&self.context, mission_id, summary.status, "Mission loaded").await;
        Ok(summary)
    }

    /// List a user's missions: in-memory union persisted, de-duplicated by
    /// id with the in-memory copy winning. A failed storage query degrades
    /// to the in-memory projection.
    #[instrument(skip(self))]
    pub async fn list_missions(&self, user_id: &str) -> Vec<MissionSummary> {
        let mut summaries = self.context.registry.summaries_for_user(user_id);

        match self.context.librarian.missions_for_user(user_id).await {
            Ok(stored) => {
                for mission in stored {
                    if !summaries.iter().any(|s| s.id == mission.id) {
                        summaries.push(mission.summary());
                    }
                }
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Storage query failed, listing in-memory missions only");
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Forward a user message to the mission's agents
    #[instrument(skip(self, message))]
    pub async fn handle_user_message(
        &self,
        mission_id: Uuid,
        client_id: Option<&str>,
        message: String,
    ) -> MissionResult<()> {
        let snapshot = self
            .context
            .registry
            .with_mission_mut(&mission_id, |mission| mission.touch())
            .map(|(_, snapshot)| snapshot)
            .ok_or_else(|| unknown_mission(mission_id))?;

        let mut envelope = MessageEnvelope::outbound(
            MessageType::UserMessage,
            json!({ "missionId": mission_id, "message": message }),
        )
        .with_recipient("agents");
        envelope.sender = "user".to_string();
        if let Some(client_id) = client_id {
            envelope.client_id = Some(client_id.to_string());
        }

        self.context
            .traffic_manager
            .distribute_user_message(&envelope)
            .await?;

        publish_status(
            &self.context,
            mission_id,
            snapshot.status,
            "User message delivered to agents",
        )
        .await;
        Ok(())
    }

    /// Attach a file reference; a duplicate id is a no-op
    #[instrument(skip(self, file))]
    pub async fn add_attached_file(&self, mission_id: Uuid, file: FileRef) -> MissionResult<()> {
        let (added, snapshot) = self
            .context
            .registry
            .with_mission_mut(&mission_id, |mission| mission.add_attached_file(file))
            .ok_or_else(|| unknown_mission(mission_id))?;

        if added {
            self.context.librarian.store_mission(&snapshot).await?;
        }
        publish_status(
            &self.context,
            mission_id,
            snapshot.status,
            "Attached files updated",
        )
        .await;
        Ok(())
    }

    /// Remove a file reference by id; an unknown id is a no-op
    #[instrument(skip(self))]
    pub async fn remove_attached_file(
        &self,
        mission_id: Uuid,
        file_id: &str,
    ) -> MissionResult<()> {
        let (removed, snapshot) = self
            .context
            .registry
            .with_mission_mut(&mission_id, |mission| mission.remove_attached_file(file_id))
            .ok_or_else(|| unknown_mission(mission_id))?;

        if removed {
            self.context.librarian.store_mission(&snapshot).await?;
        }
        publish_status(
            &self.context,
            mission_id,
            snapshot.status,
            "Attached files updated",
        )
        .await;
        Ok(())
    }

    /// Record that a step is waiting on a human answer
    #[instrument(skip(self))]
    pub async fn register_user_input_request(&self, input: PendingInput) -> MissionResult<()> {
        if !self.context.registry.contains(&input.mission_id) {
            return Err(unknown_mission(input.mission_id));
        }
        self.context.pending_inputs.register(input)
    }

    /// Route a human answer back to the waiting agent.
    ///
    /// The pending entry is removed even when forwarding fails: the user
    /// must not re-submit to a stale request; the step side times out.
    #[instrument(skip(self, response))]
    pub async fn resolve_user_input(
        &self,
        request_id: &str,
        response: serde_json::Value,
    ) -> MissionResult<()> {
        let pending = self
            .context
            .pending_inputs
            .resolve(request_id)
            .ok_or_else(|| {
                MissionControlError::NotFound(format!("no pending input for request {request_id}"))
            })?;

        let envelope = MessageEnvelope::outbound(
            MessageType::UserInputResponse,
            json!({
                "missionId": pending.mission_id,
                "stepId": pending.step_id,
                "agentId": pending.agent_id,
                "response": response,
            }),
        )
        .with_recipient(pending.agent_id.clone());

        if let Err(e) = self.context.traffic_manager.send_message(&envelope).await {
            warn!(
                request_id = %request_id,
                agent_id = %pending.agent_id,
                error = %e,
                "Failed to forward user input response; entry already removed"
            );
        }
        Ok(())
    }

    /// Persist a snapshot as a backup; failures are logged, not fatal
    async fn persist_snapshot(&self, mission: &Mission) {
        if let Err(e) = self.context.librarian.store_mission(mission).await {
            warn!(mission_id = %mission.id, error = %e, "Failed to persist mission snapshot");
        }
    }

    fn require_status(
        &self,
        mission_id: Uuid,
        expected: MissionStatus,
        operation: &str,
    ) -> MissionResult<()> {
        let status = self
            .context
            .registry
            .status_of(&mission_id)
            .ok_or_else(|| unknown_mission(mission_id))?;
        if status != expected {
            return Err(MissionControlError::Validation(format!(
                "cannot {operation} mission {mission_id} in status {status}"
            )));
        }
        Ok(())
    }
}

fn unknown_mission(mission_id: Uuid) -> MissionControlError {
    MissionControlError::NotFound(format!("mission {mission_id} is not active"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_outcome_wire_shape() {
        let outcome = CreateMissionOutcome {
            mission_id: Uuid::nil(),
            status: MissionStatus::Running,
        };
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["status"], "Running");
        assert_eq!(v["missionId"], Uuid::nil().to_string());
    }

    #[test]
    fn test_unknown_mission_error_is_not_found() {
        let err = unknown_mission(Uuid::nil());
        assert!(matches!(err, MissionControlError::NotFound(_)));
    }
}
