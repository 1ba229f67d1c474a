//! # Ingress Dispatcher
//!
//! Normalizes the common envelope from both ingress paths into a tagged
//! command and invokes the matching lifecycle handler. Unknown `type` tags
//! are handed to the base-message handler, a pass-through publish to the
//! PostOffice for routing.
//!
//! The caller identity differs by path: HTTP callers carry a verified
//! token (privileged, `userId` taken from the token subject), queue callers
//! carry only the envelope `userId`, defaulting to `system`.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use mission_shared::types::{MessageEnvelope, MessageType, PendingInput};
use mission_shared::{MissionControlError, MissionResult};

use crate::context::SystemContext;
use crate::lifecycle::MissionLifecycle;

/// Caller identity, normalized per ingress path
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub privileged: bool,
}

impl Caller {
    /// HTTP path: identity comes from the verified token subject; the
    /// envelope's `userId` is ignored.
    pub fn http(subject: impl Into<String>) -> Self {
        Self {
            user_id: subject.into(),
            privileged: true,
        }
    }

    /// Queue path: envelope identity, defaulting to `system`
    pub fn queue(user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id
                .filter(|u| !u.is_empty())
                .unwrap_or("system")
                .to_string(),
            privileged: false,
        }
    }
}

/// Handler return value surfaced to the caller
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub message: String,
    pub result: Option<Value>,
}

impl DispatchOutcome {
    fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            result: None,
        }
    }

    fn with_result(message: impl Into<String>, result: Value) -> Self {
        Self {
            message: message.into(),
            result: Some(result),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    context: Arc<SystemContext>,
    lifecycle: MissionLifecycle,
}

impl Dispatcher {
    pub fn new(context: Arc<SystemContext>) -> Self {
        let lifecycle = MissionLifecycle::new(context.clone());
        Self { context, lifecycle }
    }

    pub fn lifecycle(&self) -> &MissionLifecycle {
        &self.lifecycle
    }

    /// Dispatch one envelope. Handler errors are returned, never panicked,
    /// so the ingress loops stay alive.
    #[instrument(skip(self, envelope), fields(message_type = %envelope.message_type, user_id = %caller.user_id))]
    pub async fn dispatch(
        &self,
        envelope: MessageEnvelope,
        caller: Caller,
    ) -> MissionResult<DispatchOutcome> {
        let Some(message_type) = envelope.known_type() else {
            return self.forward_base_message(envelope).await;
        };

        match message_type {
            MessageType::CreateMission => self.handle_create(envelope, caller).await,
            MessageType::Pause => {
                let mission_id = require_mission_id(&envelope)?;
                self.lifecycle.pause_mission(mission_id).await?;
                Ok(DispatchOutcome::message_only("Mission paused"))
            }
            MessageType::Resume => {
                let mission_id = require_mission_id(&envelope)?;
                self.lifecycle.resume_mission(mission_id).await?;
                Ok(DispatchOutcome::message_only("Mission resumed"))
            }
            MessageType::Abort => {
                let mission_id = require_mission_id(&envelope)?;
                self.lifecycle.abort_mission(mission_id).await?;
                Ok(DispatchOutcome::message_only("Mission aborted"))
            }
            MessageType::Save => {
                let mission_id = require_mission_id(&envelope)?;
                let name = envelope
                    .content
                    .as_ref()
                    .and_then(|c| c.get("missionName").or_else(|| c.get("name")))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.lifecycle.save_mission(mission_id, name).await?;
                Ok(DispatchOutcome::message_only("Mission saved"))
            }
            MessageType::Load => {
                let mission_id = require_mission_id(&envelope)?;
                let summary = self
                    .lifecycle
                    .load_mission(mission_id, envelope.client_id.as_deref(), &caller.user_id)
                    .await?;
                Ok(DispatchOutcome::with_result(
                    "Mission loaded",
                    json!(summary),
                ))
            }
            MessageType::ListMissions => {
                let missions = self.lifecycle.list_missions(&caller.user_id).await;
                Ok(DispatchOutcome::with_result(
                    "Missions listed",
                    json!(missions),
                ))
            }
            MessageType::UserMessage => {
                let mission_id = require_mission_id(&envelope)?;
                let message = envelope
                    .content
                    .as_ref()
                    .and_then(|c| c.get("message"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        MissionControlError::Validation(
                            "USER_MESSAGE requires content.message".to_string(),
                        )
                    })?
                    .to_string();
                self.lifecycle
                    .handle_user_message(mission_id, envelope.client_id.as_deref(), message)
                    .await?;
                Ok(DispatchOutcome::message_only("User message delivered"))
            }
            MessageType::UserInputRequest => {
                let input = parse_pending_input(envelope.content.as_ref())?;
                self.lifecycle.register_user_input_request(input).await?;
                Ok(DispatchOutcome::message_only("User input request registered"))
            }
            MessageType::UserInputResponse => {
                let content = envelope.content.as_ref().ok_or_else(|| {
                    MissionControlError::Validation(
                        "USER_INPUT_RESPONSE requires content".to_string(),
                    )
                })?;
                let request_id = content
                    .get("requestId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        MissionControlError::Validation(
                            "USER_INPUT_RESPONSE requires content.requestId".to_string(),
                        )
                    })?;
                let response = content.get("response").cloned().unwrap_or(Value::Null);
                self.lifecycle
                    .resolve_user_input(request_id, response)
                    .await?;
                Ok(DispatchOutcome::message_only("User input routed"))
            }
            // Egress-only vocabulary arriving on ingress is not a command;
            // route it like any unrecognized message.
            MessageType::StatusUpdate
            | MessageType::Statistics
            | MessageType::Response
            | MessageType::Error => self.forward_base_message(envelope).await,
        }
    }

    async fn handle_create(
        &self,
        envelope: MessageEnvelope,
        caller: Caller,
    ) -> MissionResult<DispatchOutcome> {
        let content = envelope.content.as_ref().ok_or_else(|| {
            MissionControlError::Validation("CREATE_MISSION requires content".to_string())
        })?;
        let goal = content
            .get("goal")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                MissionControlError::Validation("CREATE_MISSION requires content.goal".to_string())
            })?
            .to_string();
        let name = content
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let mission_context = content
            .get("missionContext")
            .and_then(Value::as_str)
            .map(str::to_string);

        let outcome = self
            .lifecycle
            .create_mission(
                goal,
                name,
                mission_context,
                envelope.client_id.as_deref(),
                &caller.user_id,
            )
            .await?;

        Ok(DispatchOutcome::with_result(
            "Mission created",
            json!(outcome),
        ))
    }

    /// Base-message handler: unrecognized envelopes are forwarded to the
    /// PostOffice for routing to their actual recipient.
    async fn forward_base_message(
        &self,
        envelope: MessageEnvelope,
    ) -> MissionResult<DispatchOutcome> {
        debug!(message_type = %envelope.message_type, "Forwarding unrecognized message to PostOffice");
        if let Err(e) = self.context.post_office.send_message(&envelope).await {
            warn!(message_type = %envelope.message_type, error = %e, "Base-message forward failed");
            return Err(e);
        }
        Ok(DispatchOutcome::message_only("Message forwarded"))
    }
}

/// The target mission id, from the envelope field or the content body
fn require_mission_id(envelope: &MessageEnvelope) -> MissionResult<Uuid> {
    let raw = envelope
        .mission_id
        .as_deref()
        .or_else(|| {
            envelope
                .content
                .as_ref()
                .and_then(|c| c.get("missionId"))
                .and_then(Value::as_str)
        })
        .ok_or_else(|| {
            MissionControlError::Validation("command requires a missionId".to_string())
        })?;
    Uuid::parse_str(raw)
        .map_err(|_| MissionControlError::Validation(format!("malformed missionId: {raw}")))
}

fn parse_pending_input(content: Option<&Value>) -> MissionResult<PendingInput> {
    let content = content.ok_or_else(|| {
        MissionControlError::Validation("USER_INPUT_REQUEST requires content".to_string())
    })?;
    serde_json::from_value(content.clone()).map_err(|e| {
        MissionControlError::Validation(format!("malformed USER_INPUT_REQUEST content: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_http_is_privileged() {
        let caller = Caller::http("u1");
        assert_eq!(caller.user_id, "u1");
        assert!(caller.privileged);
    }

    #[test]
    fn test_caller_queue_defaults_to_system() {
        assert_eq!(Caller::queue(None).user_id, "system");
        assert_eq!(Caller::queue(Some("")).user_id, "system");
        let caller = Caller::queue(Some("u7"));
        assert_eq!(caller.user_id, "u7");
        assert!(!caller.privileged);
    }

    #[test]
    fn test_require_mission_id_from_envelope_field() {
        let id = Uuid::new_v4();
        let envelope = MessageEnvelope {
            message_type: "PAUSE".to_string(),
            mission_id: Some(id.to_string()),
            ..Default::default()
        };
        assert_eq!(require_mission_id(&envelope).unwrap(), id);
    }

    #[test]
    fn test_require_mission_id_falls_back_to_content() {
        let id = Uuid::new_v4();
        let envelope = MessageEnvelope {
            message_type: "PAUSE".to_string(),
            content: Some(json!({ "missionId": id.to_string() })),
            ..Default::default()
        };
        assert_eq!(require_mission_id(&envelope).unwrap(), id);
    }

    #[test]
    fn test_require_mission_id_rejects_malformed() {
        let envelope = MessageEnvelope {
            message_type: "PAUSE".to_string(),
            mission_id: Some("not-a-uuid".to_string()),
            ..Default::default()
        };
        let err = require_mission_id(&envelope).unwrap_err();
        assert!(matches!(err, MissionControlError::Validation(_)));

        let missing = MessageEnvelope {
            message_type: "PAUSE".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            require_mission_id(&missing),
            Err(MissionControlError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_pending_input() {
        let id = Uuid::new_v4();
        let input = parse_pending_input(Some(&json!({
            "requestId": "r1",
            "missionId": id.to_string(),
            "stepId": "s1",
            "agentId": "a1"
        })))
        .unwrap();
        assert_eq!(input.request_id, "r1");
        assert_eq!(input.mission_id, id);

        assert!(matches!(
            parse_pending_input(None),
            Err(MissionControlError::Validation(_))
        ));
        assert!(matches!(
            parse_pending_input(Some(&json!({"requestId": "r1"}))),
            Err(MissionControlError::Validation(_))
        ));
    }
}
