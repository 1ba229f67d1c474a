//! # Message Envelope
//!
//! The common envelope carried by both ingress paths (HTTP `POST /message`
//! and the service queue) and by everything Mission Control publishes to the
//! PostOffice. The `type` field stays a free string on the wire; recognized
//! command types parse into [`MessageType`], everything else is routed to the
//! base handler (broker pass-through).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message types recognized by Mission Control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    CreateMission,
    Pause,
    Resume,
    Abort,
    Save,
    Load,
    ListMissions,
    UserMessage,
    UserInputRequest,
    UserInputResponse,
    // Egress-only
    StatusUpdate,
    Statistics,
    Response,
    Error,
}

impl MessageType {
    /// Parse a wire `type` tag. `None` means the type is unknown to Mission
    /// Control and is handed to the base-message handler.
    pub fn parse(tag: &str) -> Option<Self> {
        let t = match tag {
            "CREATE_MISSION" => MessageType::CreateMission,
            "PAUSE" => MessageType::Pause,
            "RESUME" => MessageType::Resume,
            "ABORT" => MessageType::Abort,
            "SAVE" => MessageType::Save,
            "LOAD" => MessageType::Load,
            "LIST_MISSIONS" => MessageType::ListMissions,
            "USER_MESSAGE" => MessageType::UserMessage,
            "USER_INPUT_REQUEST" => MessageType::UserInputRequest,
            "USER_INPUT_RESPONSE" => MessageType::UserInputResponse,
            "STATUS_UPDATE" => MessageType::StatusUpdate,
            "STATISTICS" => MessageType::Statistics,
            "RESPONSE" => MessageType::Response,
            "ERROR" => MessageType::Error,
            _ => return None,
        };
        Some(t)
    }

    /// The wire tag for this type
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::CreateMission => "CREATE_MISSION",
            MessageType::Pause => "PAUSE",
            MessageType::Resume => "RESUME",
            MessageType::Abort => "ABORT",
            MessageType::Save => "SAVE",
            MessageType::Load => "LOAD",
            MessageType::ListMissions => "LIST_MISSIONS",
            MessageType::UserMessage => "USER_MESSAGE",
            MessageType::UserInputRequest => "USER_INPUT_REQUEST",
            MessageType::UserInputResponse => "USER_INPUT_RESPONSE",
            MessageType::StatusUpdate => "STATUS_UPDATE",
            MessageType::Statistics => "STATISTICS",
            MessageType::Response => "RESPONSE",
            MessageType::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope shared by the HTTP and queue ingress paths and by egress
/// publishes to the PostOffice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl MessageEnvelope {
    /// Build an outbound envelope from Mission Control
    pub fn outbound(message_type: MessageType, content: Value) -> Self {
        Self {
            message_type: message_type.as_str().to_string(),
            sender: "MissionControl".to_string(),
            content: Some(content),
            ..Default::default()
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The parsed command type, if recognized
    pub fn known_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.message_type)
    }

    /// Whether the queue path owes the sender a reply
    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some() && self.correlation_id.is_some()
    }
}
