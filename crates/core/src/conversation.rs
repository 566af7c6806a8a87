//! Conversation and Message domain types.
//!
//! A `Conversation` is a thread between one external visitor and one agent on
//! one channel. Messages are immutable turns, strictly ordered by creation
//! time; the orchestrator reads the last N as history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contact::ContactId;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The external visitor.
    User,
    /// The AI agent.
    Agent,
    /// A human operator who took over the thread.
    Human,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Human => "human",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "human" => Ok(Self::Human),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// Structured payload attached to a message (image, document, audio).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    /// Attachment type (e.g. "image", "document", "audio").
    pub kind: String,

    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// An immutable turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,

    pub conversation_id: ConversationId,

    pub role: MessageRole,

    /// Text content, markdown-capable.
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AttachmentMeta>,

    pub created_at: DateTime<Utc>,
}

impl Message {
    fn build(conversation_id: ConversationId, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            role,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new visitor message.
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::build(conversation_id, MessageRole::User, content)
    }

    /// Create a new agent reply.
    pub fn agent(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::build(conversation_id, MessageRole::Agent, content)
    }

    /// Create a message authored by a human operator.
    pub fn human(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::build(conversation_id, MessageRole::Human, content)
    }

    pub fn with_metadata(mut self, metadata: AttachmentMeta) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Closed,
}

impl Default for ConversationStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// A thread between one external visitor and one agent over one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,

    pub agent_id: String,

    pub workspace_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    /// Channel-specific visitor identifier.
    pub external_id: String,

    /// Denormalized convenience copies from the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,

    /// Lazily established link; not guaranteed at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<ContactId>,

    #[serde(default)]
    pub status: ConversationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        agent_id: impl Into<String>,
        workspace_id: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            id: ConversationId::new(),
            agent_id: agent_id.into(),
            workspace_id: workspace_id.into(),
            channel_id: None,
            external_id: external_id.into(),
            contact_name: None,
            contact_email: None,
            contact_id: None,
            status: ConversationStatus::Open,
            last_message_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let conv = ConversationId::new();
        let msg = Message::user(conv.clone(), "Hola");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "Hola");
        assert_eq!(msg.conversation_id, conv);
        assert!(msg.metadata.is_none());
    }

    #[test]
    fn message_with_attachment() {
        let msg = Message::user(ConversationId::new(), "mira esto")
            .with_metadata(AttachmentMeta {
                kind: "image".into(),
                url: "https://cdn.example.com/x.png".into(),
                filename: Some("x.png".into()),
            });
        assert_eq!(msg.metadata.as_ref().unwrap().kind, "image");
    }

    #[test]
    fn role_round_trip() {
        for role in [MessageRole::User, MessageRole::Agent, MessageRole::Human] {
            let parsed: MessageRole = role.as_str().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("robot".parse::<MessageRole>().is_err());
    }

    #[test]
    fn new_conversation_is_open_and_unlinked() {
        let conv = Conversation::new("agent_1", "ws_1", "whatsapp:+5215550000");
        assert_eq!(conv.status, ConversationStatus::Open);
        assert!(conv.contact_id.is_none());
        assert!(conv.last_message_at.is_none());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::agent(ConversationId::from("conv_1"), "Claro, te ayudo.");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, MessageRole::Agent);
        assert_eq!(back.content, "Claro, te ayudo.");
    }
}
