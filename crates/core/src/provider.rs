//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a chat transcript (plus the tool registry's
//! definitions) to an LLM and normalize the answer into either a text reply
//! or a set of requested tool calls.
//!
//! Implementations: OpenAI-style chat completions, Gemini generateContent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::ProviderFamily;
use crate::conversation::{Message, MessageRole};
use crate::error::ProviderError;

/// The role of a message on the provider wire.
///
/// Distinct from [`MessageRole`]: stored messages know USER/AGENT/HUMAN,
/// while the provider transcript needs system and tool turns too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call (provider-assigned, or synthesized for
    /// providers that have no call ids).
    pub id: String,

    /// Name of the tool to invoke.
    pub name: String,

    /// Arguments as a JSON string.
    pub arguments: String,
}

/// A single message in the provider transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,

    pub content: String,

    /// Tool calls requested by the assistant (if any).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a tool result message answering a specific tool call.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

impl From<&Message> for ChatMessage {
    /// Map a stored history message onto the provider transcript.
    ///
    /// Human-operator turns read as assistant output to the visitor, so they
    /// take the assistant side of the transcript.
    fn from(message: &Message) -> Self {
        let role = match message.role {
            MessageRole::User => ChatRole::User,
            MessageRole::Agent | MessageRole::Human => ChatRole::Assistant,
        };
        Self {
            role,
            content: message.content.clone(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    pub description: String,

    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model name within the provider's family (e.g. "gpt-4o-mini").
    pub model: String,

    /// The full transcript: system prompt, history turns, user turn, and any
    /// assistant/tool turns accumulated inside the current reply cycle.
    pub messages: Vec<ChatMessage>,

    /// Temperature (0.0 = deterministic, 1.0 = creative).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// Token usage information for one model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A normalized response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message (text reply and/or tool calls).
    pub message: ChatMessage,

    /// Token usage statistics.
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested).
    pub model: String,
}

/// The core Provider trait.
///
/// The reply loop calls `complete()` without knowing which provider family
/// is behind it — routing happens once, by the agent's explicit
/// [`ProviderFamily`], never by model-name sniffing.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which API family this provider speaks.
    fn family(&self) -> ProviderFamily;

    /// A human-readable name for this provider (e.g. "openai", "gemini").
    fn name(&self) -> &str;

    /// Send a request and get a normalized response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationId;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![],
            temperature: default_temperature(),
            max_tokens: None,
            tools: vec![],
        };
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "update_contact".into(),
            description: "Actualiza datos del contacto".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "updates": { "type": "object" }
                },
                "required": ["updates"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("update_contact"));
        assert!(json.contains("updates"));
    }

    #[test]
    fn history_mapping_user_and_agent() {
        let conv = ConversationId::from("conv_1");
        let user = Message::user(conv.clone(), "Hola");
        let agent = Message::agent(conv.clone(), "¡Hola! ¿En qué te ayudo?");
        let human = Message::human(conv, "Aquí Marta, del equipo de soporte.");

        assert_eq!(ChatMessage::from(&user).role, ChatRole::User);
        assert_eq!(ChatMessage::from(&agent).role, ChatRole::Assistant);
        assert_eq!(ChatMessage::from(&human).role, ChatRole::Assistant);
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = ChatMessage::tool_result("call_1", r#"{"success":true}"#);
        assert_eq!(msg.role, ChatRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }
}
