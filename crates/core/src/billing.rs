//! Billing domain types: usage logs and the credit ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ConversationId;

/// Append-only record of one LLM reply cycle's consumption.
///
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLog {
    pub id: String,

    pub workspace_id: String,

    pub agent_id: String,

    pub conversation_id: ConversationId,

    /// Total tokens across all model calls in the turn.
    pub tokens_used: u32,

    /// Credits charged for the turn.
    pub credits_used: u32,

    /// Model name that served the turn.
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl UsageLog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspace_id: impl Into<String>,
        agent_id: impl Into<String>,
        conversation_id: ConversationId,
        tokens_used: u32,
        credits_used: u32,
        model: impl Into<String>,
        channel_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            agent_id: agent_id.into(),
            conversation_id,
            tokens_used,
            credits_used,
            model: model.into(),
            channel_id,
            created_at: Utc::now(),
        }
    }
}

/// One credit balance per workspace.
///
/// `balance` may go negative — there is no floor or reservation here; credit
/// limits are enforced elsewhere. `total_used` only grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditBalance {
    pub workspace_id: String,
    pub balance: i64,
    pub total_used: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_log_construction() {
        let log = UsageLog::new(
            "ws_1",
            "agent_1",
            ConversationId::from("conv_1"),
            250,
            3,
            "gpt-4o-mini",
            Some("channel_web".into()),
        );
        assert!(!log.id.is_empty());
        assert_eq!(log.tokens_used, 250);
        assert_eq!(log.credits_used, 3);
        assert_eq!(log.channel_id.as_deref(), Some("channel_web"));
    }

    #[test]
    fn usage_log_serialization_roundtrip() {
        let log = UsageLog::new(
            "ws_1",
            "agent_1",
            ConversationId::from("conv_1"),
            100,
            1,
            "gemini-1.5-flash",
            None,
        );
        let json = serde_json::to_string(&log).unwrap();
        let back: UsageLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model, "gemini-1.5-flash");
        assert!(back.channel_id.is_none());
    }
}
