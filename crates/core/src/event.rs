//! Domain event system — decoupled communication between bounded contexts.
//!
//! The engine publishes events as a reply cycle progresses. Dashboards,
//! audit logs, or alerting can subscribe without coupling to the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A conversation was lazily linked to a newly created contact.
    ContactLinked {
        conversation_id: String,
        contact_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed inside a reply cycle.
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The engine produced a final reply.
    ReplyGenerated {
        conversation_id: String,
        model: String,
        tokens_used: u32,
        model_calls: u32,
        timestamp: DateTime<Utc>,
    },

    /// Usage was metered and the workspace balance charged.
    UsageRecorded {
        workspace_id: String,
        tokens_used: u32,
        credits_used: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
