//! Storage traits — the data-access contract with the persistence layer.
//!
//! The engine never talks to a database directly; it consumes these traits.
//! Implementations: SQLite (production), in-memory (tests and sandbox).

use async_trait::async_trait;

use crate::agent::AgentProfile;
use crate::billing::{CreditBalance, UsageLog};
use crate::contact::{Contact, ContactId};
use crate::conversation::{Conversation, ConversationId, Message};
use crate::error::StoreError;
use crate::knowledge::DocumentChunk;

/// Read access to agent configuration.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Fetch an agent profile (including custom field definitions).
    async fn get_agent(
        &self,
        agent_id: &str,
    ) -> std::result::Result<Option<AgentProfile>, StoreError>;
}

/// Conversation and message access.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<Option<Conversation>, StoreError>;

    /// Link a contact to a conversation, compare-and-swap style: the update
    /// only applies while the conversation is still unlinked. Returns the
    /// contact id that is linked afterwards — the given one if this call won,
    /// or the previously linked one if a concurrent caller got there first.
    async fn link_contact(
        &self,
        id: &ConversationId,
        contact_id: &ContactId,
    ) -> std::result::Result<ContactId, StoreError>;

    /// Append an immutable message and bump the conversation's
    /// last-message timestamp.
    async fn create_message(&self, message: Message) -> std::result::Result<(), StoreError>;

    /// The last `n` messages of a conversation, ordered oldest-first.
    async fn last_messages(
        &self,
        id: &ConversationId,
        n: usize,
    ) -> std::result::Result<Vec<Message>, StoreError>;
}

/// Contact records and their custom data.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn create_contact(
        &self,
        contact: Contact,
    ) -> std::result::Result<ContactId, StoreError>;

    async fn get_contact(
        &self,
        id: &ContactId,
    ) -> std::result::Result<Option<Contact>, StoreError>;

    /// Merge key→value pairs into a contact's custom data. Callers are
    /// responsible for writing only keys recognized by the agent's field
    /// definitions; the store applies whatever it is given.
    async fn update_custom_data(
        &self,
        id: &ContactId,
        workspace_id: &str,
        updates: serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<(), StoreError>;
}

/// Read access to ingested knowledge.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// All chunks across the agent's knowledge bases whose parent source is
    /// READY. Chunks of pending/processing/failed sources never surface.
    async fn ready_chunks(
        &self,
        agent_id: &str,
    ) -> std::result::Result<Vec<DocumentChunk>, StoreError>;
}

/// Usage metering and the credit ledger.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Persist one usage log row and apply
    /// `balance -= credits_used, total_used += credits_used` on the
    /// workspace's credit balance, as a single atomic unit. The balance has
    /// no floor; it may go negative.
    async fn record_usage(&self, log: UsageLog) -> std::result::Result<(), StoreError>;

    async fn credit_balance(
        &self,
        workspace_id: &str,
    ) -> std::result::Result<Option<CreditBalance>, StoreError>;
}
