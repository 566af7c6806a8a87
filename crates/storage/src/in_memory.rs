//! In-memory store for tests and the sandbox.
//!
//! All five storage traits behind one `std::sync::Mutex`. Critical sections
//! never hold the lock across an await, so the async trait methods stay
//! safe under concurrent turns.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use konsul_core::agent::AgentProfile;
use konsul_core::billing::{CreditBalance, UsageLog};
use konsul_core::contact::{Contact, ContactId};
use konsul_core::conversation::{Conversation, ConversationId, Message};
use konsul_core::error::StoreError;
use konsul_core::knowledge::{DocumentChunk, KnowledgeBase, KnowledgeSource, SourceKind, SourceStatus};
use konsul_core::store::{AgentStore, ContactStore, ConversationStore, KnowledgeStore, UsageStore};

#[derive(Default)]
struct Inner {
    agents: HashMap<String, AgentProfile>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    contacts: HashMap<ContactId, Contact>,
    bases: Vec<KnowledgeBase>,
    sources: Vec<KnowledgeSource>,
    chunks: Vec<DocumentChunk>,
    usage_logs: Vec<UsageLog>,
    balances: HashMap<String, CreditBalance>,
}

/// An in-memory implementation of every storage trait.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding helpers ───────────────────────────────────────────────

    pub fn insert_agent(&self, agent: AgentProfile) {
        let mut inner = self.inner.lock().unwrap();
        inner.agents.insert(agent.id.clone(), agent);
    }

    pub fn insert_conversation(&self, conversation: Conversation) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .conversations
            .insert(conversation.id.clone(), conversation);
    }

    pub fn insert_knowledge_base(&self, base: KnowledgeBase) {
        let mut inner = self.inner.lock().unwrap();
        inner.bases.push(base);
    }

    pub fn insert_knowledge_source(&self, source: KnowledgeSource) {
        let mut inner = self.inner.lock().unwrap();
        inner.sources.push(source);
    }

    pub fn insert_chunk(&self, chunk: DocumentChunk) {
        let mut inner = self.inner.lock().unwrap();
        inner.chunks.push(chunk);
    }

    /// Seed one READY chunk for an agent, creating a base and source around it.
    pub fn add_ready_chunk(&self, agent_id: &str, content: &str) {
        let base = KnowledgeBase::new(agent_id, "seeded");
        let source = KnowledgeSource::new(&base.id, "seeded", SourceKind::Text).ready();
        let chunk = DocumentChunk::new(&source.id, 0, content);
        let mut inner = self.inner.lock().unwrap();
        inner.bases.push(base);
        inner.sources.push(source);
        inner.chunks.push(chunk);
    }

    /// Seed a chunk whose parent source is still ingesting (never retrievable).
    pub fn add_pending_chunk(&self, agent_id: &str, content: &str) {
        let base = KnowledgeBase::new(agent_id, "seeded");
        let source = KnowledgeSource::new(&base.id, "seeded", SourceKind::Text);
        let chunk = DocumentChunk::new(&source.id, 0, content);
        let mut inner = self.inner.lock().unwrap();
        inner.bases.push(base);
        inner.sources.push(source);
        inner.chunks.push(chunk);
    }

    pub fn set_balance(&self, workspace_id: &str, balance: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.balances.insert(
            workspace_id.to_string(),
            CreditBalance {
                workspace_id: workspace_id.to_string(),
                balance,
                total_used: 0,
            },
        );
    }

    // ── Inspection helpers for tests ──────────────────────────────────

    pub fn usage_logs(&self) -> Vec<UsageLog> {
        self.inner.lock().unwrap().usage_logs.clone()
    }

    pub fn contact_count(&self) -> usize {
        self.inner.lock().unwrap().contacts.len()
    }

    pub fn messages_for(&self, id: &ConversationId) -> Vec<Message> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl AgentStore for InMemoryStore {
    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentProfile>, StoreError> {
        Ok(self.inner.lock().unwrap().agents.get(agent_id).cloned())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self.inner.lock().unwrap().conversations.get(id).cloned())
    }

    async fn link_contact(
        &self,
        id: &ConversationId,
        contact_id: &ContactId,
    ) -> Result<ContactId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::QueryFailed(format!("conversation {id} not found")))?;

        match &conversation.contact_id {
            Some(existing) => Ok(existing.clone()),
            None => {
                conversation.contact_id = Some(contact_id.clone());
                Ok(contact_id.clone())
            }
        }
    }

    async fn create_message(&self, message: Message) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(conversation) = inner.conversations.get_mut(&message.conversation_id) {
            conversation.last_message_at = Some(message.created_at);
        }
        inner
            .messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn last_messages(
        &self,
        id: &ConversationId,
        n: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut messages = inner.messages.get(id).cloned().unwrap_or_default();
        messages.sort_by_key(|m| m.created_at);
        let skip = messages.len().saturating_sub(n);
        Ok(messages.split_off(skip))
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn create_contact(&self, contact: Contact) -> Result<ContactId, StoreError> {
        let id = contact.id.clone();
        self.inner
            .lock()
            .unwrap()
            .contacts
            .insert(id.clone(), contact);
        Ok(id)
    }

    async fn get_contact(&self, id: &ContactId) -> Result<Option<Contact>, StoreError> {
        Ok(self.inner.lock().unwrap().contacts.get(id).cloned())
    }

    async fn update_custom_data(
        &self,
        id: &ContactId,
        workspace_id: &str,
        updates: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let contact = inner
            .contacts
            .get_mut(id)
            .filter(|c| c.workspace_id == workspace_id)
            .ok_or_else(|| StoreError::QueryFailed(format!("contact {id} not found")))?;

        for (key, value) in updates {
            contact.custom_data.insert(key, value);
        }
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn ready_chunks(&self, agent_id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        let inner = self.inner.lock().unwrap();

        let base_ids: Vec<&str> = inner
            .bases
            .iter()
            .filter(|b| b.agent_id == agent_id)
            .map(|b| b.id.as_str())
            .collect();

        let ready_source_ids: Vec<&str> = inner
            .sources
            .iter()
            .filter(|s| base_ids.contains(&s.base_id.as_str()) && s.status == SourceStatus::Ready)
            .map(|s| s.id.as_str())
            .collect();

        Ok(inner
            .chunks
            .iter()
            .filter(|c| ready_source_ids.contains(&c.source_id.as_str()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UsageStore for InMemoryStore {
    async fn record_usage(&self, log: UsageLog) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let credits = log.credits_used as i64;
        let workspace_id = log.workspace_id.clone();

        inner.usage_logs.push(log);

        let balance = inner
            .balances
            .entry(workspace_id.clone())
            .or_insert_with(|| CreditBalance {
                workspace_id,
                balance: 0,
                total_used: 0,
            });
        balance.balance -= credits;
        balance.total_used += credits;
        Ok(())
    }

    async fn credit_balance(
        &self,
        workspace_id: &str,
    ) -> Result<Option<CreditBalance>, StoreError> {
        Ok(self.inner.lock().unwrap().balances.get(workspace_id).cloned())
    }
}

/// Seed timestamp helper so history ordering is deterministic in tests.
pub fn backdated(message: Message, seconds_ago: i64) -> Message {
    let mut message = message;
    message.created_at = Utc::now() - chrono::Duration::seconds(seconds_ago);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use konsul_core::agent::{JobKind, JobProfile, ModelRef};
    use konsul_core::conversation::MessageRole;

    fn agent(id: &str) -> AgentProfile {
        AgentProfile {
            id: id.into(),
            workspace_id: "ws_1".into(),
            name: "Sofía".into(),
            model: ModelRef::openai("gpt-4o-mini"),
            temperature: 0.7,
            personality: String::new(),
            style: Default::default(),
            job: JobProfile::new(JobKind::Support),
            flags: Default::default(),
            timezone: "UTC".into(),
            custom_fields: vec![],
            calendar: None,
        }
    }

    #[tokio::test]
    async fn agent_lookup() {
        let store = InMemoryStore::new();
        store.insert_agent(agent("agent_1"));

        assert!(store.get_agent("agent_1").await.unwrap().is_some());
        assert!(store.get_agent("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn link_contact_is_first_writer_wins() {
        let store = InMemoryStore::new();
        let conversation = Conversation::new("agent_1", "ws_1", "ext_1");
        let conv_id = conversation.id.clone();
        store.insert_conversation(conversation);

        let first = ContactId::new();
        let second = ContactId::new();

        let linked = store.link_contact(&conv_id, &first).await.unwrap();
        assert_eq!(linked, first);

        // A later caller gets the winner's id back, not its own.
        let linked = store.link_contact(&conv_id, &second).await.unwrap();
        assert_eq!(linked, first);
    }

    #[tokio::test]
    async fn last_messages_returns_oldest_first_window() {
        let store = InMemoryStore::new();
        let conversation = Conversation::new("agent_1", "ws_1", "ext_1");
        let conv_id = conversation.id.clone();
        store.insert_conversation(conversation);

        for i in 0..25 {
            let msg = backdated(
                Message::user(conv_id.clone(), format!("mensaje {i}")),
                25 - i,
            );
            store.create_message(msg).await.unwrap();
        }

        let history = store.last_messages(&conv_id, 20).await.unwrap();
        assert_eq!(history.len(), 20);
        assert_eq!(history[0].content, "mensaje 5");
        assert_eq!(history[19].content, "mensaje 24");
        assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn create_message_bumps_last_message_at() {
        let store = InMemoryStore::new();
        let conversation = Conversation::new("agent_1", "ws_1", "ext_1");
        let conv_id = conversation.id.clone();
        store.insert_conversation(conversation);

        store
            .create_message(Message::agent(conv_id.clone(), "Hola"))
            .await
            .unwrap();

        let conversation = store.get_conversation(&conv_id).await.unwrap().unwrap();
        assert!(conversation.last_message_at.is_some());
        assert_eq!(
            store.messages_for(&conv_id)[0].role,
            MessageRole::Agent
        );
    }

    #[tokio::test]
    async fn ready_chunks_excludes_pending_sources() {
        let store = InMemoryStore::new();
        store.add_ready_chunk("agent_1", "listo");
        store.add_pending_chunk("agent_1", "pendiente");
        store.add_ready_chunk("agent_2", "de otro agente");

        let chunks = store.ready_chunks("agent_1").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "listo");
    }

    #[tokio::test]
    async fn update_custom_data_merges_keys() {
        let store = InMemoryStore::new();
        let contact = Contact::new("ws_1");
        let id = store.create_contact(contact).await.unwrap();

        let mut updates = serde_json::Map::new();
        updates.insert("status".into(), serde_json::json!("Interesado"));
        store.update_custom_data(&id, "ws_1", updates).await.unwrap();

        let mut updates = serde_json::Map::new();
        updates.insert("budget".into(), serde_json::json!(1500));
        store.update_custom_data(&id, "ws_1", updates).await.unwrap();

        let contact = store.get_contact(&id).await.unwrap().unwrap();
        assert_eq!(contact.custom_data["status"], "Interesado");
        assert_eq!(contact.custom_data["budget"], 1500);
    }

    #[tokio::test]
    async fn update_custom_data_enforces_workspace_scope() {
        let store = InMemoryStore::new();
        let contact = Contact::new("ws_1");
        let id = store.create_contact(contact).await.unwrap();

        let mut updates = serde_json::Map::new();
        updates.insert("status".into(), serde_json::json!("x"));
        let result = store.update_custom_data(&id, "other_ws", updates).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn record_usage_decrements_balance_and_accrues_total() {
        let store = InMemoryStore::new();
        store.set_balance("ws_1", 100);

        store
            .record_usage(UsageLog::new(
                "ws_1",
                "agent_1",
                ConversationId::from("conv_1"),
                250,
                3,
                "gpt-4o-mini",
                None,
            ))
            .await
            .unwrap();

        let balance = store.credit_balance("ws_1").await.unwrap().unwrap();
        assert_eq!(balance.balance, 97);
        assert_eq!(balance.total_used, 3);
        assert_eq!(store.usage_logs().len(), 1);
    }

    #[tokio::test]
    async fn balance_may_go_negative() {
        let store = InMemoryStore::new();
        store.set_balance("ws_1", 1);

        store
            .record_usage(UsageLog::new(
                "ws_1",
                "agent_1",
                ConversationId::from("conv_1"),
                500,
                5,
                "gpt-4o-mini",
                None,
            ))
            .await
            .unwrap();

        let balance = store.credit_balance("ws_1").await.unwrap().unwrap();
        assert_eq!(balance.balance, -4);
        assert_eq!(balance.total_used, 5);
    }
}
