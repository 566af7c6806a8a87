//! The reply orchestrator — the bounded tool-call loop.
//!
//! One call to [`ReplyEngine::generate_reply`] handles one inbound user
//! message end to end. The order never changes: load agent and
//! conversation, acquire the conversation lock, ensure the contact link,
//! retrieve context, build the prompt, run the model loop, persist the
//! reply, meter usage.
//!
//! The loop runs at most `max_tool_iterations` model invocations (3 by
//! default). If the model keeps requesting tools past the bound, the loop
//! simply exits with whatever content the last response carried — possibly
//! an empty string — rather than raising an error.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use konsul_billing::{TurnUsage, UsageMeter};
use konsul_core::calendar::CalendarClient;
use konsul_core::conversation::{ConversationId, Message};
use konsul_core::error::Error;
use konsul_core::event::{DomainEvent, EventBus};
use konsul_core::provider::{ChatMessage, Provider as _, ProviderRequest};
use konsul_core::store::{AgentStore, ContactStore, ConversationStore};
use konsul_core::tool::ToolCall;
use konsul_providers::ProviderRouter;
use konsul_retrieval::Retriever;

use crate::linker::ContactLinker;
use crate::locks::ConversationLocks;
use crate::prompt;

/// Which tool surface the engine exposes to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineMode {
    /// Production channel traffic: `update_contact` only.
    #[default]
    Live,
    /// Playground traffic: calendar tools join when the agent's integration
    /// is enabled.
    Sandbox,
}

/// The outcome of one reply cycle.
#[derive(Debug, Clone)]
pub struct ReplyOutcome {
    /// The final assistant-visible reply (may be empty).
    pub reply: String,
    /// Total tokens across all model calls in the turn.
    pub tokens_used: u32,
    /// Credits charged for the turn.
    pub credits_used: u32,
}

/// The reply orchestration engine.
pub struct ReplyEngine {
    agents: Arc<dyn AgentStore>,
    conversations: Arc<dyn ConversationStore>,
    contacts: Arc<dyn ContactStore>,
    providers: ProviderRouter,
    retriever: Retriever,
    meter: UsageMeter,
    linker: ContactLinker,
    locks: ConversationLocks,
    event_bus: Arc<EventBus>,
    calendar: Option<Arc<dyn CalendarClient>>,
    mode: EngineMode,
    max_tool_iterations: u32,
    history_window: usize,
    retrieval_limit: usize,
}

impl ReplyEngine {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        conversations: Arc<dyn ConversationStore>,
        contacts: Arc<dyn ContactStore>,
        providers: ProviderRouter,
        retriever: Retriever,
        meter: UsageMeter,
    ) -> Self {
        let linker = ContactLinker::new(conversations.clone(), contacts.clone());
        Self {
            agents,
            conversations,
            contacts,
            providers,
            retriever,
            meter,
            linker,
            locks: ConversationLocks::new(),
            event_bus: Arc::new(EventBus::default()),
            calendar: None,
            mode: EngineMode::Live,
            max_tool_iterations: 3,
            history_window: 20,
            retrieval_limit: 5,
        }
    }

    /// Switch between live and sandbox tool surfaces.
    pub fn with_mode(mut self, mode: EngineMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach a calendar collaborator (used by sandbox turns).
    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarClient>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Attach a shared event bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Apply orchestrator/retrieval limits from resolved configuration.
    pub fn with_engine_config(mut self, config: &konsul_config::EngineConfig) -> Self {
        self.max_tool_iterations = config.orchestrator.max_tool_iterations;
        self.history_window = config.orchestrator.history_window;
        self.retrieval_limit = config.retrieval.limit;
        self
    }

    /// Generate the agent's reply to one inbound user message.
    ///
    /// The caller persists the inbound message before invoking this; the
    /// engine persists only the agent's reply. Unrecoverable conditions
    /// (unknown agent/conversation, unconfigured provider, provider outage)
    /// surface as errors and nothing is billed; recoverable ones (retrieval
    /// failure, tool failure) degrade in place and the turn completes.
    pub async fn generate_reply(
        &self,
        agent_id: &str,
        conversation_id: &ConversationId,
        user_message: &str,
    ) -> Result<ReplyOutcome, Error> {
        let agent = self
            .agents
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;

        let provider = self.providers.resolve(&agent.model)?;

        // Serialize turns on the same conversation.
        let lock = self.locks.for_conversation(conversation_id);
        let _guard = lock.lock().await;

        let conversation = self
            .conversations
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| Error::ConversationNotFound(conversation_id.to_string()))?;

        // Contact link must exist before any tool can target it.
        let link = self.linker.ensure_contact(&conversation).await?;
        if link.created {
            self.event_bus.publish(DomainEvent::ContactLinked {
                conversation_id: conversation_id.to_string(),
                contact_id: link.contact_id.to_string(),
                timestamp: Utc::now(),
            });
        }

        let context_chunks = if agent.flags.smart_retrieval {
            self.retriever
                .retrieve(agent_id, user_message, self.retrieval_limit)
                .await
        } else {
            Vec::new()
        };

        let system_prompt = prompt::build_system_prompt(&agent, &context_chunks);

        let history = self
            .conversations
            .last_messages(conversation_id, self.history_window)
            .await?;

        let mut messages: Vec<ChatMessage> = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(&system_prompt));
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(user_message));

        let calendar = match self.mode {
            EngineMode::Sandbox => self.calendar.clone(),
            EngineMode::Live => None,
        };
        let registry = konsul_tools::registry_for_turn(
            &agent,
            Some(link.contact_id.clone()),
            self.contacts.clone(),
            calendar,
        );
        let tool_definitions = registry.definitions();

        let mut usage = TurnUsage::new();
        let mut reply_text = String::new();

        for iteration in 1..=self.max_tool_iterations {
            debug!(
                conversation_id = %conversation_id,
                iteration,
                "Reply loop iteration"
            );

            let request = ProviderRequest {
                model: agent.model.name.clone(),
                messages: messages.clone(),
                temperature: agent.temperature,
                max_tokens: None,
                tools: tool_definitions.clone(),
            };

            // Provider failures propagate — a failed call is never billed.
            let response = provider.complete(request).await?;

            usage.count_call();
            if let Some(call_usage) = &response.usage {
                usage.add(call_usage);
            }

            let assistant = response.message;
            reply_text = assistant.content.clone();
            let tool_calls = assistant.tool_calls.clone();

            // The assistant message (tool calls included) goes back onto the
            // transcript before any tool result.
            messages.push(assistant);

            if tool_calls.is_empty() {
                break;
            }

            debug!(tool_count = tool_calls.len(), "Executing tool calls");

            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };

                let started = std::time::Instant::now();
                let result = registry.execute(&call).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                // Handler errors become structured tool responses the model
                // can react to; the turn itself keeps going.
                let (success, output) = match result {
                    Ok(tool_result) => (tool_result.success, tool_result.output),
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        (
                            false,
                            serde_json::json!({
                                "success": false,
                                "error": e.to_string(),
                            })
                            .to_string(),
                        )
                    }
                };

                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: tc.name.clone(),
                    success,
                    duration_ms,
                    timestamp: Utc::now(),
                });

                messages.push(ChatMessage::tool_result(&tc.id, &output));
            }
            // Loop back — the model sees the tool results next iteration.
            // When the bound is exhausted, the last content stands as-is.
        }

        self.conversations
            .create_message(Message::agent(conversation_id.clone(), reply_text.clone()))
            .await?;

        let credits_used = self
            .meter
            .record(
                &agent.workspace_id,
                agent_id,
                conversation_id,
                conversation.channel_id.as_deref(),
                &agent.model.name,
                usage.total_tokens,
            )
            .await?;

        self.event_bus.publish(DomainEvent::ReplyGenerated {
            conversation_id: conversation_id.to_string(),
            model: agent.model.name.clone(),
            tokens_used: usage.total_tokens,
            model_calls: usage.model_calls,
            timestamp: Utc::now(),
        });
        self.event_bus.publish(DomainEvent::UsageRecorded {
            workspace_id: agent.workspace_id.clone(),
            tokens_used: usage.total_tokens,
            credits_used,
            timestamp: Utc::now(),
        });

        info!(
            conversation_id = %conversation_id,
            model_calls = usage.model_calls,
            tokens_used = usage.total_tokens,
            credits_used,
            "Reply cycle complete"
        );

        Ok(ReplyOutcome {
            reply: reply_text,
            tokens_used: usage.total_tokens,
            credits_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use konsul_core::agent::{
        AgentProfile, BehaviorFlags, CommunicationStyle, CustomFieldDef, FieldKind, JobKind,
        JobProfile, ModelRef, ProviderFamily,
    };
    use konsul_core::conversation::Conversation;
    use konsul_core::error::ProviderError;
    use konsul_core::provider::{
        MessageToolCall, Provider, ProviderResponse, Usage,
    };
    use konsul_storage::InMemoryStore;
    use std::sync::Mutex;

    /// A provider that returns scripted responses in sequence; the last one
    /// repeats once the script runs out.
    struct ScriptedProvider {
        responses: Mutex<Vec<ProviderResponse>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            })
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn family(&self) -> ProviderFamily {
            ProviderFamily::OpenAi
        }

        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            let responses = self.responses.lock().unwrap();
            let index = (*calls as usize).min(responses.len() - 1);
            *calls += 1;
            Ok(responses[index].clone())
        }
    }

    fn text_response(text: &str) -> ProviderResponse {
        ProviderResponse {
            message: ChatMessage::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            }),
            model: "gpt-4o-mini".into(),
        }
    }

    fn tool_response(name: &str, arguments: serde_json::Value, content: &str) -> ProviderResponse {
        let mut message = ChatMessage::assistant(content);
        message.tool_calls = vec![MessageToolCall {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: arguments.to_string(),
        }];
        ProviderResponse {
            message,
            usage: Some(Usage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            }),
            model: "gpt-4o-mini".into(),
        }
    }

    fn agent() -> AgentProfile {
        AgentProfile {
            id: "agent_1".into(),
            workspace_id: "ws_1".into(),
            name: "Sofía".into(),
            model: ModelRef::openai("gpt-4o-mini"),
            temperature: 0.7,
            personality: "Amable y directa.".into(),
            style: CommunicationStyle::Normal,
            job: JobProfile::new(JobKind::Sales),
            flags: BehaviorFlags::default(),
            timezone: "UTC".into(),
            custom_fields: vec![CustomFieldDef {
                key: "status".into(),
                label: "Estado".into(),
                kind: FieldKind::Select,
                description: String::new(),
                options: vec!["Interesado".into(), "No interesado".into()],
            }],
            calendar: None,
        }
    }

    fn engine_with(
        store: &Arc<InMemoryStore>,
        provider: Arc<ScriptedProvider>,
    ) -> ReplyEngine {
        let mut providers = ProviderRouter::new();
        providers.register(provider);
        ReplyEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            providers,
            Retriever::new(store.clone()),
            UsageMeter::new(store.clone()),
        )
    }

    fn seed(store: &Arc<InMemoryStore>) -> ConversationId {
        store.insert_agent(agent());
        let conversation = Conversation::new("agent_1", "ws_1", "ext_1");
        let id = conversation.id.clone();
        store.insert_conversation(conversation);
        id
    }

    #[tokio::test]
    async fn plain_text_turn() {
        let store = Arc::new(InMemoryStore::new());
        let conv_id = seed(&store);
        let provider = ScriptedProvider::new(vec![text_response("¡Hola! ¿En qué te ayudo?")]);
        let engine = engine_with(&store, provider.clone());

        let outcome = engine
            .generate_reply("agent_1", &conv_id, "Hola")
            .await
            .unwrap();

        assert_eq!(outcome.reply, "¡Hola! ¿En qué te ayudo?");
        assert_eq!(outcome.tokens_used, 120);
        assert_eq!(outcome.credits_used, 2); // ceil(120/100)
        assert_eq!(provider.call_count(), 1);

        // reply was persisted
        let messages = store.messages_for(&conv_id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "¡Hola! ¿En qué te ayudo?");
    }

    #[tokio::test]
    async fn loop_stops_after_exactly_three_model_calls() {
        let store = Arc::new(InMemoryStore::new());
        let conv_id = seed(&store);
        // Always requests a tool — the bound has to cut it off.
        let provider = ScriptedProvider::new(vec![tool_response(
            "update_contact",
            serde_json::json!({"updates": {"status": "Interesado"}}),
            "",
        )]);
        let engine = engine_with(&store, provider.clone());

        let outcome = engine
            .generate_reply("agent_1", &conv_id, "Sí me interesa")
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 3);
        // Best-effort exit: last content (empty) stands, no error.
        assert_eq!(outcome.reply, "");
        assert_eq!(outcome.tokens_used, 360);
    }

    #[tokio::test]
    async fn tool_call_then_final_text() {
        let store = Arc::new(InMemoryStore::new());
        let conv_id = seed(&store);
        let provider = ScriptedProvider::new(vec![
            tool_response(
                "update_contact",
                serde_json::json!({"updates": {"status": "Interesado"}}),
                "",
            ),
            text_response("¡Genial! Te contactamos pronto."),
        ]);
        let engine = engine_with(&store, provider.clone());

        let outcome = engine
            .generate_reply("agent_1", &conv_id, "Sí me interesa")
            .await
            .unwrap();

        assert_eq!(outcome.reply, "¡Genial! Te contactamos pronto.");
        assert_eq!(provider.call_count(), 2);

        // The extraction landed on the lazily created contact.
        let conversation = store.get_conversation(&conv_id).await.unwrap().unwrap();
        let contact_id = conversation.contact_id.unwrap();
        let contact = store.get_contact(&contact_id).await.unwrap().unwrap();
        assert_eq!(contact.custom_data["status"], "Interesado");
    }

    #[tokio::test]
    async fn unknown_tool_is_contained_and_turn_completes() {
        let store = Arc::new(InMemoryStore::new());
        let conv_id = seed(&store);
        let provider = ScriptedProvider::new(vec![
            tool_response("inventar_datos", serde_json::json!({}), ""),
            text_response("Perdona, no pude hacer eso."),
        ]);
        let engine = engine_with(&store, provider.clone());

        let outcome = engine
            .generate_reply("agent_1", &conv_id, "haz magia")
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Perdona, no pude hacer eso.");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_agent_is_fatal() {
        let store = Arc::new(InMemoryStore::new());
        let conv_id = seed(&store);
        let provider = ScriptedProvider::new(vec![text_response("x")]);
        let engine = engine_with(&store, provider);

        let err = engine
            .generate_reply("missing", &conv_id, "Hola")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_conversation_is_fatal() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store);
        let provider = ScriptedProvider::new(vec![text_response("x")]);
        let engine = engine_with(&store, provider);

        let err = engine
            .generate_reply("agent_1", &ConversationId::from("missing"), "Hola")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn unconfigured_provider_family_is_fatal_and_unbilled() {
        let store = Arc::new(InMemoryStore::new());
        let mut gemini_agent = agent();
        gemini_agent.model = ModelRef::gemini("gemini-1.5-flash");
        store.insert_agent(gemini_agent);
        let conversation = Conversation::new("agent_1", "ws_1", "ext_1");
        let conv_id = conversation.id.clone();
        store.insert_conversation(conversation);

        let provider = ScriptedProvider::new(vec![text_response("x")]);
        let engine = engine_with(&store, provider); // registers OpenAI family only

        let err = engine
            .generate_reply("agent_1", &conv_id, "Hola")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::NotConfigured(_))));
        assert!(store.usage_logs().is_empty());
    }
}
