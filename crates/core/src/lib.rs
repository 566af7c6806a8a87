//! # Konsul Core
//!
//! Domain types, traits, and error definitions for the Konsul agent reply
//! orchestration engine. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM provider, data store, calendar) is
//! defined as a trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod agent;
pub mod contact;
pub mod conversation;
pub mod knowledge;
pub mod provider;
pub mod tool;
pub mod store;
pub mod billing;
pub mod calendar;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use agent::{AgentProfile, BehaviorFlags, CommunicationStyle, CustomFieldDef, FieldKind, JobKind, JobProfile, ModelRef, ProviderFamily};
pub use contact::{Contact, ContactId};
pub use conversation::{AttachmentMeta, Conversation, ConversationId, ConversationStatus, Message, MessageRole};
pub use knowledge::{DocumentChunk, KnowledgeBase, KnowledgeSource, SourceKind, SourceStatus};
pub use provider::{ChatMessage, ChatRole, MessageToolCall, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use store::{AgentStore, ContactStore, ConversationStore, KnowledgeStore, UsageStore};
pub use billing::{CreditBalance, UsageLog};
pub use calendar::{CalendarClient, CalendarConfig, CreatedEvent, EventDraft, TimeSlot};
pub use event::{DomainEvent, EventBus};
