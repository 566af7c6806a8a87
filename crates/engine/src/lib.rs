//! Reply orchestration engine for Konsul conversational agents.
//!
//! Drives one inbound user message through the full pipeline: contact
//! linking, knowledge retrieval, prompt assembly, the bounded tool-call
//! loop against the LLM provider, reply persistence, and usage metering.

pub mod linker;
pub mod locks;
pub mod prompt;
pub mod reply;

pub use linker::{ContactLinker, LinkOutcome};
pub use locks::ConversationLocks;
pub use prompt::build_system_prompt;
pub use reply::{EngineMode, ReplyEngine, ReplyOutcome};
