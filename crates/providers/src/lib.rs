//! LLM provider adapters for the Konsul reply engine.
//!
//! All adapters implement the `konsul_core::Provider` trait. The router
//! selects the adapter by the agent's explicit provider family — never by
//! sniffing the model name.

pub mod gemini;
pub mod openai;
pub mod router;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use router::{ProviderRouter, build_from_config};
