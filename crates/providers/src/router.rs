//! Provider router — selects the adapter for a model's provider family.
//!
//! Routing is explicit: every `ModelRef` names its family, and the router
//! holds at most one adapter per family. No model-name sniffing.

use std::collections::HashMap;
use std::sync::Arc;

use konsul_core::agent::{ModelRef, ProviderFamily};
use konsul_core::error::ProviderError;
use konsul_core::provider::Provider;

use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;

/// Routes LLM requests to the adapter for the agent's provider family.
#[derive(Default)]
pub struct ProviderRouter {
    providers: HashMap<ProviderFamily, Arc<dyn Provider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register an adapter under its own family.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.family(), provider);
    }

    /// Get the adapter for a family, if configured.
    pub fn get(&self, family: ProviderFamily) -> Option<Arc<dyn Provider>> {
        self.providers.get(&family).cloned()
    }

    /// Resolve the adapter for a model reference.
    pub fn resolve(&self, model: &ModelRef) -> Result<Arc<dyn Provider>, ProviderError> {
        self.get(model.family).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no API key configured for provider family '{}'",
                model.family
            ))
        })
    }

    /// List the configured families.
    pub fn families(&self) -> Vec<ProviderFamily> {
        self.providers.keys().copied().collect()
    }
}

/// Build a router from resolved configuration.
///
/// Only families with an API key get an adapter; resolving a model of an
/// unconfigured family fails with `ProviderError::NotConfigured` at the top
/// of the reply cycle, before anything is billed.
pub fn build_from_config(config: &konsul_config::EngineConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new();
    let timeout = config.orchestrator.request_timeout_secs;

    if let Some(openai) = &config.providers.openai {
        if let Some(api_key) = &openai.api_key {
            let mut provider = OpenAiProvider::with_timeout(api_key, timeout);
            if let Some(url) = &openai.api_url {
                provider = provider.with_base_url(url);
            }
            router.register(Arc::new(provider));
        }
    }

    if let Some(gemini) = &config.providers.gemini {
        if let Some(api_key) = &gemini.api_key {
            let mut provider = GeminiProvider::with_timeout(api_key, timeout);
            if let Some(url) = &gemini.api_url {
                provider = provider.with_base_url(url);
            }
            router.register(Arc::new(provider));
        }
    }

    router
}
