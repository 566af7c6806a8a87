//! Configuration loading, validation, and management for the Konsul reply
//! engine.
//!
//! Loads configuration from a TOML file with environment variable overrides
//! and validates all settings at startup. Provider API keys are resolved
//! exactly once, here — the resolved config is injected into the engine at
//! construction time, never looked up ad hoc mid-call.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure for the reply engine.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Provider credentials and endpoints.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Knowledge retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Reply loop settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Credit metering settings.
    #[serde(default)]
    pub billing: BillingConfig,
}

/// Per-family provider credentials.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderKeyConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<ProviderKeyConfig>,
}

/// Credentials and endpoint for one provider family.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ProviderKeyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKeyConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl std::fmt::Debug for ProvidersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidersConfig")
            .field("openai", &self.openai)
            .field("gemini", &self.gemini)
            .finish()
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("providers", &self.providers)
            .field("retrieval", &self.retrieval)
            .field("orchestrator", &self.orchestrator)
            .field("billing", &self.billing)
            .finish()
    }
}

/// Knowledge retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// How many chunks to feed into the prompt.
    #[serde(default = "default_retrieval_limit")]
    pub limit: usize,

    /// Scoring strategy: "keyword" (default) or "embedding".
    #[serde(default = "default_retrieval_strategy")]
    pub strategy: String,

    /// Cosine similarity floor for the embedding strategy.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

fn default_retrieval_limit() -> usize {
    5
}
fn default_retrieval_strategy() -> String {
    "keyword".into()
}
fn default_min_similarity() -> f32 {
    0.4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_retrieval_limit(),
            strategy: default_retrieval_strategy(),
            min_similarity: default_min_similarity(),
        }
    }
}

/// Reply loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum model invocations per turn. The loop exits best-effort when
    /// the bound is hit, it never errors.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// How many history messages to replay into the transcript.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Hard wall-clock timeout per provider call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_tool_iterations() -> u32 {
    3
}
fn default_history_window() -> usize {
    20
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            history_window: default_history_window(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Credit metering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Tokens per credit; credits charged = ceil(tokens / tokens_per_credit).
    #[serde(default = "default_tokens_per_credit")]
    pub tokens_per_credit: u32,
}

fn default_tokens_per_credit() -> u32 {
    100
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            tokens_per_credit: default_tokens_per_credit(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides:
    /// - `KONSUL_OPENAI_API_KEY` / `OPENAI_API_KEY`
    /// - `KONSUL_GEMINI_API_KEY` / `GEMINI_API_KEY`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides onto an already-loaded config.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = env_first(&["KONSUL_OPENAI_API_KEY", "OPENAI_API_KEY"]) {
            self.providers
                .openai
                .get_or_insert_with(ProviderKeyConfig::default)
                .api_key = Some(key);
        }
        if let Some(key) = env_first(&["KONSUL_GEMINI_API_KEY", "GEMINI_API_KEY"]) {
            self.providers
                .gemini
                .get_or_insert_with(ProviderKeyConfig::default)
                .api_key = Some(key);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.billing.tokens_per_credit == 0 {
            return Err(ConfigError::ValidationError(
                "billing.tokens_per_credit must be at least 1".into(),
            ));
        }
        if self.orchestrator.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.orchestrator.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.history_window must be at least 1".into(),
            ));
        }
        if self.retrieval.limit == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.limit must be at least 1".into(),
            ));
        }
        if self.retrieval.strategy != "keyword" && self.retrieval.strategy != "embedding" {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.strategy must be \"keyword\" or \"embedding\", got \"{}\"",
                self.retrieval.strategy
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_similarity must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|v| !v.is_empty())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
