//! Usage metering and credit arithmetic.
//!
//! Converts the token consumption of one reply cycle into credits, persists
//! one append-only usage log, and applies the atomic balance update — all
//! through the `UsageStore` contract, so the insert and the decrement land
//! in one transaction.

use std::sync::Arc;

use tracing::debug;

use konsul_core::billing::UsageLog;
use konsul_core::conversation::ConversationId;
use konsul_core::error::StoreError;
use konsul_core::provider::Usage;
use konsul_core::store::UsageStore;

/// Default conversion rate: one credit per started block of 100 tokens.
pub const DEFAULT_TOKENS_PER_CREDIT: u32 = 100;

/// Credits charged for a token count: `ceil(tokens / tokens_per_credit)`.
///
/// Zero tokens cost zero credits; any partial block rounds up.
pub fn credits_for_tokens(tokens: u32, tokens_per_credit: u32) -> u32 {
    if tokens_per_credit == 0 {
        return 0;
    }
    tokens.div_ceil(tokens_per_credit)
}

/// Token accumulator across the model calls of one reply cycle.
#[derive(Debug, Clone, Default)]
pub struct TurnUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub model_calls: u32,
}

impl TurnUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one model call's usage into the turn totals.
    pub fn add(&mut self, usage: &Usage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total_tokens;
    }

    /// Count a model call (providers don't always report usage).
    pub fn count_call(&mut self) {
        self.model_calls += 1;
    }
}

/// Writes usage logs and charges workspace balances.
pub struct UsageMeter {
    store: Arc<dyn UsageStore>,
    tokens_per_credit: u32,
}

impl UsageMeter {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            tokens_per_credit: DEFAULT_TOKENS_PER_CREDIT,
        }
    }

    pub fn with_tokens_per_credit(mut self, tokens_per_credit: u32) -> Self {
        self.tokens_per_credit = tokens_per_credit;
        self
    }

    /// Meter one completed reply cycle. Returns the credits charged.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        workspace_id: &str,
        agent_id: &str,
        conversation_id: &ConversationId,
        channel_id: Option<&str>,
        model: &str,
        tokens_used: u32,
    ) -> Result<u32, StoreError> {
        let credits_used = credits_for_tokens(tokens_used, self.tokens_per_credit);

        let log = UsageLog::new(
            workspace_id,
            agent_id,
            conversation_id.clone(),
            tokens_used,
            credits_used,
            model,
            channel_id.map(String::from),
        );

        self.store.record_usage(log).await?;

        debug!(
            workspace_id,
            tokens_used, credits_used, "Recorded usage and charged balance"
        );
        Ok(credits_used)
    }
}
