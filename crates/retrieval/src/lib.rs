//! Knowledge retrieval for the Konsul reply engine.
//!
//! Given an agent and a query string, returns the top-K most relevant text
//! chunks from the agent's READY knowledge sources. Retrieval is a pure
//! read: storage failures are logged and degrade to an empty context, the
//! reply cycle proceeds without knowledge augmentation.

pub mod scoring;
pub mod vector;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use konsul_core::error::ProviderError;
use konsul_core::store::KnowledgeStore;

pub use scoring::score_chunk;
pub use vector::{cosine_similarity, rank_by_similarity};

/// Produces a fixed-length embedding for a piece of text.
///
/// Embedding generation itself is out of scope here; deployments that want
/// the embedding strategy inject a real implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}

/// How chunks are ranked against the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalStrategy {
    /// Keyword-overlap scoring with an exact-phrase bonus. The default.
    Keyword,
    /// Cosine similarity between a query embedding and stored chunk
    /// embeddings, with a similarity floor. Requires an injected embedder;
    /// falls back to keyword scoring otherwise.
    Embedding { min_similarity: f32 },
}

impl Default for RetrievalStrategy {
    fn default() -> Self {
        Self::Keyword
    }
}

impl RetrievalStrategy {
    /// Map a configured strategy name onto a strategy. Unknown names fall
    /// back to keyword scoring.
    pub fn from_name(name: &str, min_similarity: f32) -> Self {
        match name {
            "embedding" => Self::Embedding { min_similarity },
            _ => Self::Keyword,
        }
    }
}

/// The knowledge retriever.
pub struct Retriever {
    store: Arc<dyn KnowledgeStore>,
    strategy: RetrievalStrategy,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Retriever {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            strategy: RetrievalStrategy::Keyword,
            embedder: None,
        }
    }

    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Retrieve the `limit` most relevant chunk texts for a query.
    ///
    /// Never fails: an empty list comes back when the agent has no READY
    /// chunks, nothing scores above zero, or the store errors out.
    pub async fn retrieve(&self, agent_id: &str, query: &str, limit: usize) -> Vec<String> {
        let chunks = match self.store.ready_chunks(agent_id).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(agent_id, error = %e, "Knowledge lookup failed, continuing without context");
                return Vec::new();
            }
        };

        if chunks.is_empty() {
            return Vec::new();
        }

        if let RetrievalStrategy::Embedding { min_similarity } = self.strategy {
            if let Some(embedder) = &self.embedder {
                match embedder.embed(query).await {
                    Ok(query_embedding) => {
                        let ranked = vector::rank_by_similarity(
                            &chunks,
                            &query_embedding,
                            limit,
                            min_similarity,
                        );
                        debug!(
                            agent_id,
                            candidates = chunks.len(),
                            selected = ranked.len(),
                            "Embedding retrieval"
                        );
                        return ranked.into_iter().map(|c| c.content).collect();
                    }
                    Err(e) => {
                        warn!(agent_id, error = %e, "Query embedding failed, falling back to keyword scoring");
                    }
                }
            } else {
                warn!(agent_id, "Embedding strategy configured without an embedder, falling back to keyword scoring");
            }
        }

        let mut scored: Vec<(u32, String)> = chunks
            .into_iter()
            .filter_map(|chunk| {
                let score = scoring::score_chunk(&chunk.content, query);
                (score > 0).then_some((score, chunk.content))
            })
            .collect();

        // Stable sort: ties keep base/source ordering.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(limit);

        debug!(agent_id, selected = scored.len(), "Keyword retrieval");
        scored.into_iter().map(|(_, content)| content).collect()
    }
}
