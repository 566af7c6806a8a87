//! Knowledge base domain types.
//!
//! A `KnowledgeBase` groups `KnowledgeSource`s; each source owns
//! `DocumentChunk`s once ingestion finishes. Only chunks under a READY
//! source are eligible for retrieval — the engine never triggers ingestion.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a knowledge source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Text,
    Website,
    Document,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Website => "website",
            Self::Document => "document",
        }
    }
}

/// Ingestion lifecycle of a knowledge source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// A named group of knowledge sources belonging to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub agent_id: String,
    pub name: String,
}

impl KnowledgeBase {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            name: name.into(),
        }
    }
}

/// One ingested source inside a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: String,
    pub base_id: String,
    pub name: String,
    pub kind: SourceKind,
    pub status: SourceStatus,
}

impl KnowledgeSource {
    pub fn new(base_id: impl Into<String>, name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            base_id: base_id.into(),
            name: name.into(),
            kind,
            status: SourceStatus::Pending,
        }
    }

    pub fn ready(mut self) -> Self {
        self.status = SourceStatus::Ready;
        self
    }
}

/// A fragment of ingested knowledge text with an optional embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,

    pub source_id: String,

    /// Position within the source, for stable ordering.
    pub position: u32,

    pub content: String,

    /// Fixed-length embedding, when the ingestion pipeline produced one.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    pub fn new(source_id: impl Into<String>, position: u32, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            position,
            content: content.into(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_source_starts_pending() {
        let source = KnowledgeSource::new("base_1", "FAQ", SourceKind::Text);
        assert_eq!(source.status, SourceStatus::Pending);

        let source = source.ready();
        assert_eq!(source.status, SourceStatus::Ready);
    }

    #[test]
    fn chunk_embedding_is_not_serialized() {
        let chunk = DocumentChunk::new("src_1", 0, "Horario: 9 a 18")
            .with_embedding(vec![0.1, 0.2]);
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(!json.contains("embedding"));

        let back: DocumentChunk = serde_json::from_str(&json).unwrap();
        assert!(back.embedding.is_none());
        assert_eq!(back.content, "Horario: 9 a 18");
    }

    #[test]
    fn status_labels() {
        assert_eq!(SourceStatus::Ready.as_str(), "ready");
        assert_eq!(SourceKind::Website.as_str(), "website");
    }
}
