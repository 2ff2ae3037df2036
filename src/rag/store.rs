//! KnowledgeSearch trait: abstract interface over the vector-search backend.
//!
//! The answering pipeline only ever reads through this trait; the bundled
//! implementation is `SqliteKnowledgeStore` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// Which knowledge base a search runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchScope {
    pub chatbot_id: String,
    pub source_id: String,
}

impl SearchScope {
    pub fn new(chatbot_id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            chatbot_id: chatbot_id.into(),
            source_id: source_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A chunk returned by the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub content: String,
    /// Similarity in [0, 1], higher is better.
    pub score: f32,
    pub source_id: String,
    pub source_name: String,
    #[serde(default)]
    pub metadata: HitMetadata,
}

impl RetrievalHit {
    pub fn url(&self) -> Option<&str> {
        self.metadata
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    /// Hits in `scope` scoring above `threshold`, best first, at most `limit`.
    async fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievalHit>, ApiError>;
}
