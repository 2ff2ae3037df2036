use async_trait::async_trait;

use super::types::GenerationRequest;
use crate::core::errors::ApiError;

/// Text-generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// provider name for logs (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn generate(&self, request: GenerationRequest, model: &str) -> Result<String, ApiError>;
}

/// Embedding backend used to vectorize search queries.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}
