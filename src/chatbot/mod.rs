//! Chatbot configuration as seen by the answering pipeline.
//!
//! The builder application owns these records; the pipeline only reads them
//! through [`ChatbotRegistry`].

mod registry;
pub mod trigger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

pub use registry::YamlChatbotRegistry;
pub use trigger::{FeatureConfig, FeatureType, Trigger, TriggerKind};

/// A knowledge base attached to a chatbot: an opaque scope id plus a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Per-chatbot generation overrides. Unset values fall back to the
/// `generation` section of the service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChatbotConfig {
    pub id: String,
    pub name: String,
    /// Background directive / personality text.
    pub directive: String,
    pub model: ModelSettings,
    pub knowledge_sources: Vec<KnowledgeSource>,
    pub triggers: Vec<Trigger>,
}

#[async_trait]
pub trait ChatbotRegistry: Send + Sync {
    async fn get_chatbot(&self, chatbot_id: &str) -> Result<Option<ChatbotConfig>, ApiError>;
}
