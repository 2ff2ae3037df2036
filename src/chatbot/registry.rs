//! YamlChatbotRegistry: chatbot definitions loaded from a YAML file.
//!
//! ```yaml
//! chatbots:
//!   support-bot:
//!     name: Support
//!     directive: You are the support assistant for Acme.
//!     model: { model: gpt-4o-mini, temperature: 0.5 }
//!     knowledge_sources:
//!       - { id: kb-pricing, name: Pricing docs }
//!     triggers:
//!       - id: demo-form
//!         feature_type: LEAD_COLLECTION
//!         trigger_kind: KEYWORD
//!         keywords: ["demo", "pricing"]
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;

use super::trigger::RawTrigger;
use super::{ChatbotConfig, ChatbotRegistry, KnowledgeSource, ModelSettings};
use crate::core::errors::ApiError;

#[derive(Debug, Default, Deserialize)]
struct ChatbotsFile {
    #[serde(default)]
    chatbots: HashMap<String, ChatbotEntry>,
}

#[derive(Debug, Deserialize)]
struct ChatbotEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    directive: String,
    #[serde(default)]
    model: ModelSettings,
    #[serde(default)]
    knowledge_sources: Vec<KnowledgeSource>,
    #[serde(default)]
    triggers: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct YamlChatbotRegistry {
    chatbots: Arc<RwLock<HashMap<String, ChatbotConfig>>>,
    path: PathBuf,
}

impl YamlChatbotRegistry {
    /// Opens the registry at `path`. A missing file yields an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let registry = Self {
            chatbots: Arc::new(RwLock::new(HashMap::new())),
            path: path.into(),
        };
        if let Err(e) = registry.reload() {
            tracing::warn!(path = %registry.path.display(), error = %e, "Failed to load chatbot registry");
        }
        registry
    }

    pub fn reload(&self) -> Result<(), ApiError> {
        let chatbots = load_chatbots_from_file(&self.path)?;
        let mut guard = self
            .chatbots
            .write()
            .map_err(|e| ApiError::internal(format!("Lock poisoned: {e}")))?;
        *guard = chatbots;
        tracing::info!("Loaded {} chatbot(s) from {:?}", guard.len(), self.path);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chatbots.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChatbotRegistry for YamlChatbotRegistry {
    async fn get_chatbot(&self, chatbot_id: &str) -> Result<Option<ChatbotConfig>, ApiError> {
        let guard = self.chatbots.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(chatbot_id).cloned())
    }
}

fn load_chatbots_from_file(path: &Path) -> Result<HashMap<String, ChatbotConfig>, ApiError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    parse_chatbots(&contents)
}

fn parse_chatbots(contents: &str) -> Result<HashMap<String, ChatbotConfig>, ApiError> {
    let file: ChatbotsFile = serde_yaml::from_str(contents)
        .map_err(|e| ApiError::BadRequest(format!("Invalid chatbot registry: {e}")))?;

    let mut chatbots = HashMap::new();
    for (id, entry) in file.chatbots {
        let mut triggers = Vec::new();
        for (index, raw) in entry.triggers.into_iter().enumerate() {
            let parsed = serde_json::from_value::<RawTrigger>(raw)
                .map_err(|e| e.to_string())
                .and_then(|mut raw| {
                    if raw.id.is_empty() {
                        raw.id = format!("{id}#{index}");
                    }
                    raw.parse().map_err(|e| e.to_string())
                });
            match parsed {
                Ok(trigger) => triggers.push(trigger),
                Err(reason) => {
                    tracing::warn!(
                        chatbot_id = %id,
                        trigger_index = index,
                        error = %reason,
                        "Skipping malformed trigger"
                    );
                }
            }
        }

        let name = if entry.name.is_empty() {
            id.clone()
        } else {
            entry.name
        };
        let knowledge_sources = entry
            .knowledge_sources
            .into_iter()
            .map(|mut source| {
                if source.name.is_empty() {
                    source.name = source.id.clone();
                }
                source
            })
            .collect();

        chatbots.insert(
            id.clone(),
            ChatbotConfig {
                id,
                name,
                directive: entry.directive,
                model: entry.model,
                knowledge_sources,
                triggers,
            },
        );
    }

    Ok(chatbots)
}
