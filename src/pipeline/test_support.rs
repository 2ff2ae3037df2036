//! In-memory collaborators for pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::chatbot::trigger::RawTrigger;
use crate::chatbot::{ChatbotConfig, ChatbotRegistry, KnowledgeSource, ModelSettings, Trigger};
use crate::core::errors::ApiError;
use crate::history::{ConversationStore, ConversationTurn, TurnRole};
use crate::llm::{GenerationRequest, TextGenerator};
use crate::rag::{HitMetadata, KnowledgeSearch, RetrievalHit, SearchScope};

pub fn hit(source_id: &str, content: &str, score: f32, url: Option<&str>) -> RetrievalHit {
    RetrievalHit {
        content: content.to_string(),
        score,
        source_id: source_id.to_string(),
        source_name: format!("Source {source_id}"),
        metadata: HitMetadata {
            url: url.map(str::to_string),
            title: None,
        },
    }
}

pub fn source(id: &str) -> KnowledgeSource {
    KnowledgeSource {
        id: id.to_string(),
        name: format!("Source {id}"),
    }
}

fn parse_trigger(id: &str, feature: &str, keywords: &[&str], config: serde_json::Value) -> Trigger {
    RawTrigger {
        id: id.to_string(),
        feature_type: feature.to_string(),
        trigger_kind: "KEYWORD".to_string(),
        keywords: json!(keywords),
        config,
    }
    .parse()
    .unwrap()
}

/// Keyword-driven lead collection trigger.
pub fn keyword_trigger(id: &str, keywords: &[&str]) -> Trigger {
    parse_trigger(id, "LEAD_COLLECTION", keywords, json!({}))
}

pub fn link_trigger(id: &str, keywords: &[&str]) -> Trigger {
    parse_trigger(
        id,
        "LINK_BUTTON",
        keywords,
        json!({"label": "Learn more", "url": "https://example.com/learn"}),
    )
}

pub fn chatbot(id: &str, source_ids: &[&str], triggers: Vec<Trigger>) -> ChatbotConfig {
    ChatbotConfig {
        id: id.to_string(),
        name: "Acme Helper".to_string(),
        directive: "You answer questions about Acme products in a friendly tone.".to_string(),
        model: ModelSettings::default(),
        knowledge_sources: source_ids.iter().map(|s| source(s)).collect(),
        triggers,
    }
}

#[derive(Default)]
pub struct FakeSearch {
    hits: HashMap<String, Vec<RetrievalHit>>,
    failing: Vec<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, source_id: &str, hits: Vec<RetrievalHit>) -> Self {
        self.hits.insert(source_id.to_string(), hits);
        self
    }

    pub fn failing(mut self, source_id: &str) -> Self {
        self.failing.push(source_id.to_string());
        self
    }

    /// Recorded `(query, source_id)` pairs.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeSearch for FakeSearch {
    async fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievalHit>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), scope.source_id.clone()));

        if self.failing.contains(&scope.source_id) {
            return Err(ApiError::internal(format!("source {} unavailable", scope.source_id)));
        }

        Ok(self
            .hits
            .get(&scope.source_id)
            .map(|hits| {
                hits.iter()
                    .filter(|h| h.score > threshold)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Generator that tells expansion calls (one user message) from answer calls
/// (system + user) and scripts each separately.
pub struct FakeGenerator {
    answer: Result<String, String>,
    expansion: Result<String, String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<(String, GenerationRequest)>>,
}

impl FakeGenerator {
    pub fn answering(text: &str) -> Self {
        Self {
            answer: Ok(text.to_string()),
            expansion: Ok(String::new()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            ..Self::answering("")
        }
    }

    pub fn with_expansion(mut self, expansion: Result<String, String>) -> Self {
        self.expansion = expansion;
        self
    }

    /// Delays answer calls only.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_answer_request(&self) -> Option<(String, GenerationRequest)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, r)| r.messages.len() > 1)
            .cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, request: GenerationRequest, model: &str) -> Result<String, ApiError> {
        let is_answer = request.messages.len() > 1;
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), request));

        let scripted = if is_answer {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            &self.answer
        } else {
            &self.expansion
        };
        scripted.clone().map_err(ApiError::BadGateway)
    }
}

#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<ConversationTurn>>>,
    owners: Mutex<HashMap<String, String>>,
    fail_history: bool,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_history() -> Self {
        Self {
            fail_history: true,
            ..Self::default()
        }
    }

    pub fn messages(&self, conversation_id: &str) -> Vec<ConversationTurn> {
        self.conversations
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn conversation_exists(
        &self,
        chatbot_id: &str,
        conversation_id: &str,
    ) -> Result<bool, ApiError> {
        let owners = self.owners.lock().unwrap();
        Ok(owners.get(conversation_id).map(String::as_str) == Some(chatbot_id))
    }

    async fn create_conversation(&self, chatbot_id: &str, _title_hint: &str) -> Result<String, ApiError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conversations.lock().unwrap().insert(id.clone(), Vec::new());
        self.owners
            .lock()
            .unwrap()
            .insert(id.clone(), chatbot_id.to_string());
        Ok(id)
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        _since_minutes: i64,
        max_count: usize,
    ) -> Result<Vec<ConversationTurn>, ApiError> {
        if self.fail_history {
            return Err(ApiError::internal("history unavailable"));
        }
        let turns = self.messages(conversation_id);
        let skip = turns.len().saturating_sub(max_count);
        Ok(turns.into_iter().skip(skip).collect())
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<(), ApiError> {
        let mut conversations = self.conversations.lock().unwrap();
        let turns = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| ApiError::NotFound(conversation_id.to_string()))?;
        turns.push(ConversationTurn {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticRegistry {
    chatbots: HashMap<String, ChatbotConfig>,
}

impl StaticRegistry {
    pub fn with(chatbot: ChatbotConfig) -> Self {
        let mut chatbots = HashMap::new();
        chatbots.insert(chatbot.id.clone(), chatbot);
        Self { chatbots }
    }

    pub fn and(mut self, chatbot: ChatbotConfig) -> Self {
        self.chatbots.insert(chatbot.id.clone(), chatbot);
        self
    }
}

#[async_trait]
impl ChatbotRegistry for StaticRegistry {
    async fn get_chatbot(&self, chatbot_id: &str) -> Result<Option<ChatbotConfig>, ApiError> {
        Ok(self.chatbots.get(chatbot_id).cloned())
    }
}
