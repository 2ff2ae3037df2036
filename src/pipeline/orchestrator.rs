//! Turn orchestration: conversation lifecycle, stage sequencing, persistence.

use std::cmp::Ordering;
use std::sync::Arc;

use super::assembler::ContextAssembler;
use super::expander::QueryExpander;
use super::formatter::format_response;
use super::generator::AnswerGenerator;
use super::prompt::PromptComposer;
use super::retriever::MultiSourceRetriever;
use super::selector::DiversitySelector;
use super::triggers;
use super::types::{PipelineResult, PipelineStage};
use crate::chatbot::{ChatbotConfig, ChatbotRegistry};
use crate::core::config::defaults::HistoryConfig;
use crate::core::config::AppConfig;
use crate::core::errors::PipelineError;
use crate::history::{ConversationStore, ConversationTurn, TurnRole};
use crate::llm::TextGenerator;
use crate::rag::{KnowledgeSearch, RetrievalHit};

const TITLE_HINT_CHARS: usize = 50;

/// Stage tracker for one turn. Transitions are logged at debug.
struct TurnProgress {
    stage: PipelineStage,
    conversation_id: Option<String>,
}

impl TurnProgress {
    fn new() -> Self {
        Self {
            stage: PipelineStage::Received,
            conversation_id: None,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "invalid pipeline transition {} -> {}",
            self.stage,
            next
        );
        tracing::debug!(
            conversation_id = self.conversation_id.as_deref().unwrap_or("-"),
            from = %self.stage,
            to = %next,
            "Pipeline stage transition"
        );
        self.stage = next;
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        self.advance(PipelineStage::Failed);
        err
    }
}

pub struct Pipeline {
    registry: Arc<dyn ChatbotRegistry>,
    conversations: Arc<dyn ConversationStore>,
    expander: QueryExpander,
    retriever: MultiSourceRetriever,
    selector: DiversitySelector,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    history: HistoryConfig,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        registry: Arc<dyn ChatbotRegistry>,
        search: Arc<dyn KnowledgeSearch>,
        generator: Arc<dyn TextGenerator>,
        conversations: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            registry,
            conversations,
            expander: QueryExpander::new(generator.clone(), config.expansion.clone()),
            retriever: MultiSourceRetriever::new(search, config.retrieval.clone()),
            selector: DiversitySelector::new(config.selection.clone()),
            assembler: ContextAssembler::new(config.citations.max_citations),
            generator: AnswerGenerator::new(generator, config.generation.clone()),
            history: config.history.clone(),
        }
    }

    /// Answer one user message.
    ///
    /// The user message is persisted before generation starts, so a failed
    /// generation still leaves it in the conversation. The bot message is
    /// persisted only on success.
    pub async fn run_turn(
        &self,
        chatbot_id: &str,
        conversation_id: Option<&str>,
        user_message: &str,
    ) -> Result<PipelineResult, PipelineError> {
        let mut progress = TurnProgress::new();

        let chatbot = match self.load_chatbot(chatbot_id).await {
            Ok(chatbot) => chatbot,
            Err(e) => return Err(progress.fail(e)),
        };

        let conversation_id = match self
            .resolve_conversation(chatbot_id, conversation_id, user_message)
            .await
        {
            Ok(id) => id,
            Err(e) => return Err(progress.fail(e)),
        };
        progress.conversation_id = Some(conversation_id.clone());

        let history = self.load_history(&conversation_id).await;

        if let Err(e) = self
            .conversations
            .append_message(&conversation_id, TurnRole::User, user_message)
            .await
        {
            return Err(progress.fail(PipelineError::storage(e)));
        }

        let fired = triggers::evaluate(&chatbot.triggers, user_message);
        if !fired.is_empty() {
            tracing::info!(
                conversation_id = %conversation_id,
                triggers = ?fired.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
                "Logic triggers fired"
            );
        }

        progress.advance(PipelineStage::Expanding);
        let model = self.generator.model_for(&chatbot.model);
        let queries = if chatbot.knowledge_sources.is_empty() {
            vec![user_message.trim().to_string()]
        } else {
            self.expander.expand(user_message, &model).await
        };

        progress.advance(PipelineStage::Retrieving);
        let merged = self
            .retriever
            .retrieve(&chatbot.id, &queries, &chatbot.knowledge_sources)
            .await;
        let selected = self.selector.select(&merged.hits);
        let context = self.assembler.build_context(selected);
        let citations = self.assembler.citations(
            &context,
            &merged.best_by_url,
            self.retriever.config().threshold,
        );
        tracing::debug!(
            conversation_id = %conversation_id,
            queries = queries.len(),
            merged = merged.hits.len(),
            selected = context.len(),
            citations = citations.len(),
            failed_sources = merged.failures.len(),
            "Retrieval finished"
        );

        progress.advance(PipelineStage::Composing);
        let hints = triggers::logic_hints(&fired);
        let prompt = PromptComposer::compose(&chatbot, &context, &history, &hints, user_message);

        progress.advance(PipelineStage::Generating);
        let raw = match self.generator.generate(prompt, &chatbot.model).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, error = %e, "Answer generation failed");
                return Err(progress.fail(e));
            }
        };

        progress.advance(PipelineStage::Formatting);
        let answer_html = format_response(&raw, &citations);

        if let Err(e) = self
            .conversations
            .append_message(&conversation_id, TurnRole::Bot, &answer_html)
            .await
        {
            return Err(progress.fail(PipelineError::storage(e)));
        }
        progress.advance(PipelineStage::Persisted);

        Ok(PipelineResult {
            answer_html,
            citations,
            triggered_logics: fired,
            conversation_id,
        })
    }

    /// Single-query knowledge search across a chatbot's sources, best first.
    pub async fn search(
        &self,
        chatbot_id: &str,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<RetrievalHit>, PipelineError> {
        let chatbot = self.load_chatbot(chatbot_id).await?;
        let config = self.retriever.config();
        let limit = limit.unwrap_or(config.limit);
        let threshold = threshold.unwrap_or(config.threshold);

        let merged = self
            .retriever
            .retrieve_with(
                &chatbot.id,
                &[query.trim().to_string()],
                &chatbot.knowledge_sources,
                limit,
                threshold,
            )
            .await;

        let mut hits = merged.hits;
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        Ok(hits)
    }

    async fn load_chatbot(&self, chatbot_id: &str) -> Result<ChatbotConfig, PipelineError> {
        match self.registry.get_chatbot(chatbot_id).await {
            Ok(Some(chatbot)) => Ok(chatbot),
            Ok(None) => Err(PipelineError::ConfigurationNotFound(format!(
                "chatbot '{}'",
                chatbot_id
            ))),
            Err(e) => {
                tracing::error!(chatbot_id, error = %e, "Chatbot lookup failed");
                Err(PipelineError::ConfigurationNotFound(format!(
                    "chatbot '{}'",
                    chatbot_id
                )))
            }
        }
    }

    async fn resolve_conversation(
        &self,
        chatbot_id: &str,
        requested: Option<&str>,
        user_message: &str,
    ) -> Result<String, PipelineError> {
        if let Some(id) = requested.map(str::trim).filter(|id| !id.is_empty()) {
            if self
                .conversations
                .conversation_exists(chatbot_id, id)
                .await
                .map_err(PipelineError::storage)?
            {
                return Ok(id.to_string());
            }
            tracing::info!(
                requested_id = %id,
                chatbot_id,
                "Conversation not found for this chatbot; starting a new one"
            );
        }

        let title_hint: String = user_message.trim().chars().take(TITLE_HINT_CHARS).collect();
        self.conversations
            .create_conversation(chatbot_id, &title_hint)
            .await
            .map_err(PipelineError::storage)
    }

    async fn load_history(&self, conversation_id: &str) -> Vec<ConversationTurn> {
        match self
            .conversations
            .recent_messages(
                conversation_id,
                self.history.lookback_minutes,
                self.history.max_messages,
            )
            .await
        {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "Failed to load history; continuing without it");
                Vec::new()
            }
        }
    }
}
