use std::sync::Arc;

use crate::chatbot::YamlChatbotRegistry;
use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::history::SqliteConversationStore;
use crate::llm::OpenAiCompatProvider;
use crate::pipeline::Pipeline;
use crate::rag::SqliteKnowledgeStore;

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub chatbots: YamlChatbotRegistry,
    pub knowledge: Arc<SqliteKnowledgeStore>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Loads configuration and opens the stores behind the pipeline.
    ///
    /// The chatbot registry falls back to `chatbots.yml` next to the config
    /// when `chatbots_path` is unset.
    pub async fn initialize(config_service: &ConfigService) -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(config_service.paths().clone());
        let config = config_service
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let chatbots_path = config
            .chatbots_path
            .clone()
            .unwrap_or_else(|| paths.project_root.join("chatbots.yml"));
        let chatbots = YamlChatbotRegistry::open(chatbots_path);

        let provider = Arc::new(OpenAiCompatProvider::from_config(&config.llm));

        let conversations = Arc::new(
            SqliteConversationStore::new(paths.db_path.clone())
                .await
                .map_err(|e| InitializationError::History(e.into()))?,
        );

        let knowledge = Arc::new(
            SqliteKnowledgeStore::with_path(paths.knowledge_db_path.clone(), provider.clone())
                .await
                .map_err(|e| InitializationError::Knowledge(e.into()))?,
        );

        let pipeline = Arc::new(Pipeline::new(
            &config,
            Arc::new(chatbots.clone()),
            knowledge.clone(),
            provider,
            conversations,
        ));

        Ok(Arc::new(AppState {
            paths,
            config: Arc::new(config),
            chatbots,
            knowledge,
            pipeline,
        }))
    }
}
