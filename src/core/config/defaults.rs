//! Typed configuration sections and their default values.
//!
//! Every section is `#[serde(default)]`, so a partial `config.yml` only needs
//! to name the values it overrides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub retrieval: RetrievalConfig,
    pub selection: SelectionConfig,
    pub citations: CitationConfig,
    pub history: HistoryConfig,
    pub generation: GenerationConfig,
    pub expansion: ExpansionConfig,
    pub llm: LlmConfig,
    /// Chatbot registry file; relative paths resolve against the project root.
    pub chatbots_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Hits requested per (query, source) pair.
    pub limit: usize,
    /// Minimum similarity a hit must exceed.
    pub threshold: f32,
    /// Upper bound on in-flight knowledge searches per turn.
    pub max_concurrency: usize,
    /// Per-source search timeout.
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 8,
            threshold: 0.55,
            max_concurrency: 16,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub max_chunks: usize,
    pub high_confidence: f32,
    pub novelty_threshold: f32,
    pub min_accepted: usize,
    /// Terms must be strictly longer than this to count toward novelty.
    pub min_term_len: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_chunks: 10,
            high_confidence: 0.70,
            novelty_threshold: 0.30,
            min_accepted: 3,
            min_term_len: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationConfig {
    pub max_citations: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self { max_citations: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub lookback_minutes: i64,
    pub max_messages: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: 30,
            max_messages: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub default_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            max_tokens: 600,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub enabled: bool,
    pub max_variations: usize,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_variations: 2,
            max_tokens: 150,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub embedding_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}
