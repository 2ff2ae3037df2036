use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Bot,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Bot => "bot",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "bot" | "ai" | "assistant" => TurnRole::Bot,
            _ => TurnRole::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Conversation persistence as used by the answering pipeline.
///
/// Past turns are never modified; the pipeline only appends.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// True only if the conversation exists and belongs to `chatbot_id`.
    async fn conversation_exists(
        &self,
        chatbot_id: &str,
        conversation_id: &str,
    ) -> Result<bool, ApiError>;

    async fn create_conversation(
        &self,
        chatbot_id: &str,
        title_hint: &str,
    ) -> Result<String, ApiError>;

    /// Turns from the last `since_minutes`, newest `max_count`, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        since_minutes: i64,
        max_count: usize,
    ) -> Result<Vec<ConversationTurn>, ApiError>;

    async fn append_message(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct SqliteConversationStore {
    pool: SqlitePool,
}

fn timestamp(at: DateTime<Utc>) -> String {
    // Fixed-width UTC so text comparison orders chronologically.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteConversationStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to conversation db: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                chatbot_id TEXT NOT NULL,
                title TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init conversations table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init messages table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at)",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create index: {}", e)))?;

        Ok(Self { pool })
    }

    async fn insert_message_at(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let now = timestamp(at);
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT INTO messages (conversation_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }
}

fn turn_from_row(row: &SqliteRow) -> Result<ConversationTurn, ApiError> {
    let role: String = row.try_get("role").map_err(ApiError::internal)?;
    let content: String = row.try_get("content").map_err(ApiError::internal)?;
    let created_at: String = row.try_get("created_at").map_err(ApiError::internal)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| ApiError::internal(format!("Invalid message timestamp {created_at:?}: {e}")))?
        .with_timezone(&Utc);

    Ok(ConversationTurn {
        role: TurnRole::from_db(&role),
        content,
        created_at,
    })
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn conversation_exists(
        &self,
        chatbot_id: &str,
        conversation_id: &str,
    ) -> Result<bool, ApiError> {
        let row = sqlx::query("SELECT id FROM conversations WHERE id = ? AND chatbot_id = ?")
            .bind(conversation_id)
            .bind(chatbot_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(row.is_some())
    }

    async fn create_conversation(
        &self,
        chatbot_id: &str,
        title_hint: &str,
    ) -> Result<String, ApiError> {
        let conversation_id = uuid::Uuid::new_v4().to_string();
        let now = timestamp(Utc::now());
        let title: String = title_hint.chars().take(50).collect();

        sqlx::query(
            "INSERT INTO conversations (id, chatbot_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&conversation_id)
        .bind(chatbot_id)
        .bind(title.trim())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create conversation: {}", e)))?;

        Ok(conversation_id)
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        since_minutes: i64,
        max_count: usize,
    ) -> Result<Vec<ConversationTurn>, ApiError> {
        let cutoff = timestamp(Utc::now() - Duration::minutes(since_minutes));

        let rows = sqlx::query(
            "SELECT * FROM (
                SELECT id, role, content, created_at FROM messages
                WHERE conversation_id = ? AND created_at >= ?
                ORDER BY id DESC LIMIT ?
             ) ORDER BY id ASC",
        )
        .bind(conversation_id)
        .bind(&cutoff)
        .bind(max_count as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter().map(turn_from_row).collect()
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<(), ApiError> {
        self.insert_message_at(conversation_id, role, content, Utc::now())
            .await
    }
}
